//! Router: routes each task to its best-scoring agent and fires it without waiting.

use std::collections::HashSet;

use conclave_types::{Agent, AgentId, ConclaveError, PatternConfig, Task};

use crate::support::{advance, record_message, start_child, PatternContext};

/// Title keywords, grouped by the role keyword they favor.
const CATEGORIES: &[(&str, &[&str])] = &[
    ("research", &["gather", "collect", "research"]),
    ("writer", &["report", "write", "document"]),
    ("analyst", &["analyze", "process"]),
];

pub(crate) fn score(agent: &Agent, task: &Task) -> (u32, &'static str) {
    let title = task.title.to_lowercase();
    let role = agent.role.to_lowercase();
    let name = agent.name.to_lowercase();

    for (category, keywords) in CATEGORIES {
        if keywords.iter().any(|kw| title.contains(kw)) && role.contains(category) {
            return (10, "title category matches agent role");
        }
    }

    let title_words: HashSet<&str> = title.split_whitespace().collect();
    if title_words.iter().any(|w| name.contains(w)) {
        return (5, "a word of the task title appears in the agent's name");
    }

    (1, "baseline assignment")
}

pub(crate) fn best_agent<'a>(agents: &'a [Agent], task: &Task) -> (&'a Agent, u32, &'static str) {
    let mut best = (&agents[0], 0u32, "");
    for agent in agents {
        let (points, reason) = score(agent, task);
        if points > best.1 {
            best = (agent, points, reason);
        }
    }
    best
}

pub(crate) async fn run(
    ctx: &PatternContext,
    agents: &[Agent],
    tasks: &[Task],
    _config: &PatternConfig,
) -> Result<serde_json::Value, ConclaveError> {
    let mut routing_decisions = Vec::new();
    let mut agents_utilized: HashSet<AgentId> = HashSet::new();
    let mut successful_routing = 0usize;

    for (i, task) in tasks.iter().enumerate() {
        let (agent, points, reason) = best_agent(agents, task);
        start_child(&ctx.engine, agent.id, task.id, &ctx.project_directory).await?;
        agents_utilized.insert(agent.id);
        if points > 1 {
            successful_routing += 1;
        }

        record_message(
            &*ctx.store,
            &*ctx.bus,
            ctx.workflow_execution_id,
            ctx.enable_agent_communication,
            None,
            Some(agent.id),
            "child_started",
            format!("routed '{}' to {} ({reason})", task.title, agent.name),
            None,
        )
        .await;

        routing_decisions.push(serde_json::json!({
            "task": task.title,
            "agent": agent.name,
            "score": points,
            "reason": reason,
        }));

        advance(
            &*ctx.store,
            ctx.workflow_execution_id,
            format!("routed {}/{}", i + 1, tasks.len()),
            0.2 + 0.7 * ((i + 1) as f64 / tasks.len().max(1) as f64),
        )
        .await;
    }

    Ok(serde_json::json!({
        "routing_decisions": routing_decisions,
        "successful_routing": successful_routing,
        "routing_efficiency": successful_routing as f64 / tasks.len().max(1) as f64,
        "agents_utilized": agents_utilized.len(),
    }))
}
