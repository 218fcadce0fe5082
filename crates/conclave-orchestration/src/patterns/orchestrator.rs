//! Orchestrator: centrally coordinated assignment, fire-and-forget, using a task's
//! explicit assigned agents when present and round-robin otherwise.

use std::collections::HashSet;

use conclave_types::{Agent, AgentId, ConclaveError, PatternConfig, Task};

use crate::support::{advance, record_message, start_child, PatternContext};

/// Constant reported alongside the other Orchestrator metrics; current semantics
/// never vary it by run.
pub const COORDINATION_EFFICIENCY: f64 = 0.95;

pub(crate) async fn run(
    ctx: &PatternContext,
    agents: &[Agent],
    tasks: &[Task],
    _config: &PatternConfig,
) -> Result<serde_json::Value, ConclaveError> {
    let mut agents_coordinated: HashSet<AgentId> = HashSet::new();
    let mut tasks_started = 0usize;

    for (i, task) in tasks.iter().enumerate() {
        let assigned = task
            .assigned_agents
            .iter()
            .filter_map(|id| agents.iter().find(|a| a.id == *id))
            .next();
        let agent = assigned.unwrap_or(&agents[i % agents.len()]);

        start_child(&ctx.engine, agent.id, task.id, &ctx.project_directory).await?;
        agents_coordinated.insert(agent.id);
        tasks_started += 1;

        record_message(
            &*ctx.store,
            &*ctx.bus,
            ctx.workflow_execution_id,
            ctx.enable_agent_communication,
            None,
            Some(agent.id),
            "child_started",
            format!("{} coordinated to '{}'", agent.name, task.title),
            None,
        )
        .await;

        advance(
            &*ctx.store,
            ctx.workflow_execution_id,
            format!("coordinated {}/{}", i + 1, tasks.len()),
            0.2 + 0.7 * ((i + 1) as f64 / tasks.len().max(1) as f64),
        )
        .await;
    }

    Ok(serde_json::json!({
        "coordination_efficiency": COORDINATION_EFFICIENCY,
        "task_completion_rate": tasks_started as f64 / tasks.len().max(1) as f64,
        "agents_coordinated": agents_coordinated.len(),
        "tasks_managed": tasks.len(),
    }))
}
