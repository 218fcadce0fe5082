//! Swarm: overlapping rounds of agent/task collaboration slices.

use std::collections::HashSet;
use std::time::Duration;

use conclave_types::{Agent, AgentId, ConclaveError, ExecutionStatus, PatternConfig, Task, TaskId};
use futures::future::join_all;

use crate::support::{advance, record_message, start_child, wait_terminal, PatternContext};

/// Upper bound on how long one round's children are awaited.
pub const PER_CHILD_WAIT: Duration = Duration::from_secs(300);
/// Pause between rounds, giving the next round's slice a fresh view of agent state.
pub const ROUND_PAUSE: Duration = Duration::from_secs(1);

fn slice_for<'a>(agents: &'a [Agent], task_index: usize, agents_per_task: usize) -> Vec<&'a Agent> {
    let per_task = agents_per_task.max(1).min(agents.len().max(1));
    let start = task_index % agents.len().max(1);
    (0..per_task).map(|offset| &agents[(start + offset) % agents.len()]).collect()
}

pub(crate) async fn run(
    ctx: &PatternContext,
    agents: &[Agent],
    tasks: &[Task],
    config: &PatternConfig,
) -> Result<serde_json::Value, ConclaveError> {
    let rounds = config.coordination_rounds.max(1);
    let mut total_collaborations = 0u64;
    let mut emergent_behavior_count = 0u64;
    let mut successful = 0u64;
    let mut seen: HashSet<(AgentId, TaskId)> = HashSet::new();

    for round in 1..=rounds {
        let mut round_children = Vec::new();
        for (j, task) in tasks.iter().enumerate() {
            let slice = slice_for(agents, j, config.agents_per_task);
            let tag = if slice.len() > 1 { "cross-agent synthesis" } else { "solo execution" };
            for agent in &slice {
                round_children.push((agent.id, task, tag));
                seen.insert((agent.id, task.id));
            }
        }

        let futures = round_children.iter().map(|(agent_id, task, tag)| async move {
            let execution = start_child(&ctx.engine, *agent_id, task.id, &ctx.project_directory).await?;
            record_message(
                &*ctx.store,
                &*ctx.bus,
                ctx.workflow_execution_id,
                ctx.enable_agent_communication,
                Some(*agent_id),
                None,
                "emergent_behavior",
                format!("round {round}: '{}' exhibited {tag}", task.title),
                None,
            )
            .await;
            let finished = wait_terminal(&*ctx.store, execution.id, PER_CHILD_WAIT).await;
            Ok::<bool, ConclaveError>(finished.status == ExecutionStatus::Completed)
        });

        let outcomes = join_all(futures).await.into_iter().collect::<Result<Vec<_>, _>>()?;
        total_collaborations += outcomes.len() as u64;
        emergent_behavior_count += outcomes.len() as u64;
        successful += outcomes.iter().filter(|ok| **ok).count() as u64;

        advance(
            &*ctx.store,
            ctx.workflow_execution_id,
            format!("round {round}/{rounds}"),
            0.2 + 0.7 * (f64::from(round) / f64::from(rounds)),
        )
        .await;

        if round < rounds {
            tokio::time::sleep(ROUND_PAUSE).await;
        }
    }

    let success_rate = successful as f64 / total_collaborations.max(1) as f64;
    let coordination_efficiency = seen.len() as f64 / total_collaborations.max(1) as f64;

    Ok(serde_json::json!({
        "total_collaborations": total_collaborations,
        "unique_combinations": seen.len(),
        "coordination_efficiency": coordination_efficiency,
        "collective_intelligence_score": success_rate * 0.95,
        "emergent_behavior_count": emergent_behavior_count,
    }))
}
