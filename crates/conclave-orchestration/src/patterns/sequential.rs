//! Sequential: tasks run one after another; a child failure halts the remainder.

use std::time::Duration;

use conclave_types::{Agent, ConclaveError, ExecutionStatus, PatternConfig, Task};

use crate::support::{advance, record_message, start_child, wait_terminal, PatternContext};

/// Upper bound on how long one task is awaited before the pattern gives up on it.
pub const PER_CHILD_WAIT: Duration = Duration::from_secs(300);

pub(crate) async fn run(
    ctx: &PatternContext,
    agents: &[Agent],
    tasks: &[Task],
    _config: &PatternConfig,
) -> Result<serde_json::Value, ConclaveError> {
    let mut execution_order = Vec::new();
    let mut steps_completed = 0usize;
    let total = tasks.len();

    for (i, task) in tasks.iter().enumerate() {
        let agent = &agents[i % agents.len()];
        advance(
            &*ctx.store,
            ctx.workflow_execution_id,
            format!("running task {}/{total}", i + 1),
            0.1 + 0.8 * (steps_completed as f64 / total.max(1) as f64),
        )
        .await;

        let execution = start_child(&ctx.engine, agent.id, task.id, &ctx.project_directory).await?;
        record_message(
            &*ctx.store,
            &*ctx.bus,
            ctx.workflow_execution_id,
            ctx.enable_agent_communication,
            None,
            Some(agent.id),
            "child_started",
            format!("{} assigned '{}'", agent.name, task.title),
            None,
        )
        .await;

        let finished = wait_terminal(&*ctx.store, execution.id, PER_CHILD_WAIT).await;
        execution_order.push(format!("{} -> {}", agent.name, task.title));

        let failed = finished.status != ExecutionStatus::Completed;
        record_message(
            &*ctx.store,
            &*ctx.bus,
            ctx.workflow_execution_id,
            ctx.enable_agent_communication,
            Some(agent.id),
            None,
            if failed { "child_failed" } else { "child_completed" },
            format!("'{}' finished as {:?}", task.title, finished.status),
            None,
        )
        .await;

        if failed {
            break;
        }
        steps_completed += 1;
    }

    Ok(serde_json::json!({
        "steps_completed": steps_completed,
        "total_steps": total,
        "success_rate": steps_completed as f64 / total.max(1) as f64,
        "execution_order": execution_order,
    }))
}
