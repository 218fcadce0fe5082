//! Parallel: every task starts concurrently; no early termination on failure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use conclave_types::{Agent, ConclaveError, ExecutionStatus, PatternConfig, Task};
use futures::future::join_all;

use crate::support::{advance, record_message, start_child, wait_terminal, PatternContext};

/// Upper bound on how long any one task is awaited.
pub const PER_CHILD_WAIT: Duration = Duration::from_secs(300);

pub(crate) async fn run(
    ctx: &PatternContext,
    agents: &[Agent],
    tasks: &[Task],
    _config: &PatternConfig,
) -> Result<serde_json::Value, ConclaveError> {
    let total = tasks.len();
    let completed = AtomicUsize::new(0);

    let futures = tasks.iter().enumerate().map(|(i, task)| {
        let agent = &agents[i % agents.len()];
        let completed = &completed;
        async move {
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
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            advance(
                &*ctx.store,
                ctx.workflow_execution_id,
                format!("{done}/{total} tasks finished"),
                0.3 + 0.6 * (done as f64 / total.max(1) as f64),
            )
            .await;

            record_message(
                &*ctx.store,
                &*ctx.bus,
                ctx.workflow_execution_id,
                ctx.enable_agent_communication,
                Some(agent.id),
                None,
                if finished.status == ExecutionStatus::Completed { "child_completed" } else { "child_failed" },
                format!("'{}' finished as {:?}", task.title, finished.status),
                None,
            )
            .await;

            Ok::<(usize, String, bool), ConclaveError>((i, task.title.clone(), finished.status == ExecutionStatus::Completed))
        }
    });

    let mut results = join_all(futures).await.into_iter().collect::<Result<Vec<_>, _>>()?;
    results.sort_by_key(|(i, _, _)| *i);

    let successful_tasks = results.iter().filter(|(_, _, ok)| *ok).count();
    let parallel_results: Vec<serde_json::Value> = results
        .iter()
        .map(|(i, title, ok)| serde_json::json!({"index": i, "task": title, "succeeded": ok}))
        .collect();

    Ok(serde_json::json!({
        "parallel_results": parallel_results,
        "successful_tasks": successful_tasks,
        "concurrency_achieved": agents.len(),
        "parallel_efficiency": successful_tasks as f64 / total.max(1) as f64,
    }))
}
