//! The supervised run: the body spawned onto the runtime for every execution
//! attempt, whether reached via a fresh start or a resume.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use conclave_bus::{Event, EventBus, Topic};
use conclave_store_core::StoreGateway;
use conclave_subprocess::{FallbackResponder, SubprocessRunner, DEFAULT_MAX_TURNS};
use conclave_types::{
    AgentId, AgentResponse, AgentStatus, ConclaveError, ExecutionErrorDetails, ExecutionId,
    ExecutionMethod, ExecutionStatus, LogLevel, TaskId,
};
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::config::EngineConfig;
use crate::status::Counters;

/// Transition `execution_id` to `Running`, append the opening timeout log line, and
/// publish `event_type` ("started" or "resumed").
pub(crate) async fn begin_running(
    store: &dyn StoreGateway,
    bus: &dyn EventBus,
    execution_id: ExecutionId,
    task_id: TaskId,
    agent_id: AgentId,
    deadline: Duration,
    event_type: &str,
) -> Result<(), ConclaveError> {
    store.set_status(execution_id, ExecutionStatus::Running).await?;
    store
        .append_log(
            execution_id,
            LogLevel::Info,
            format!("starting with {}s timeout", deadline.as_secs()),
        )
        .await?;
    publish(bus, Topic::ExecutionEvent, event_type, execution_id, task_id, agent_id, ExecutionStatus::Running);
    Ok(())
}

/// Full supervised run for a freshly started execution: transitions it to `Running`
/// and then drives it to a terminal state. Used by [`crate::ExecutionEngine::start_task_execution`].
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_supervised(
    store: Arc<dyn StoreGateway>,
    bus: Arc<dyn EventBus>,
    runner: Arc<SubprocessRunner>,
    config: EngineConfig,
    execution_id: ExecutionId,
    task_id: TaskId,
    agent_ids: Vec<AgentId>,
    primary_agent_role: String,
    primary_agent_name: String,
    task_title: String,
    prompt: String,
    work_directory: String,
    deadline: Duration,
    counters: Arc<Mutex<Counters>>,
    agent_sets: Arc<RwLock<HashMap<ExecutionId, Vec<AgentId>>>>,
) {
    let primary_agent_id = agent_ids[0];
    if let Err(err) = begin_running(&*store, &*bus, execution_id, task_id, primary_agent_id, deadline, "started").await
    {
        warn!(%err, "failed to begin supervised run");
        return;
    }
    run_attempt_and_finish(
        store,
        bus,
        runner,
        config,
        execution_id,
        task_id,
        agent_ids,
        primary_agent_role,
        primary_agent_name,
        task_title,
        prompt,
        work_directory,
        deadline,
        counters,
        agent_sets,
    )
    .await;
}

/// The subprocess-then-fallback attempt, bounded by `deadline`, followed by committing
/// the execution's terminal state and releasing every agent in `agent_ids`. Used both
/// by a fresh start (after [`begin_running`]) and by a resume (which calls
/// [`begin_running`] itself, synchronously, before spawning this).
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_attempt_and_finish(
    store: Arc<dyn StoreGateway>,
    bus: Arc<dyn EventBus>,
    runner: Arc<SubprocessRunner>,
    config: EngineConfig,
    execution_id: ExecutionId,
    task_id: TaskId,
    agent_ids: Vec<AgentId>,
    primary_agent_role: String,
    primary_agent_name: String,
    task_title: String,
    prompt: String,
    work_directory: String,
    deadline: Duration,
    counters: Arc<Mutex<Counters>>,
    agent_sets: Arc<RwLock<HashMap<ExecutionId, Vec<AgentId>>>>,
) {
    let primary_agent_id = agent_ids[0];

    let outcome = tokio::time::timeout(
        deadline,
        attempt(
            &*runner,
            &*store,
            execution_id,
            &primary_agent_role,
            &primary_agent_name,
            &task_title,
            &prompt,
            &work_directory,
            config.subprocess_inner_timeout,
        ),
    )
    .await;

    let (status, output, error_details) = match outcome {
        Ok(Ok(response)) => (
            ExecutionStatus::Completed,
            Some(serde_json::to_value(&response).unwrap_or(serde_json::Value::Null)),
            None,
        ),
        Ok(Err(err)) => {
            let _ = store
                .append_log(execution_id, LogLevel::Error, format!("execution failed: {err}"))
                .await;
            (
                ExecutionStatus::Failed,
                None,
                Some(ExecutionErrorDetails::Internal { message: err.to_string() }),
            )
        }
        Err(_) => {
            let _ = store
                .append_log(
                    execution_id,
                    LogLevel::Error,
                    format!("timed out after {}s", deadline.as_secs()),
                )
                .await;
            (
                ExecutionStatus::Timeout,
                None,
                Some(ExecutionErrorDetails::Timeout { timeout_seconds: deadline.as_secs() }),
            )
        }
    };

    if let Err(err) = store.set_status_terminal(execution_id, status, output, error_details).await {
        warn!(%err, "failed to commit terminal execution status");
    }

    for agent_id in &agent_ids {
        if let Err(err) = store.set_agent_status(*agent_id, AgentStatus::Idle).await {
            warn!(%err, %agent_id, "failed to release agent");
        }
    }
    agent_sets.write().await.remove(&execution_id);

    {
        let mut counters = counters.lock().await;
        match status {
            ExecutionStatus::Completed => counters.total_completed += 1,
            ExecutionStatus::Failed | ExecutionStatus::Timeout => counters.total_failed += 1,
            _ => {}
        }
    }

    let event_type = if matches!(status, ExecutionStatus::Completed) { "completed" } else { "failed" };
    publish(&bus, Topic::ExecutionEvent, event_type, execution_id, task_id, primary_agent_id, status);
}

/// The primary/fallback attempt itself. Always resolves to `Ok`: the fallback path
/// never fails, and a subprocess failure is logged and absorbed, not propagated.
#[allow(clippy::too_many_arguments)]
async fn attempt(
    runner: &SubprocessRunner,
    store: &dyn StoreGateway,
    execution_id: ExecutionId,
    agent_role: &str,
    agent_name: &str,
    task_title: &str,
    prompt: &str,
    work_directory: &str,
    inner_timeout: Duration,
) -> Result<AgentResponse, ConclaveError> {
    match runner.run(prompt, work_directory, DEFAULT_MAX_TURNS, inner_timeout.as_secs()).await {
        Ok(outcome) => Ok(AgentResponse {
            aggregated_text: outcome.aggregated_text,
            execution_method: ExecutionMethod::Subprocess,
            messages_count: outcome.messages_count,
            analysis: None,
        }),
        Err(err) => {
            let _ = store
                .append_log(
                    execution_id,
                    LogLevel::Warn,
                    format!("subprocess failed: {err}, using fallback"),
                )
                .await;
            let fallback = FallbackResponder::respond(agent_role, agent_name, task_title).await;
            Ok(AgentResponse {
                aggregated_text: fallback.aggregated_text,
                execution_method: ExecutionMethod::Fallback,
                messages_count: 0,
                analysis: Some(fallback.analysis),
            })
        }
    }
}

pub(crate) fn publish(
    bus: &dyn EventBus,
    topic: Topic,
    event_type: &str,
    execution_id: ExecutionId,
    task_id: TaskId,
    agent_id: AgentId,
    status: ExecutionStatus,
) {
    let payload = serde_json::json!({
        "execution_id": execution_id,
        "task_id": task_id,
        "agent_id": agent_id,
        "status": status,
    });
    if let Err(err) = bus.publish(Event::new(topic, event_type, payload)) {
        warn!(%err, "failed to publish execution event");
    }
}
