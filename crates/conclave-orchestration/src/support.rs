//! Shared scaffolding used by every coordination pattern: starting and awaiting
//! child executions, and recording coordination messages against the workflow run.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use conclave_bus::{Event, EventBus, Topic};
use conclave_execution::{ExecutionEngine, StartExecutionRequest};
use conclave_store_core::StoreGateway;
use conclave_types::{
    AgentId, ConclaveError, Execution, InterAgentMessage, MessageId, TaskId, WorkflowExecutionId,
};
use tracing::warn;

/// Poll interval used by every pattern that waits on a child execution.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Start one child execution pinning a single agent to a single task.
pub async fn start_child(
    engine: &ExecutionEngine,
    agent_id: AgentId,
    task_id: TaskId,
    project_directory: &str,
) -> Result<Execution, ConclaveError> {
    engine
        .start_task_execution(StartExecutionRequest {
            task_id,
            agent_ids: Some(vec![agent_id]),
            work_directory: Some(format!("{project_directory}/task_{task_id}_{agent_id}")),
            force_restart: false,
        })
        .await
}

/// Poll a child execution until it reaches a terminal state or `max_wait` elapses.
/// Returns the last observed row either way; the caller decides how to treat a
/// still-non-terminal result.
pub async fn wait_terminal(
    store: &dyn StoreGateway,
    execution_id: conclave_types::ExecutionId,
    max_wait: Duration,
) -> Execution {
    let deadline = tokio::time::Instant::now() + max_wait;
    loop {
        match store.get_execution(execution_id).await {
            Ok(execution) if execution.status.is_terminal() => return execution,
            Ok(execution) => {
                if tokio::time::Instant::now() >= deadline {
                    return execution;
                }
            }
            Err(err) => {
                warn!(%err, %execution_id, "failed to poll child execution");
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Record a coordination message against a workflow run and, when
/// `enable_agent_communication` is set, publish it on the event bus.
#[allow(clippy::too_many_arguments)]
pub async fn record_message(
    store: &dyn StoreGateway,
    bus: &dyn EventBus,
    workflow_execution_id: WorkflowExecutionId,
    enable_agent_communication: bool,
    from_agent: Option<AgentId>,
    to_agent: Option<AgentId>,
    message_type: &str,
    message: impl Into<String>,
    payload: Option<serde_json::Value>,
) {
    if !enable_agent_communication {
        return;
    }
    let record = InterAgentMessage {
        id: MessageId::new(),
        execution_id: workflow_execution_id,
        from_agent,
        to_agent,
        message_type: message_type.to_string(),
        message: message.into(),
        payload,
        timestamp: Utc::now(),
        acknowledged: false,
    };
    if let Err(err) = store.record_agent_communication(workflow_execution_id, record.clone()).await {
        warn!(%err, %workflow_execution_id, "failed to persist coordination message");
    }
    let event = Event::new(
        Topic::WorkflowEvent,
        message_type.to_string(),
        serde_json::json!({
            "workflow_execution_id": workflow_execution_id,
            "message": record.message,
        }),
    );
    if let Err(err) = bus.publish(event) {
        warn!(%err, "failed to publish coordination event");
    }
}

/// Update a workflow run's progress projection, logging but not failing the pattern
/// on a store error (progress is best-effort observability, never load-bearing).
pub async fn advance(store: &dyn StoreGateway, id: WorkflowExecutionId, step: impl Into<String>, progress: f64) {
    if let Err(err) = store.update_workflow_progress(id, step.into(), progress.clamp(0.0, 0.95)).await {
        warn!(%err, %id, "failed to update workflow progress");
    }
}

/// Shared input every pattern executor receives: the engine to drive children
/// through, the store/bus for bookkeeping, and the workflow-run context.
pub struct PatternContext {
    /// Drives every child execution.
    pub engine: Arc<ExecutionEngine>,
    /// Persists coordination messages and progress.
    pub store: Arc<dyn StoreGateway>,
    /// Publishes workflow-level events.
    pub bus: Arc<dyn EventBus>,
    /// The workflow run being advanced.
    pub workflow_execution_id: WorkflowExecutionId,
    /// Working directory passed to every child execution.
    pub project_directory: String,
    /// Whether to persist/publish coordination messages.
    pub enable_agent_communication: bool,
}
