//! [`OrchestratorCore`]: executes a [`WorkflowPattern`] as a run of child executions
//! under one of the seven coordination patterns.

use std::sync::Arc;

use conclave_bus::{Event, EventBus, Topic};
use conclave_execution::ExecutionEngine;
use conclave_store_core::StoreGateway;
use conclave_types::{
    ConclaveError, PatternId, PatternStatus, WorkflowExecution, WorkflowExecutionId,
    WorkflowExecutionStatus,
};
use tracing::{info, instrument, warn};

use crate::patterns;
use crate::support::PatternContext;

/// Drives [`WorkflowPattern`](conclave_types::WorkflowPattern) runs to completion
/// over a pool of [`ExecutionEngine`]-managed child executions.
pub struct OrchestratorCore {
    store: Arc<dyn StoreGateway>,
    bus: Arc<dyn EventBus>,
    engine: Arc<ExecutionEngine>,
}

impl OrchestratorCore {
    /// Build a core over the given store, event bus, and execution engine.
    pub fn new(store: Arc<dyn StoreGateway>, bus: Arc<dyn EventBus>, engine: Arc<ExecutionEngine>) -> Self {
        Self { store, bus, engine }
    }

    /// Run `pattern_id` to a terminal [`WorkflowExecution`].
    ///
    /// Resolves every agent and task the pattern references before creating any row,
    /// so a dangling reference surfaces as `NotFound` with the pattern left untouched.
    #[instrument(skip(self), fields(pattern_id = %pattern_id))]
    pub async fn execute_workflow(&self, pattern_id: PatternId) -> Result<WorkflowExecution, ConclaveError> {
        let pattern = self.store.get_pattern(pattern_id).await?;
        if pattern.status != PatternStatus::Active {
            return Err(ConclaveError::conflict(
                format!("pattern is {:?}, not active", pattern.status),
                "only an active pattern can be executed",
            ));
        }

        let agents = self.store.list_agents_by_ids(&pattern.agent_ids).await?;
        if agents.len() != pattern.agent_ids.len() {
            return Err(ConclaveError::not_found("agent", "one or more referenced agent ids"));
        }
        let mut tasks = Vec::with_capacity(pattern.task_ids.len());
        for task_id in &pattern.task_ids {
            tasks.push(self.store.get_task(*task_id).await?);
        }

        let run = self.store.create_workflow_execution(pattern_id).await?;
        self.store.set_workflow_running(run.id).await?;
        self.publish("started", run.id, pattern_id);
        info!(workflow_execution_id = %run.id, pattern_id = %pattern_id, workflow_type = ?pattern.workflow_type, "executing workflow pattern");

        let ctx = PatternContext {
            engine: Arc::clone(&self.engine),
            store: Arc::clone(&self.store),
            bus: Arc::clone(&self.bus),
            workflow_execution_id: run.id,
            project_directory: pattern.project_directory.clone(),
            enable_agent_communication: pattern.config.enable_agent_communication,
        };

        let outcome = patterns::execute(pattern.workflow_type, &ctx, &agents, &tasks, &pattern.config).await;

        let finished = match outcome {
            Ok(results) => {
                let finished = self
                    .store
                    .set_workflow_terminal(run.id, WorkflowExecutionStatus::Completed, Some(results), None)
                    .await?;
                self.publish("completed", run.id, pattern_id);
                finished
            }
            Err(err) => {
                warn!(%err, workflow_execution_id = %run.id, "workflow pattern run failed");
                let finished = self
                    .store
                    .set_workflow_terminal(
                        run.id,
                        WorkflowExecutionStatus::Failed,
                        None,
                        Some(err.to_string()),
                    )
                    .await?;
                self.publish("failed", run.id, pattern_id);
                finished
            }
        };

        Ok(finished)
    }

    /// Cancel a non-terminal workflow execution. In-flight child executions are not
    /// cascaded into; a full stop requires aborting each child explicitly.
    pub async fn abort_workflow_execution(
        &self,
        id: WorkflowExecutionId,
    ) -> Result<WorkflowExecution, ConclaveError> {
        let run = self.store.get_workflow_execution(id).await?;
        if run.status.is_terminal() {
            return Err(ConclaveError::conflict("workflow execution is already terminal", "nothing to abort"));
        }
        let finished = self
            .store
            .set_workflow_terminal(
                id,
                WorkflowExecutionStatus::Cancelled,
                None,
                Some("user aborted".to_string()),
            )
            .await?;
        self.publish("aborted", id, run.pattern_id);
        Ok(finished)
    }

    fn publish(&self, event_type: &str, workflow_execution_id: WorkflowExecutionId, pattern_id: PatternId) {
        let payload = serde_json::json!({
            "workflow_execution_id": workflow_execution_id,
            "pattern_id": pattern_id,
        });
        if let Err(err) = self.bus.publish(Event::new(Topic::WorkflowEvent, event_type, payload)) {
            warn!(%err, "failed to publish workflow event");
        }
    }
}
