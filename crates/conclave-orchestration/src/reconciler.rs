//! The workflow-execution-scoped half of startup reconciliation: sweeping stale
//! workflow runs a previous process left non-terminal, or never cleaned up.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use conclave_store_core::StoreGateway;
use conclave_types::{ConclaveError, WorkflowExecutionStatus};
use tracing::info;

const NON_TERMINAL: &[WorkflowExecutionStatus] = &[
    WorkflowExecutionStatus::Pending,
    WorkflowExecutionStatus::Starting,
    WorkflowExecutionStatus::Running,
    WorkflowExecutionStatus::Paused,
];

const TERMINAL: &[WorkflowExecutionStatus] = &[
    WorkflowExecutionStatus::Completed,
    WorkflowExecutionStatus::Failed,
];

/// Completes [`conclave_execution::StartupReconciler`]'s sweep with the two
/// workflow-execution-scoped steps: aborting stale non-terminal runs, then deleting
/// aged terminal ones.
pub struct WorkflowReconciler {
    store: Arc<dyn StoreGateway>,
    stale_after: Duration,
}

impl WorkflowReconciler {
    /// Build a reconciler over the given store, using `stale_after` as the age
    /// threshold for both sweeps.
    pub fn new(store: Arc<dyn StoreGateway>, stale_after: Duration) -> Self {
        Self { store, stale_after }
    }

    /// Abort every non-terminal workflow execution older than `stale_after`, then
    /// delete every terminal one older than `stale_after`. Returns `(aborted, deleted)`.
    pub async fn reconcile(&self) -> Result<(u64, u64), ConclaveError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(self.stale_after).unwrap_or(chrono::Duration::zero());

        let stale_active = self.store.sweep_stale(cutoff, NON_TERMINAL).await?;
        for id in &stale_active {
            self.store
                .set_workflow_terminal(
                    *id,
                    WorkflowExecutionStatus::Aborted,
                    None,
                    Some("aborted during startup reconciliation".to_string()),
                )
                .await?;
        }
        if !stale_active.is_empty() {
            info!(count = stale_active.len(), "aborted stale workflow executions on startup");
        }

        let aged_terminal = self.store.sweep_stale(cutoff, TERMINAL).await?;
        for id in &aged_terminal {
            self.store.delete_workflow_execution(*id).await?;
        }
        if !aged_terminal.is_empty() {
            info!(count = aged_terminal.len(), "deleted aged terminal workflow executions");
        }

        Ok((stale_active.len() as u64, aged_terminal.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_store_memory::MemoryBackend;

    #[tokio::test]
    async fn reconcile_runs_cleanly_against_an_empty_store() {
        let store: Arc<dyn StoreGateway> = Arc::new(MemoryBackend::new());
        let reconciler = WorkflowReconciler::new(store, Duration::from_secs(3600));
        let (aborted, deleted) = reconciler.reconcile().await.unwrap();
        assert_eq!(aborted, 0);
        assert_eq!(deleted, 0);
    }
}
