//! Startup reconciliation for the execution store: the sweep that runs once, before
//! the engine starts accepting new work, to recover from a crash or unclean shutdown.

use std::sync::Arc;

use conclave_store_core::StoreGateway;
use conclave_types::ConclaveError;
use tracing::info;

/// Runs the execution-scoped half of startup reconciliation: dropping orphaned rows
/// and cancelling anything left `Starting` or `Running` from a previous process.
///
/// The workflow-execution-scoped half (stale `pending`/`running`/`paused` workflow
/// executions) is a separate sweep owned by the orchestration layer, since it needs
/// the coordination-pattern context this crate does not have.
pub struct StartupReconciler {
    store: Arc<dyn StoreGateway>,
}

impl StartupReconciler {
    /// Build a reconciler over the given store.
    pub fn new(store: Arc<dyn StoreGateway>) -> Self {
        Self { store }
    }

    /// Delete orphaned execution rows, then cancel every execution left `Starting` or
    /// `Running`, releasing their agents. Returns `(orphaned, cancelled)` counts.
    pub async fn reconcile(&self) -> Result<(u64, u64), ConclaveError> {
        let orphaned = self.store.delete_orphaned_executions().await?;
        if orphaned > 0 {
            info!(count = orphaned, "deleted orphaned execution rows on startup");
        }

        let cancelled = self
            .store
            .cancel_active_executions("cancelled during startup reconciliation")
            .await?;
        if cancelled > 0 {
            info!(count = cancelled, "cancelled executions left active by a previous run");
        }

        Ok((orphaned, cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_store_memory::MemoryBackend;

    #[tokio::test]
    async fn reconcile_runs_cleanly_against_an_empty_store() {
        let store: Arc<dyn StoreGateway> = Arc::new(MemoryBackend::new());
        let reconciler = StartupReconciler::new(store);
        let (orphaned, cancelled) = reconciler.reconcile().await.unwrap();
        assert_eq!(orphaned, 0);
        assert_eq!(cancelled, 0);
    }
}
