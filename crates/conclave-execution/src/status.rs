use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A read-only projection over the engine's running totals, returned by
/// [`crate::ExecutionEngine::get_system_status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Executions currently in `Starting`, `Running`, or `Paused`.
    pub active_executions: u64,
    /// Executions started since this engine instance came up.
    pub total_started: u64,
    /// Executions that reached `Completed`.
    pub total_completed: u64,
    /// Executions that reached `Failed` or `Timeout`.
    pub total_failed: u64,
    /// Executions that reached `Cancelled` or `Aborted`.
    pub total_cancelled: u64,
    /// How long this engine instance has been running.
    pub uptime: Duration,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) total_started: u64,
    pub(crate) total_completed: u64,
    pub(crate) total_failed: u64,
    pub(crate) total_cancelled: u64,
}
