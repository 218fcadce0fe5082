use std::time::Duration;

/// Deadline and reconciliation constants for [`crate::ExecutionEngine`].
///
/// Every field has a binding default; callers only need to override what they care
/// about. The CLI crate is the one place these are assembled from environment
/// variables or flags.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Outer per-execution deadline when the task carries no `estimated_duration`.
    pub default_timeout: Duration,
    /// Hard ceiling on the outer deadline regardless of `estimated_duration`.
    pub max_timeout: Duration,
    /// Deadline for the primary subprocess attempt before falling back.
    pub subprocess_inner_timeout: Duration,
    /// Age past which a non-terminal execution or workflow execution is considered
    /// stale by [`crate::StartupReconciler`].
    pub stale_after: Duration,
    /// Root directory under which a default per-execution work directory is created
    /// when the caller does not supply one.
    pub work_directory_root: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(300),
            max_timeout: Duration::from_secs(600),
            subprocess_inner_timeout: Duration::from_secs(60),
            stale_after: Duration::from_secs(3600),
            work_directory_root: "./claude_executions".to_string(),
        }
    }
}

impl EngineConfig {
    /// The outer timeout for a task, honoring `estimated_duration` when present and
    /// clamping to [`EngineConfig::max_timeout`].
    pub fn outer_timeout(&self, estimated_minutes: Option<u32>) -> Duration {
        let base = estimated_minutes
            .map(|m| Duration::from_secs(u64::from(m) * 60))
            .unwrap_or(self.default_timeout);
        base.min(self.max_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outer_timeout_falls_back_to_default_when_unestimated() {
        let config = EngineConfig::default();
        assert_eq!(config.outer_timeout(None), Duration::from_secs(300));
    }

    #[test]
    fn outer_timeout_clamps_to_max() {
        let config = EngineConfig::default();
        assert_eq!(config.outer_timeout(Some(120)), Duration::from_secs(600));
    }

    #[test]
    fn outer_timeout_honors_estimate_under_the_ceiling() {
        let config = EngineConfig::default();
        assert_eq!(config.outer_timeout(Some(2)), Duration::from_secs(120));
    }
}
