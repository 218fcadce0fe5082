#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **conclave-orchestration** - the seven multi-agent coordination patterns (section
//! 4.6), workflow-pattern recommendation (section 4.7), and workflow-execution-scoped
//! startup reconciliation (section 4.8), all built over [`conclave_execution::ExecutionEngine`].
//!
//! ## Architecture
//!
//! - [`OrchestratorCore`] validates a [`conclave_types::WorkflowPattern`], resolves its
//!   agents and tasks, and dispatches to the pattern-specific `patterns` module that
//!   matches `pattern.workflow_type`.
//! - [`WorkflowAnalyzer`] is a pure recommender: given agents, tasks, and an optional
//!   objective, it suggests a pattern without touching the store or bus.
//! - [`WorkflowReconciler`] completes [`conclave_execution::StartupReconciler`]'s sweep
//!   with the workflow-execution-scoped half: abort stale non-terminal runs, delete
//!   aged terminal ones.

mod analyzer;
mod core;
mod patterns;
mod reconciler;
mod support;

pub use analyzer::{WorkflowAnalyzer, WorkflowRecommendation};
pub use core::OrchestratorCore;
pub use reconciler::WorkflowReconciler;
