#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **conclave-execution** - drives one agent against one task from start to a
//! terminal state ([`ExecutionEngine`]), and recovers the execution store after an
//! unclean shutdown ([`StartupReconciler`]).
//!
//! An execution binds a primary agent plus any additional agents the task needs,
//! marks them all `Executing`, and races a subprocess attempt against an outer
//! deadline; on timeout or subprocess failure it falls back to a deterministic
//! response rather than leaving the task without output. Every status transition is
//! both persisted through [`conclave_store_core::StoreGateway`] and published on
//! [`conclave_bus::EventBus`].

mod config;
mod engine;
mod reconciler;
mod status;
mod supervisor;

pub use config::EngineConfig;
pub use engine::{ExecutionEngine, StartExecutionRequest};
pub use reconciler::StartupReconciler;
pub use status::SystemStatus;
