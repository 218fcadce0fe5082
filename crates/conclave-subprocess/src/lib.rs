#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **conclave-subprocess** - runs the external code-assistant process for one
//! prompt ([`SubprocessRunner`]), and the deterministic stand-in used when that
//! fails ([`FallbackResponder`]).
//!
//! The subprocess mechanics (piped stdio, `spawn`, `wait_with_output`, a
//! `tokio::time::timeout` wrapper) follow the same shape used elsewhere in this
//! workspace for running external processes; what's new here is the
//! structured-chunk streaming contract and the turn/deadline bookkeeping this
//! engine requires instead of a sandboxed one-shot script run.

mod fallback;
mod runner;

pub use fallback::FallbackResponder;
pub use runner::{SubprocessConfig, SubprocessOutcome, SubprocessRunner};
