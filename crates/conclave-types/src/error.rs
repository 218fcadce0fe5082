//! Crate-wide error taxonomy (section 7).
//!
//! Every public operation across the engine returns [`ConclaveError`] at its boundary.
//! Internal fallible helpers are free to use `anyhow::Result` and convert at that
//! boundary; the conversion is where an [`ErrorKind::Internal`] gets its `error_id`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The taxonomy of error kinds a caller may observe, independent of the Rust type
/// that carries it. Mirrors section 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Entity id does not resolve.
    NotFound,
    /// Unique-name collision, busy agent, inactive pattern, or active runs blocking a delete.
    Conflict,
    /// Schema bound violated.
    Invariant,
    /// Deadline elapsed.
    Timeout,
    /// The primary subprocess runner raised or exited non-zero.
    SubprocessFailure,
    /// Uncaught condition; always paired with an `error_id`.
    Internal,
}

/// The single error type returned by every public operation in the engine.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum ConclaveError {
    /// An entity id did not resolve. `entity` names the kind ("agent", "task", ...).
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// The kind of entity that was looked up.
        entity: &'static str,
        /// The id that was looked up, rendered for display.
        id: String,
    },

    /// A conflicting state prevented the operation. `suggestion` is shown to the caller.
    #[error("conflict: {message} ({suggestion})")]
    Conflict {
        /// Human-readable description of the conflict.
        message: String,
        /// Actionable suggestion (e.g. "use force=true to override").
        suggestion: String,
        /// Entities blocking the operation (busy agent names, active execution ids, ...).
        blocking: Vec<String>,
    },

    /// A schema bound was violated.
    #[error("invariant violated on field '{field}': {bound}")]
    Invariant {
        /// The offending field.
        field: String,
        /// The violated bound, in words.
        bound: String,
    },

    /// A deadline elapsed.
    #[error("timed out after {timeout_seconds}s")]
    Timeout {
        /// The effective timeout that elapsed, in seconds.
        timeout_seconds: u64,
    },

    /// The primary subprocess runner raised or exited non-zero.
    #[error("subprocess failed: {message}")]
    SubprocessFailure {
        /// Human-readable message from the failed attempt.
        message: String,
    },

    /// An uncaught condition occurred. Never includes a stack trace.
    #[error("internal error (id: {error_id})")]
    Internal {
        /// Opaque id correlating this response with a logged `tracing::error!` event.
        error_id: String,
        /// Human-readable message, logged but not necessarily returned verbatim to callers.
        message: String,
    },
}

impl ConclaveError {
    /// The [`ErrorKind`] this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Invariant { .. } => ErrorKind::Invariant,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::SubprocessFailure { .. } => ErrorKind::SubprocessFailure,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Construct a [`ConclaveError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    /// Construct a [`ConclaveError::Conflict`] with no blocking entities enumerated.
    pub fn conflict(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Conflict { message: message.into(), suggestion: suggestion.into(), blocking: Vec::new() }
    }

    /// Construct a [`ConclaveError::Conflict`] naming the blocking entities.
    pub fn conflict_with(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        blocking: Vec<String>,
    ) -> Self {
        Self::Conflict { message: message.into(), suggestion: suggestion.into(), blocking }
    }

    /// Construct a [`ConclaveError::Invariant`].
    pub fn invariant(field: impl Into<String>, bound: impl Into<String>) -> Self {
        Self::Invariant { field: field.into(), bound: bound.into() }
    }

    /// Construct a [`ConclaveError::Timeout`].
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Construct a [`ConclaveError::SubprocessFailure`].
    pub fn subprocess_failure(message: impl Into<String>) -> Self {
        Self::SubprocessFailure { message: message.into() }
    }

    /// Wrap an opaque failure as [`ConclaveError::Internal`], minting a fresh 8-character
    /// `error_id` and logging the message at `error` level before returning. This is the
    /// only place an `error_id` is generated, so the id on the wire always matches the id
    /// in the logs.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        let error_id = Uuid::new_v4().simple().to_string()[..8].to_string();
        tracing::error!(error_id = %error_id, %message, "internal error");
        Self::Internal { error_id, message }
    }
}

impl From<anyhow::Error> for ConclaveError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_error_id_is_eight_lowercase_hex_chars() {
        let err = ConclaveError::internal("boom");
        match err {
            ConclaveError::Internal { error_id, .. } => {
                assert_eq!(error_id.len(), 8);
                assert!(error_id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
            }
            _ => panic!("expected Internal"),
        }
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(ConclaveError::not_found("agent", "x").kind(), ErrorKind::NotFound);
        assert_eq!(ConclaveError::timeout(60).kind(), ErrorKind::Timeout);
    }
}
