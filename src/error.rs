//! Error taxonomy for the offer evaluation core.
//!
//! Variants map directly onto the kinds described in the design's error
//! handling section: [`Error::OfferInsufficient`] and
//! [`Error::PersistedTaskMissing`] are recovered locally by the orchestrator
//! (the offending offer is skipped, the next one is tried); the remaining
//! variants are fatal to the current `evaluate` call and propagate to the
//! caller.

use std::fmt;

pub type OperatorResult<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("pod requirement is invalid: {reason}")]
    InvalidRequirement { reason: String },

    #[error("state store read failed: {source}")]
    StateStoreFailure {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("offer insufficient: {reason}")]
    OfferInsufficient { reason: String },

    #[error("persisted task {task_name:?} missing from state store")]
    PersistedTaskMissing { task_name: String },

    #[error("value arithmetic across mismatched kinds: {lhs_kind} vs {rhs_kind}")]
    ValueKindMismatch {
        lhs_kind: &'static str,
        rhs_kind: &'static str,
    },
}

impl Error {
    /// True for the two kinds the orchestrator is expected to recover from
    /// locally (by moving on to the next offer) rather than surface.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::OfferInsufficient { .. } | Error::PersistedTaskMissing { .. }
        )
    }
}

/// A resource/value kind tag used only for error messages, so mismatches
/// read as "scalar vs ranges" rather than a raw discriminant number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Scalar,
    Ranges,
    Set,
    Text,
}

impl ValueKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ValueKind::Scalar => "scalar",
            ValueKind::Ranges => "ranges",
            ValueKind::Set => "set",
            ValueKind::Text => "text",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
