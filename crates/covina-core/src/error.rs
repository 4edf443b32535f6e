//! The flat, cross-adapter error taxonomy.
//!
//! `not_found` is deliberately absent from this enum: an absent record is a
//! value (`Option::None`), never an error. See the `StoreAdapter` trait.

use thiserror::Error;

use crate::target::StoreKind;

/// Errors shared by every layer of the coordinator (adapters, the batch
/// engine, the SAGA orchestrator, the distributor).
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Network, timeout, or temporary overload. Retryable by the layer that
    /// raised it; surfaced only once that layer's retry budget is exhausted.
    #[error("transient transport error: {reason}")]
    TransientTransport {
        /// Human-readable cause.
        reason: String,
    },

    /// Schema violation, invalid payload, or a referential error detectable
    /// without I/O. Never retried.
    #[error("bad request: {reason}")]
    BadRequest {
        /// Human-readable cause.
        reason: String,
    },

    /// Duplicate id or revision mismatch. Adapters decide whether this
    /// converts to success (vector, idempotent inserts) or is reported
    /// (relational, document).
    #[error("conflict: {reason}")]
    Conflict {
        /// Human-readable cause.
        reason: String,
    },

    /// The adapter reported unhealthy before the attempt was made.
    #[error("store unavailable: {store:?}")]
    StoreUnavailable {
        /// Which store kind was unreachable.
        store: StoreKind,
    },

    /// A SAGA transaction's dependency graph has a cycle, or a step
    /// definition is otherwise invalid. Raised at orchestrator entry with
    /// no side effects.
    #[error("invalid transaction: {reason}")]
    InvalidTransaction {
        /// Human-readable cause.
        reason: String,
    },

    /// A step or transaction budget was exceeded. Triggers compensation.
    #[error("timeout: {reason}")]
    Timeout {
        /// Human-readable cause.
        reason: String,
    },

    /// The submission was cancelled before it reached a store. Terminal.
    #[error("cancelled")]
    Cancelled,

    /// At least one compensation action failed. Manual remediation expected.
    #[error("compensation failed: {reason}")]
    CompensationFailed {
        /// Human-readable cause.
        reason: String,
    },

    /// No reachable target remained for a `critical` category after
    /// exhausting its fallback chain.
    #[error("unrecoverable unavailability: {reason}")]
    UnrecoverableUnavailability {
        /// Human-readable cause.
        reason: String,
    },

    /// Anything that does not fit the taxonomy above. Kept narrow on
    /// purpose — new call sites should add a proper variant instead of
    /// reaching for this one.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for errors a caller may retry without changing the request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientTransport { .. })
    }

    /// Shorthand constructor for [`Error::Other`].
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}

/// Result alias used throughout the coordinator crates.
pub type Result<T> = std::result::Result<T, Error>;
