//! Error taxonomy for PlanForge.
//!
//! The governing contract: one bad export job or one malformed drawing node
//! must never degrade the worker pool or the rest of an extraction pass.
//! Submission-time problems surface as [`PlanforgeError::InputValidation`]
//! and are never enqueued; encoder failures are caught per job and recorded
//! on the job row; store failures propagate to the triggering call with
//! no internal retry or backoff.

use thiserror::Error;

/// All failure modes surfaced by the library.
#[derive(Debug, Error)]
pub enum PlanforgeError {
    /// Bad building id, unrecognized format/quality, or malformed XML.
    /// Raised at submission or parse time, before any work is queued.
    #[error("input validation failed: {0}")]
    InputValidation(String),

    /// A format encoder failed internally. Caught per job; the owning job
    /// is marked FAILED and other jobs are unaffected.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// The job store is unavailable or rejected a statement.
    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// The bounded submission queue is at capacity.
    #[error("export queue is full")]
    QueueFull,

    /// Artifact file I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PlanforgeError>;
