use thiserror::Error;
use uuid::Uuid;

/// Outcome of a failed intake call.
///
/// `DuplicateConflict` is an ordinary, recoverable result: the check that
/// produces it only reads, so the caller may surface the message to the end
/// user and keep using its session. The other variants are faults.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// An active request already targets the same logical resource.
    #[error("{message}")]
    DuplicateConflict {
        message: String,
        /// Identifier of the blocking request, when it is known.
        existing_id: Option<Uuid>,
    },

    /// A payload could not be represented in storage form.
    #[error("cannot serialize change content: {0}")]
    Serialization(String),

    /// The persistence port failed.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl IntakeError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, IntakeError::DuplicateConflict { .. })
    }
}

pub type IntakeResult<T> = Result<T, IntakeError>;

/// Raised by a store when the `dedup_key` of a new active request is already
/// held by another active request. Travels inside `anyhow::Error` and is
/// turned back into [`IntakeError::DuplicateConflict`] by the intake service.
#[derive(Debug, Error)]
#[error("an active change request already holds dedup key {dedup_key}")]
pub struct DedupKeyTaken {
    pub dedup_key: String,
}
