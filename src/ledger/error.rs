use thiserror::Error;

use crate::storage::StorageError;

use super::entities::RecordKey;

/// Reasons the ledger refuses a write. A refused write leaves the ledger untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("activity name is empty")]
    EmptyName,
    #[error("value logged for {name} must be greater than zero")]
    NonPositiveValue { name: String },
    #[error("{key} is not tracked as a count")]
    NotCountMode { key: RecordKey },
    #[error("{key} is not tracked as a duration")]
    NotDurationMode { key: RecordKey },
    #[error("no record for {key}")]
    UnknownRecord { key: RecordKey },
    #[error("{key} is already being tracked")]
    AlreadyTracking { key: RecordKey },
    #[error("{name} isn't being tracked")]
    NotTracking { name: String },
    #[error("can't show {weeks} weeks, at most {max} are supported")]
    TooManyWeeks { weeks: u32, max: u32 },
}

/// Outcome of mirroring an in-memory change into storage. Storage failures never undo the
/// in-memory change.
#[must_use]
#[derive(Debug)]
pub enum Persistence {
    Saved,
    /// Nothing had to be written.
    Untouched,
    Failed(StorageError),
}

impl Persistence {
    pub fn is_failed(&self) -> bool {
        matches!(self, Persistence::Failed(_))
    }
}
