//! Durable mirror of the ledger.
//!  - Records are stored as documents keyed by their id.
//!  - Writes are staged with [ActivityStorage::insert]/[ActivityStorage::delete] and become
//!    durable on [ActivityStorage::commit].
//!  - [json_storage::JsonFileStorage] keeps one JSON document per line in a single file.

pub mod json_storage;

use std::ops::DerefMut;

use thiserror::Error;

use crate::ledger::entities::ActivityRecord;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Interface of the persistence collaborator used by [Ledger](crate::ledger::Ledger).
#[cfg_attr(test, mockall::automock)]
pub trait ActivityStorage {
    /// Reads every stored record, most recent day first.
    fn fetch_all(&mut self) -> Result<Vec<ActivityRecord>, StorageError>;

    /// Stages an insert, or a replacement of a record with the same id.
    fn insert(&mut self, record: &ActivityRecord);

    /// Stages removal of the record with the same id.
    fn delete(&mut self, record: &ActivityRecord);

    /// Makes staged changes durable. Staged changes survive a failed commit.
    fn commit(&mut self) -> Result<(), StorageError>;
}

impl<T: DerefMut> ActivityStorage for T
where
    T::Target: ActivityStorage,
{
    fn fetch_all(&mut self) -> Result<Vec<ActivityRecord>, StorageError> {
        self.deref_mut().fetch_all()
    }

    fn insert(&mut self, record: &ActivityRecord) {
        self.deref_mut().insert(record)
    }

    fn delete(&mut self, record: &ActivityRecord) {
        self.deref_mut().delete(record)
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.deref_mut().commit()
    }
}
