//! Idempotent storage of consolidated records.
//!
//! Writes are replace-if-exists on [`RecordKey`](crate::model::RecordKey):
//! writing the same record twice leaves the same stored state as writing it
//! once.

pub mod memory;
pub mod sqlite;

use chrono::NaiveDate;
use serde::Serialize;
use std::ops::AddAssign;

use crate::model::ConsolidatedRecord;

pub use memory::MemoryRecordSink;
pub use sqlite::SqliteRecordSink;

/// What one batch write did to the stored rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub inserted: u64,
    pub updated: u64,
    /// Rows whose stored content already matched.
    pub unchanged: u64,
}

impl BatchOutcome {
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.inserted + self.updated
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.inserted + self.updated + self.unchanged
    }
}

impl AddAssign for BatchOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.updated += rhs.updated;
        self.unchanged += rhs.unchanged;
    }
}

/// Destination for consolidated records.
pub trait RecordSink {
    /// Upsert one batch atomically: either every record lands or none do.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the batch could not be committed.
    fn write_batch(&mut self, records: &[ConsolidatedRecord]) -> Result<BatchOutcome, SinkError>;

    /// Called once after every batch of a run has been committed.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if run bookkeeping could not be stored.
    fn finish_run(&mut self, _window_start: NaiveDate, _records: u64) -> Result<(), SinkError> {
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("output database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored row could not be decoded back into a record.
    #[error("corrupt output row {key}: {detail}")]
    Corrupt { key: String, detail: String },

    #[error("sink rejected batch: {0}")]
    Rejected(String),
}
