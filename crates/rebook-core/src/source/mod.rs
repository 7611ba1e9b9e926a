//! Read-only access to raw staging rows.
//!
//! The pipeline only talks to a [`LineStore`]; where the rows actually live
//! (a staging SQLite file, an in-memory fixture) is the implementation's
//! business.

pub mod memory;
pub mod sqlite;

use chrono::NaiveDate;

use crate::model::{AppointmentQuery, RawAppointment, RawTransactionLine};

pub use memory::MemoryLineStore;
pub use sqlite::SqliteLineStore;

/// Source of raw transaction lines and appointments.
pub trait LineStore {
    /// Non-voided lines whose transaction date is on or after `since`, in
    /// source order.
    ///
    /// Rows whose date cannot be compared (missing or malformed) are
    /// returned too, so validation can report them.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the store cannot be read.
    fn transaction_lines(&self, since: NaiveDate) -> Result<Vec<RawTransactionLine>, SourceError>;

    /// Appointments matching `query`, in source order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the store cannot be read.
    fn appointments(&self, query: &AppointmentQuery) -> Result<Vec<RawAppointment>, SourceError>;
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The store could not be opened at all.
    #[error("failed to open staging store {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A read against an open store failed.
    #[error("staging query for {table} failed: {source}")]
    Query {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// The store is reachable in principle but refused service.
    #[error("staging store unavailable: {0}")]
    Unavailable(String),
}
