use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::{BatchOutcome, RecordSink, SinkError};
use crate::model::{ConsolidatedRecord, RecordKey};

/// In-memory [`RecordSink`] with the same replace-if-exists semantics as
/// the SQLite sink. Can be told to fail a given batch, for testing partial
/// runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordSink {
    rows: BTreeMap<RecordKey, (String, ConsolidatedRecord)>,
    batches_seen: usize,
    fail_on_batch: Option<usize>,
    finished: Option<(NaiveDate, u64)>,
}

impl MemoryRecordSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the batch with this zero-based index (and keep accepting
    /// others).
    #[must_use]
    pub const fn fail_on_batch(mut self, index: usize) -> Self {
        self.fail_on_batch = Some(index);
        self
    }

    /// Stored records in key order.
    pub fn records(&self) -> impl Iterator<Item = &ConsolidatedRecord> {
        self.rows.values().map(|(_, record)| record)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Window start and record count passed to the last `finish_run`.
    #[must_use]
    pub const fn finished(&self) -> Option<(NaiveDate, u64)> {
        self.finished
    }
}

impl RecordSink for MemoryRecordSink {
    fn write_batch(&mut self, records: &[ConsolidatedRecord]) -> Result<BatchOutcome, SinkError> {
        let index = self.batches_seen;
        self.batches_seen += 1;
        if self.fail_on_batch == Some(index) {
            return Err(SinkError::Rejected(format!("batch {index} refused")));
        }

        let mut outcome = BatchOutcome::default();
        for record in records {
            let fingerprint = record.fingerprint();
            match self.rows.get(&record.key) {
                Some((stored, _)) if *stored == fingerprint => {
                    outcome.unchanged += 1;
                    continue;
                }
                Some(_) => outcome.updated += 1,
                None => outcome.inserted += 1,
            }
            self.rows
                .insert(record.key.clone(), (fingerprint, record.clone()));
        }
        Ok(outcome)
    }

    fn finish_run(&mut self, window_start: NaiveDate, records: u64) -> Result<(), SinkError> {
        self.finished = Some((window_start, records));
        Ok(())
    }
}
