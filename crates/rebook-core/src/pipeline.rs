//! One batch run over a recent window.
//!
//! 1. Read lines and appointments from the [`LineStore`] (every read happens
//!    before any write, so a failing source leaves the output untouched)
//! 2. Validate, collecting rejections
//! 3. Group lines into visits
//! 4. Per client: attribute each visit, resolve rebooking, consolidate
//! 5. Write records to the [`RecordSink`] in transactional batches

use chrono::{Days, NaiveDate};
use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::attribution::attribute;
use crate::consolidate::consolidate;
use crate::error::ErrorCode;
use crate::group::group_lines;
use crate::model::{AppointmentQuery, ClientId, ConsolidatedRecord};
use crate::rebooking::{AppointmentIndex, RebookingResolver};
use crate::sink::{BatchOutcome, RecordSink, SinkError};
use crate::source::{LineStore, SourceError};
use crate::validate::{Rejection, validate_appointments, validate_lines};

/// Default records per sink transaction.
pub const DEFAULT_BATCH_SIZE: usize = 500;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Reference day; the window ends here.
    pub today: NaiveDate,
    /// The window starts this many days before `today`.
    pub days_back: u32,
    pub batch_size: usize,
    pub walk_in_client_ids: Vec<ClientId>,
}

impl RunOptions {
    #[must_use]
    pub const fn new(today: NaiveDate, days_back: u32) -> Self {
        Self {
            today,
            days_back,
            batch_size: DEFAULT_BATCH_SIZE,
            walk_in_client_ids: Vec::new(),
        }
    }

    /// Batch size, clamped to at least 1.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_walk_ins(mut self, ids: impl IntoIterator<Item = ClientId>) -> Self {
        self.walk_in_client_ids = ids.into_iter().collect();
        self
    }

    /// First day of the window (inclusive).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidWindow`] if the start falls outside
    /// the representable date range.
    pub fn window_start(&self) -> Result<NaiveDate, PipelineError> {
        self.today
            .checked_sub_days(Days::new(u64::from(self.days_back)))
            .ok_or(PipelineError::InvalidWindow {
                today: self.today,
                days_back: self.days_back,
            })
    }
}

// ---------------------------------------------------------------------------
// Report and errors
// ---------------------------------------------------------------------------

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    /// Raw lines returned by the source, before validation.
    pub lines_read: usize,
    /// Raw appointments returned by the source (window and arrival history).
    pub appointments_read: usize,
    pub transactions: usize,
    pub clients: usize,
    pub records: usize,
    /// Visits marked rebooked.
    pub rebooked_visits: usize,
    pub batches: usize,
    pub outcome: BatchOutcome,
    pub rejections: Vec<Rejection>,
    pub elapsed: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("window of {days_back} days before {today} is out of range")]
    InvalidWindow { today: NaiveDate, days_back: u32 },

    /// Nothing was written.
    #[error("source read failed: {0}")]
    Source(#[from] SourceError),

    /// Batches before `batch` are committed and stay valid.
    #[error("sink write failed on batch {batch} ({committed} batches committed): {source}")]
    Sink {
        batch: usize,
        committed: usize,
        #[source]
        source: SinkError,
    },

    /// Every batch was committed but run bookkeeping was not.
    #[error("failed to record run metadata: {0}")]
    FinishRun(#[source] SinkError),
}

impl PipelineError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidWindow { .. } => ErrorCode::InvalidWindow,
            Self::Source(SourceError::Query { .. }) => ErrorCode::SourceQueryFailed,
            Self::Source(_) => ErrorCode::SourceUnavailable,
            Self::Sink {
                source: SinkError::Corrupt { .. },
                ..
            } => ErrorCode::CorruptOutput,
            Self::Sink { .. } | Self::FinishRun(_) => ErrorCode::SinkWriteFailed,
        }
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Run the pipeline once.
///
/// # Errors
///
/// - [`PipelineError::InvalidWindow`] before any read
/// - [`PipelineError::Source`] before any write
/// - [`PipelineError::Sink`] with the number of batches already committed
pub fn run<S, K>(store: &S, sink: &mut K, options: &RunOptions) -> Result<RunReport, PipelineError>
where
    S: LineStore + ?Sized,
    K: RecordSink + ?Sized,
{
    let start = Instant::now();
    let window_start = options.window_start()?;

    // Reads.
    let raw_lines = store.transaction_lines(window_start)?;
    let raw_valid = store.appointments(&AppointmentQuery::valid_since(window_start))?;
    let raw_arrived = store.appointments(&AppointmentQuery::arrived())?;
    let lines_read = raw_lines.len();
    let appointments_read = raw_valid.len() + raw_arrived.len();

    // Validation.
    let lines = validate_lines(raw_lines);
    let valid = validate_appointments(raw_valid);
    let arrived = validate_appointments(raw_arrived);
    let rejections = merge_rejections(lines.rejections, valid.rejections, arrived.rejections);
    if !rejections.is_empty() {
        let ids: Vec<&str> = rejections
            .iter()
            .filter_map(|r| r.record_id.as_deref())
            .collect();
        tracing::warn!(
            count = rejections.len(),
            ids = %ids.join(","),
            "dropped malformed input rows"
        );
    }

    // Resolution.
    let groups = group_lines(lines.records);
    let resolver = RebookingResolver::new(
        AppointmentIndex::build(&valid.records, &arrived.records),
        options.walk_in_client_ids.iter().cloned(),
    );

    let per_client = groups.by_client();
    let mut records: Vec<ConsolidatedRecord> = Vec::new();
    let mut rebooked_visits = 0;
    for (client, visits) in &per_client {
        let links = resolver.resolve_client(client, visits);
        for (tx, link) in visits.iter().zip(&links) {
            let attribution = attribute(tx);
            if link.is_rebooked {
                rebooked_visits += 1;
            }
            records.extend(consolidate(tx, &attribution, link));
        }
    }
    records.sort_by(|a, b| a.key.cmp(&b.key));

    // Writes.
    let mut outcome = BatchOutcome::default();
    let mut batches = 0;
    for (index, chunk) in records.chunks(options.batch_size.max(1)).enumerate() {
        let batch_outcome = sink.write_batch(chunk).map_err(|source| {
            tracing::warn!(
                batch = index,
                committed = index,
                records = chunk.len(),
                error = %source,
                "output batch failed"
            );
            PipelineError::Sink {
                batch: index,
                committed: index,
                source,
            }
        })?;
        outcome += batch_outcome;
        batches += 1;
    }
    sink.finish_run(window_start, u64::try_from(records.len()).unwrap_or(u64::MAX))
        .map_err(PipelineError::FinishRun)?;

    let report = RunReport {
        window_start,
        window_end: options.today,
        lines_read,
        appointments_read,
        transactions: groups.len(),
        clients: per_client.len(),
        records: records.len(),
        rebooked_visits,
        batches,
        outcome,
        rejections,
        elapsed: start.elapsed(),
    };

    tracing::info!(
        window_start = %report.window_start,
        window_end = %report.window_end,
        lines_read = report.lines_read,
        transactions = report.transactions,
        clients = report.clients,
        records = report.records,
        rebooked_visits = report.rebooked_visits,
        inserted = report.outcome.inserted,
        updated = report.outcome.updated,
        unchanged = report.outcome.unchanged,
        rejected = report.rejections.len(),
        elapsed_ms = report.elapsed.as_millis(),
        "run complete"
    );

    Ok(report)
}

/// Line and window rejections, plus arrival-history rejections not already
/// reported. A malformed in-window appointment flagged as arrived comes back
/// from both appointment reads but is one dropped row.
fn merge_rejections(
    lines: Vec<Rejection>,
    valid: Vec<Rejection>,
    arrived: Vec<Rejection>,
) -> Vec<Rejection> {
    let seen: HashSet<(Option<String>, Option<String>, Option<String>, String)> =
        valid.iter().map(identity).collect();
    let mut out = lines;
    out.extend(valid);
    out.extend(arrived.into_iter().filter(|r| !seen.contains(&identity(r))));
    out
}

fn identity(r: &Rejection) -> (Option<String>, Option<String>, Option<String>, String) {
    (
        r.record_id.clone(),
        r.date.clone(),
        r.client_id.clone(),
        r.reason.to_string(),
    )
}
