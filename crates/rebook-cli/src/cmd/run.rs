//! `rebook run`: one attribution and rebooking batch.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use rebook_core::config::RebookConfig;
use rebook_core::error::ErrorCode;
use rebook_core::model::ClientId;
use rebook_core::pipeline::{self, PipelineError, RunOptions, RunReport};
use rebook_core::sink::SqliteRecordSink;
use rebook_core::source::SqliteLineStore;
use serde::Serialize;

use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render_error, render_mode};

/// Arguments for `rebook run`.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Days of history to reprocess, ending at `--today` (inclusive).
    /// Defaults to `window.days_back` from the config file.
    #[arg(long)]
    pub days_back: Option<u32>,

    /// Treat this date as the run date instead of the local calendar date.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub today: Option<NaiveDate>,
}

/// Serialized run summary.
#[derive(Debug, Serialize)]
struct RunSummary {
    window_start: NaiveDate,
    window_end: NaiveDate,
    lines_read: usize,
    appointments_read: usize,
    transactions: usize,
    clients: usize,
    records: usize,
    rebooked_visits: usize,
    batches: usize,
    inserted: u64,
    updated: u64,
    unchanged: u64,
    rejections: Vec<String>,
    elapsed_ms: u128,
}

impl From<&RunReport> for RunSummary {
    fn from(report: &RunReport) -> Self {
        Self {
            window_start: report.window_start,
            window_end: report.window_end,
            lines_read: report.lines_read,
            appointments_read: report.appointments_read,
            transactions: report.transactions,
            clients: report.clients,
            records: report.records,
            rebooked_visits: report.rebooked_visits,
            batches: report.batches,
            inserted: report.outcome.inserted,
            updated: report.outcome.updated,
            unchanged: report.outcome.unchanged,
            rejections: report.rejections.iter().map(ToString::to_string).collect(),
            elapsed_ms: report.elapsed.as_millis(),
        }
    }
}

fn run_options(args: &RunArgs, config: &RebookConfig) -> RunOptions {
    let today = args
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let days_back = args.days_back.unwrap_or(config.window.days_back);
    RunOptions::new(today, days_back)
        .with_batch_size(config.output.batch_size)
        .with_walk_ins(
            config
                .rebooking
                .walk_in_client_ids
                .iter()
                .cloned()
                .map(ClientId::new),
        )
}

/// Execute `rebook run`.
///
/// Input defects are reported in the summary and never fail the command.
/// Source and sink failures print a coded error to stderr and exit non-zero.
///
/// # Errors
///
/// Returns an error if the staging store cannot be read, the output database
/// cannot be opened, or a batch fails to commit.
pub fn run_batch(args: &RunArgs, config: &RebookConfig, output: OutputMode) -> Result<()> {
    let options = run_options(args, config);

    // A missing source must not create the output file.
    let store = match SqliteLineStore::open(&config.source.path) {
        Ok(store) => store,
        Err(err) => return fail(output, PipelineError::from(err)),
    };

    let mut sink = match SqliteRecordSink::open(&config.output.path) {
        Ok(sink) => sink,
        Err(err) => {
            render_error(
                output,
                &CliError::from_code(ErrorCode::SinkOpenFailed, format!("{err:#}")),
            )?;
            return Err(err);
        }
    };

    let report = match pipeline::run(&store, &mut sink, &options) {
        Ok(report) => report,
        Err(err) => return fail(output, err),
    };

    let summary = RunSummary::from(&report);
    render_mode(output, &summary, render_text, render_pretty)
}

fn fail(output: OutputMode, err: PipelineError) -> Result<()> {
    let code = err.code();
    render_error(output, &CliError::from_code(code, &err))?;
    Err(anyhow::Error::new(err).context(format!("run failed with {code}")))
}

fn render_text(s: &RunSummary, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "window={}..{}", s.window_start, s.window_end)?;
    writeln!(w, "lines_read={}", s.lines_read)?;
    writeln!(w, "appointments_read={}", s.appointments_read)?;
    writeln!(w, "transactions={}", s.transactions)?;
    writeln!(w, "clients={}", s.clients)?;
    writeln!(w, "records={}", s.records)?;
    writeln!(w, "rebooked_visits={}", s.rebooked_visits)?;
    writeln!(w, "batches={}", s.batches)?;
    writeln!(
        w,
        "inserted={} updated={} unchanged={}",
        s.inserted, s.updated, s.unchanged
    )?;
    writeln!(w, "rejections={}", s.rejections.len())?;
    for rejection in &s.rejections {
        writeln!(w, "rejected\t{rejection}")?;
    }
    Ok(())
}

fn render_pretty(s: &RunSummary, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Run {} .. {}", s.window_start, s.window_end))?;
    pretty_kv(w, "read", format!("{} lines, {} appointments", s.lines_read, s.appointments_read))?;
    pretty_kv(w, "visits", format!("{} across {} clients", s.transactions, s.clients))?;
    pretty_kv(w, "rebooked", s.rebooked_visits.to_string())?;
    pretty_kv(w, "records", format!("{} in {} batches", s.records, s.batches))?;
    pretty_kv(
        w,
        "written",
        format!("{} new, {} updated, {} unchanged", s.inserted, s.updated, s.unchanged),
    )?;
    pretty_kv(w, "elapsed", format!("{} ms", s.elapsed_ms))?;

    if !s.rejections.is_empty() {
        writeln!(w)?;
        pretty_section(w, &format!("Rejected input ({})", s.rejections.len()))?;
        for rejection in &s.rejections {
            writeln!(w, "  {rejection}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let mut config = RebookConfig::default();
        config.window.days_back = 3;
        config.output.batch_size = 50;
        config.rebooking.walk_in_client_ids = vec!["WALKIN".into()];

        let args = RunArgs {
            days_back: Some(30),
            today: NaiveDate::from_ymd_opt(2024, 2, 1),
        };
        let options = run_options(&args, &config);
        assert_eq!(options.days_back, 30);
        assert_eq!(options.today, NaiveDate::from_ymd_opt(2024, 2, 1).expect("date"));
        assert_eq!(options.batch_size, 50);
        assert_eq!(options.walk_in_client_ids, [ClientId::new("WALKIN")]);
    }

    #[test]
    fn config_supplies_window_when_flag_absent() {
        let mut config = RebookConfig::default();
        config.window.days_back = 7;
        let options = run_options(&RunArgs::default(), &config);
        assert_eq!(options.days_back, 7);
    }

    #[test]
    fn text_summary_lists_rejections() {
        let summary = RunSummary {
            window_start: NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"),
            window_end: NaiveDate::from_ymd_opt(2024, 1, 11).expect("date"),
            lines_read: 4,
            appointments_read: 1,
            transactions: 2,
            clients: 1,
            records: 3,
            rebooked_visits: 2,
            batches: 1,
            inserted: 3,
            updated: 0,
            unchanged: 0,
            rejections: vec!["transaction_line #3 (id=L4, ...)".into()],
            elapsed_ms: 1,
        };
        let mut buf = Vec::new();
        render_text(&summary, &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("window=2024-01-01..2024-01-11\n"));
        assert!(text.contains("records=3\n"));
        assert!(text.contains("rejections=1\nrejected\ttransaction_line #3"));
    }
}
