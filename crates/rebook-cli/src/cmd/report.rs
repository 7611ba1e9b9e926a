//! `rebook report`: per-employee rebooking rates from the output database.

use std::io::Write;

use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use clap::Args;
use rebook_core::config::RebookConfig;
use rebook_core::db;
use rebook_core::report::{ClientCounts, StaffRebookingRow, staff_rebooking, totals};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::output::{OutputMode, pretty_rule, pretty_section, render_mode};

/// Arguments for `rebook report`.
#[derive(Args, Debug, Default)]
pub struct ReportArgs {
    /// First visit date to include.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub from: Option<NaiveDate>,

    /// Last visit date to include.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub to: Option<NaiveDate>,
}

/// Counts plus the three rebooking rates derived from them.
#[derive(Debug, Serialize)]
struct RateLine {
    #[serde(flatten)]
    counts: ClientCounts,
    returning_rate: Option<Decimal>,
    new_rate: Option<Decimal>,
    total_rate: Option<Decimal>,
}

impl From<ClientCounts> for RateLine {
    fn from(counts: ClientCounts) -> Self {
        Self {
            counts,
            returning_rate: counts.returning_rate(),
            new_rate: counts.new_rate(),
            total_rate: counts.total_rate(),
        }
    }
}

#[derive(Debug, Serialize)]
struct StaffLine {
    employee_id: String,
    employee_name: String,
    #[serde(flatten)]
    rates: RateLine,
}

#[derive(Debug, Serialize)]
struct StaffReport {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    staff: Vec<StaffLine>,
    total: RateLine,
}

impl StaffReport {
    fn new(args: &ReportArgs, rows: &[StaffRebookingRow]) -> Self {
        Self {
            from: args.from,
            to: args.to,
            staff: rows
                .iter()
                .map(|row| StaffLine {
                    employee_id: row.employee_id.to_string(),
                    employee_name: row.employee_name.clone(),
                    rates: RateLine::from(row.counts),
                })
                .collect(),
            total: RateLine::from(totals(rows)),
        }
    }
}

/// Execute `rebook report`.
///
/// # Errors
///
/// Returns an error if `--from` is after `--to`, or the output database
/// cannot be opened or queried.
pub fn run_report(args: &ReportArgs, config: &RebookConfig, output: OutputMode) -> Result<()> {
    if let (Some(from), Some(to)) = (args.from, args.to) {
        anyhow::ensure!(from <= to, "--from {from} is after --to {to}");
    }

    let conn = db::open_output(&config.output.path)?;
    let rows = staff_rebooking(&conn, args.from, args.to).with_context(|| {
        format!(
            "Failed to read staff report from {}",
            config.output.path.display()
        )
    })?;

    let report = StaffReport::new(args, &rows);
    render_mode(output, &report, render_text, render_pretty)
}

fn rate(rate: Option<Decimal>) -> String {
    rate.map_or_else(|| "-".to_string(), |r| format!("{}%", r.normalize()))
}

fn text_fields(line: &RateLine) -> String {
    let c = &line.counts;
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        c.visits,
        c.clients,
        c.returning_clients,
        c.rebooked_returning,
        c.new_clients,
        c.rebooked_new,
        rate(line.returning_rate),
        rate(line.new_rate),
        rate(line.total_rate)
    )
}

fn render_text(report: &StaffReport, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "employee_id\temployee_name\tvisits\tclients\treturning\trebooked_returning\t\
         new\trebooked_new\treturning_rate\tnew_rate\ttotal_rate"
    )?;
    for line in &report.staff {
        writeln!(
            w,
            "{}\t{}\t{}",
            line.employee_id,
            line.employee_name,
            text_fields(&line.rates)
        )?;
    }
    writeln!(w, "total\t\t{}", text_fields(&report.total))
}

fn pretty_row(w: &mut dyn Write, id: &str, name: &str, line: &RateLine) -> std::io::Result<()> {
    let c = &line.counts;
    writeln!(
        w,
        "{:<12} {:<20} {:>6} {:>7} {:>9} {:>8} {:>7} {:>8} {:>10}",
        id,
        name,
        c.visits,
        c.clients,
        format!("{}/{}", c.rebooked_returning, c.returning_clients),
        rate(line.returning_rate),
        format!("{}/{}", c.rebooked_new, c.new_clients),
        rate(line.new_rate),
        rate(line.total_rate),
    )
}

fn render_pretty(report: &StaffReport, w: &mut dyn Write) -> std::io::Result<()> {
    let heading = match (report.from, report.to) {
        (Some(from), Some(to)) => format!("Staff rebooking {from} .. {to}"),
        (Some(from), None) => format!("Staff rebooking since {from}"),
        (None, Some(to)) => format!("Staff rebooking through {to}"),
        (None, None) => "Staff rebooking".to_string(),
    };
    pretty_section(w, &heading)?;

    if report.staff.is_empty() {
        return writeln!(w, "No visits recorded.");
    }

    writeln!(
        w,
        "{:<12} {:<20} {:>6} {:>7} {:>9} {:>8} {:>7} {:>8} {:>10}",
        "ID", "NAME", "VISITS", "CLIENTS", "RETURNING", "RET RATE", "NEW", "NEW RATE", "TOTAL RATE"
    )?;
    for line in &report.staff {
        pretty_row(w, &line.employee_id, &line.employee_name, &line.rates)?;
    }
    pretty_rule(w)?;
    pretty_row(w, "TOTAL", "", &report.total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebook_core::model::EmployeeId;

    fn rows() -> Vec<StaffRebookingRow> {
        vec![
            StaffRebookingRow {
                employee_id: EmployeeId::new("E1"),
                employee_name: "Ana".into(),
                counts: ClientCounts {
                    visits: 3,
                    clients: 3,
                    new_clients: 1,
                    rebooked_new: 1,
                    returning_clients: 2,
                    rebooked_returning: 0,
                },
            },
            StaffRebookingRow {
                employee_id: EmployeeId::new("E2"),
                employee_name: "Bo".into(),
                counts: ClientCounts {
                    visits: 1,
                    clients: 1,
                    new_clients: 0,
                    rebooked_new: 0,
                    returning_clients: 1,
                    rebooked_returning: 1,
                },
            },
        ]
    }

    #[test]
    fn text_report_has_header_rows_and_total() {
        let report = StaffReport::new(&ReportArgs::default(), &rows());
        let mut buf = Vec::new();
        render_text(&report, &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("returning_rate\tnew_rate\ttotal_rate"));
        assert_eq!(lines[1], "E1\tAna\t3\t3\t2\t0\t1\t1\t0%\t100%\t33.3%");
        assert_eq!(lines[2], "E2\tBo\t1\t1\t1\t1\t0\t0\t100%\t-\t100%");
        assert_eq!(lines[3], "total\t\t4\t4\t3\t1\t1\t1\t33.3%\t100%\t50%");
    }

    #[test]
    fn json_report_carries_three_rates() {
        let report = StaffReport::new(&ReportArgs::default(), &rows());
        let value = serde_json::to_value(&report).expect("json");
        let e1 = &value["staff"][0];
        assert_eq!(e1["employee_id"], "E1");
        assert_eq!(e1["returning_clients"], 2);
        let decimal = |v: &serde_json::Value| serde_json::from_value::<Decimal>(v.clone()).ok();
        assert_eq!(decimal(&e1["new_rate"]), Some(Decimal::ONE_HUNDRED));
        assert!(value["staff"][1]["new_rate"].is_null());
        assert_eq!(decimal(&value["total"]["total_rate"]), Some(Decimal::from(50)));
    }

    #[test]
    fn pretty_report_handles_empty_table() {
        let report = StaffReport::new(&ReportArgs::default(), &[]);
        let mut buf = Vec::new();
        render_pretty(&report, &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("Staff rebooking\n"));
        assert!(text.contains("No visits recorded."));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let args = ReportArgs {
            from: NaiveDate::from_ymd_opt(2024, 2, 1),
            to: NaiveDate::from_ymd_opt(2024, 1, 1),
        };
        let err = run_report(&args, &RebookConfig::default(), OutputMode::Json)
            .expect_err("inverted window");
        assert!(err.to_string().contains("is after"));
    }
}
