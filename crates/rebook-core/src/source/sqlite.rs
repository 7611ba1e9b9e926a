//! [`LineStore`] over a staging SQLite file.
//!
//! The store is opened read-only with `query_only` set, so a run can never
//! write to the extract job's tables. Filters are deliberately lenient: a row
//! is only excluded when its flag or date *definitely* rules it out. Anything
//! ambiguous (NULL flags, malformed dates) is returned and left for
//! validation to reject and report.

use chrono::NaiveDate;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row, params_from_iter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{LineStore, SourceError};
use crate::model::{AppointmentQuery, RawAppointment, RawTransactionLine, Validity};

const LINES_TABLE: &str = "sale_transaction_lines";
const APPOINTMENTS_TABLE: &str = "appointments";
const DATE_GLOB: &str = "[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]";

pub struct SqliteLineStore {
    conn: Connection,
    path: PathBuf,
}

impl std::fmt::Debug for SqliteLineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLineStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteLineStore {
    /// Open an existing staging store read-only.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Open`] if the file does not exist or cannot be
    /// opened.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let open_err = |source| SourceError::Open {
            path: path.display().to_string(),
            source,
        };
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(open_err)?;
        conn.busy_timeout(Duration::from_secs(5)).map_err(open_err)?;
        conn.pragma_update(None, "query_only", "ON").map_err(open_err)?;

        tracing::debug!(path = %path.display(), "opened staging store");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LineStore for SqliteLineStore {
    fn transaction_lines(&self, since: NaiveDate) -> Result<Vec<RawTransactionLine>, SourceError> {
        let sql = format!(
            "SELECT line_id, transaction_date, client_id, client_name, employee_id,
                    employee_name, item_type, item_name, quantity, line_amount
             FROM {LINES_TABLE}
             WHERE NOT {voided}
               AND {window}
             ORDER BY rowid",
            voided = flag_set("is_voided"),
            window = on_or_after("transaction_date", 1),
        );
        let query_err = |source| SourceError::Query {
            table: LINES_TABLE,
            source,
        };

        let mut stmt = self.conn.prepare(&sql).map_err(query_err)?;
        let rows = stmt
            .query_map([since.to_string()], |row| {
                Ok(RawTransactionLine {
                    line_id: text(row, 0)?,
                    transaction_date: text(row, 1)?,
                    client_id: text(row, 2)?,
                    client_name: text(row, 3)?,
                    employee_id: text(row, 4)?,
                    employee_name: text(row, 5)?,
                    item_type: text(row, 6)?,
                    item_name: text(row, 7)?,
                    quantity: text(row, 8)?,
                    line_amount: text(row, 9)?,
                })
            })
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn appointments(&self, query: &AppointmentQuery) -> Result<Vec<RawAppointment>, SourceError> {
        let mut clauses: Vec<String> = Vec::new();
        match query.validity {
            Validity::Any => {}
            Validity::Valid => {
                for column in ["is_cancellation", "is_deleted", "is_no_show"] {
                    clauses.push(format!("NOT {}", flag_set(column)));
                }
            }
            Validity::Arrived => clauses.push(flag_set("is_arrived")),
        }

        let mut args: Vec<String> = Vec::new();
        if let Some(since) = query.since {
            args.push(since.to_string());
            clauses.push(on_or_after("appointment_date", args.len()));
        }

        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT appointment_id, customer_id, appointment_date, is_cancellation,
                    is_deleted, is_no_show, is_arrived
             FROM {APPOINTMENTS_TABLE}
             {filter}
             ORDER BY rowid"
        );
        let query_err = |source| SourceError::Query {
            table: APPOINTMENTS_TABLE,
            source,
        };

        let mut stmt = self.conn.prepare(&sql).map_err(query_err)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok(RawAppointment {
                    appointment_id: text(row, 0)?,
                    customer_id: text(row, 1)?,
                    appointment_date: text(row, 2)?,
                    is_cancellation: text(row, 3)?,
                    is_deleted: text(row, 4)?,
                    is_no_show: text(row, 5)?,
                    is_arrived: text(row, 6)?,
                })
            })
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }
}

/// SQL predicate: `column` holds a truthy flag value.
fn flag_set(column: &str) -> String {
    format!("COALESCE(lower(trim(CAST({column} AS TEXT))), '') IN ('1', 'true', 'yes')")
}

/// SQL predicate: `column` is on or after the date bound to `?{param}`, or
/// cannot be compared as a date.
fn on_or_after(column: &str, param: usize) -> String {
    let day = format!("substr(trim(CAST({column} AS TEXT)), 1, 10)");
    format!("({column} IS NULL OR {day} NOT GLOB '{DATE_GLOB}' OR {day} >= ?{param})")
}

/// Read any SQLite value as text. The extract job stores strings, but a
/// hand-loaded store may hold integers or reals.
fn text(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    })
}
