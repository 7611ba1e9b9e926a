//! Staff rebooking report, read back from the output table.
//!
//! Each employee's rows are collapsed to one entry per client first. A client
//! counts as new if any of their visits in range was a first visit, and as
//! rebooked if any visit in range was rebooked. Rates are then taken over
//! clients: returning, new, and all clients together.

use chrono::NaiveDate;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::model::EmployeeId;

const STAFF_REBOOKING_SQL: &str = "
SELECT attributed_employee_id,
       MAX(employee_name),
       SUM(visits),
       COUNT(*),
       SUM(is_new),
       SUM(is_new * rebooked),
       SUM((1 - is_new) * rebooked)
FROM (
    SELECT attributed_employee_id,
           client_id,
           MAX(attributed_employee_name) AS employee_name,
           COUNT(DISTINCT transaction_date) AS visits,
           MAX(is_new_client) AS is_new,
           MAX(is_rebooked) AS rebooked
    FROM consolidated_records
    WHERE (?1 IS NULL OR transaction_date >= ?1)
      AND (?2 IS NULL OR transaction_date <= ?2)
    GROUP BY attributed_employee_id, client_id
)
GROUP BY attributed_employee_id
ORDER BY attributed_employee_id";

/// Client-level counts behind one report line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClientCounts {
    /// Distinct visits (date, client) credited to the employee.
    pub visits: u64,
    pub clients: u64,
    pub new_clients: u64,
    pub rebooked_new: u64,
    pub returning_clients: u64,
    pub rebooked_returning: u64,
}

impl ClientCounts {
    /// Share of returning clients who rebooked, as a percentage.
    #[must_use]
    pub fn returning_rate(&self) -> Option<Decimal> {
        percentage(self.rebooked_returning, self.returning_clients)
    }

    /// Share of new clients who rebooked, as a percentage.
    #[must_use]
    pub fn new_rate(&self) -> Option<Decimal> {
        percentage(self.rebooked_new, self.new_clients)
    }

    /// Share of all clients who rebooked, as a percentage.
    #[must_use]
    pub fn total_rate(&self) -> Option<Decimal> {
        percentage(self.rebooked_new + self.rebooked_returning, self.clients)
    }

    fn plus(self, other: Self) -> Self {
        Self {
            visits: self.visits + other.visits,
            clients: self.clients + other.clients,
            new_clients: self.new_clients + other.new_clients,
            rebooked_new: self.rebooked_new + other.rebooked_new,
            returning_clients: self.returning_clients + other.returning_clients,
            rebooked_returning: self.rebooked_returning + other.rebooked_returning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffRebookingRow {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    #[serde(flatten)]
    pub counts: ClientCounts,
}

/// Per-employee client counts for visits dated within `[from, to]`. Either
/// bound may be open.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn staff_rebooking(
    conn: &Connection,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> rusqlite::Result<Vec<StaffRebookingRow>> {
    let count = |row: &rusqlite::Row<'_>, idx: usize| -> rusqlite::Result<u64> {
        let value: i64 = row.get(idx)?;
        Ok(u64::try_from(value).unwrap_or_default())
    };

    let mut stmt = conn.prepare(STAFF_REBOOKING_SQL)?;
    let rows = stmt.query_map(
        params![from.map(|d| d.to_string()), to.map(|d| d.to_string())],
        |row| {
            let clients = count(row, 3)?;
            let new_clients = count(row, 4)?;
            Ok(StaffRebookingRow {
                employee_id: EmployeeId::new(row.get::<_, String>(0)?),
                employee_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                counts: ClientCounts {
                    visits: count(row, 2)?,
                    clients,
                    new_clients,
                    rebooked_new: count(row, 5)?,
                    returning_clients: clients.saturating_sub(new_clients),
                    rebooked_returning: count(row, 6)?,
                },
            })
        },
    )?;
    rows.collect()
}

/// Sum of all rows, for a report footer. A client served by two employees
/// counts once for each.
#[must_use]
pub fn totals(rows: &[StaffRebookingRow]) -> ClientCounts {
    rows.iter()
        .fold(ClientCounts::default(), |acc, row| acc.plus(row.counts))
}

/// `part / whole` as a percentage rounded to one decimal place, `None` when
/// `whole` is zero.
fn percentage(part: u64, whole: u64) -> Option<Decimal> {
    if whole == 0 {
        return None;
    }
    let ratio = Decimal::from(part) * Decimal::ONE_HUNDRED / Decimal::from(whole);
    Some(ratio.round_dp(1))
}
