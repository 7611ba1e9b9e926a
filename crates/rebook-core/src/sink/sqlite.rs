//! [`RecordSink`] writing into the `consolidated_records` table.
//!
//! Each batch runs in one `IMMEDIATE` transaction. For every record the
//! stored fingerprint is looked up first; an identical fingerprint means the
//! row is left alone, anything else is an upsert on the composite key.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

use super::{BatchOutcome, RecordSink, SinkError};
use crate::db;
use crate::model::{ClientId, ConsolidatedRecord, EmployeeId, ItemType, LineId, RecordKey};

const LOOKUP_SQL: &str = "SELECT fingerprint FROM consolidated_records
     WHERE transaction_date = ?1 AND client_id = ?2 AND line_id = ?3";

const UPSERT_SQL: &str = "INSERT INTO consolidated_records (
        transaction_date, client_id, line_id, client_name,
        employee_id, employee_name, item_type, item_name, quantity, line_amount,
        attributed_employee_id, attributed_employee_name, transaction_total,
        basket_size, retail_units,
        is_rebooked, linked_appointment_date, linked_employee_id, linked_employee_name,
        is_new_client, fingerprint, updated_at_us
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
        ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22
    )
    ON CONFLICT (transaction_date, client_id, line_id) DO UPDATE SET
        client_name = excluded.client_name,
        employee_id = excluded.employee_id,
        employee_name = excluded.employee_name,
        item_type = excluded.item_type,
        item_name = excluded.item_name,
        quantity = excluded.quantity,
        line_amount = excluded.line_amount,
        attributed_employee_id = excluded.attributed_employee_id,
        attributed_employee_name = excluded.attributed_employee_name,
        transaction_total = excluded.transaction_total,
        basket_size = excluded.basket_size,
        retail_units = excluded.retail_units,
        is_rebooked = excluded.is_rebooked,
        linked_appointment_date = excluded.linked_appointment_date,
        linked_employee_id = excluded.linked_employee_id,
        linked_employee_name = excluded.linked_employee_name,
        is_new_client = excluded.is_new_client,
        fingerprint = excluded.fingerprint,
        updated_at_us = excluded.updated_at_us";

const SELECT_SQL: &str = "SELECT
        transaction_date, client_id, line_id, client_name,
        employee_id, employee_name, item_type, item_name, quantity, line_amount,
        attributed_employee_id, attributed_employee_name, transaction_total,
        basket_size, retail_units,
        is_rebooked, linked_appointment_date, linked_employee_id, linked_employee_name,
        is_new_client
    FROM consolidated_records
    ORDER BY transaction_date, client_id, line_id";

#[derive(Debug)]
pub struct SqliteRecordSink {
    conn: Connection,
}

impl SqliteRecordSink {
    /// Open (creating and migrating if needed) the output database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: db::open_output(path)?,
        })
    }

    /// Wrap an already-migrated connection.
    #[must_use]
    pub const fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl RecordSink for SqliteRecordSink {
    fn write_batch(&mut self, records: &[ConsolidatedRecord]) -> Result<BatchOutcome, SinkError> {
        let mut outcome = BatchOutcome::default();
        let now_us = Utc::now().timestamp_micros();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut lookup = tx.prepare_cached(LOOKUP_SQL)?;
            let mut upsert = tx.prepare_cached(UPSERT_SQL)?;

            for record in records {
                let fingerprint = record.fingerprint();
                let key = &record.key;
                let stored: Option<String> = lookup
                    .query_row(
                        params![
                            key.transaction_date.to_string(),
                            key.client_id.as_str(),
                            key.line_id.as_str()
                        ],
                        |row| row.get(0),
                    )
                    .optional()?;

                match stored {
                    Some(existing) if existing == fingerprint => {
                        outcome.unchanged += 1;
                        continue;
                    }
                    Some(_) => outcome.updated += 1,
                    None => outcome.inserted += 1,
                }

                upsert.execute(params![
                    key.transaction_date.to_string(),
                    key.client_id.as_str(),
                    key.line_id.as_str(),
                    record.client_name,
                    record.employee_id.as_str(),
                    record.employee_name,
                    record.item_type.as_str(),
                    record.item_name,
                    decimal_text(record.quantity),
                    decimal_text(record.line_amount),
                    record.attributed_employee_id.as_str(),
                    record.attributed_employee_name,
                    decimal_text(record.transaction_total),
                    i64::from(record.basket_size),
                    decimal_text(record.retail_units),
                    record.is_rebooked,
                    record.linked_appointment_date.map(|d| d.to_string()),
                    record.linked_employee_id.as_ref().map(EmployeeId::as_str),
                    record.linked_employee_name,
                    record.is_new_client,
                    fingerprint,
                    now_us,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(
            records = records.len(),
            inserted = outcome.inserted,
            updated = outcome.updated,
            unchanged = outcome.unchanged,
            "committed output batch"
        );
        Ok(outcome)
    }

    fn finish_run(&mut self, window_start: NaiveDate, records: u64) -> Result<(), SinkError> {
        db::write_run_meta(&self.conn, window_start, records, Utc::now().timestamp_micros())?;
        Ok(())
    }
}

fn decimal_text(value: Decimal) -> String {
    value.normalize().to_string()
}

// ---------------------------------------------------------------------------
// Read-back
// ---------------------------------------------------------------------------

/// Load every stored record, ordered by key.
///
/// # Errors
///
/// Returns [`SinkError::Corrupt`] if a stored value does not decode, or
/// [`SinkError::Database`] if the query fails.
pub fn load_records(conn: &Connection) -> Result<Vec<ConsolidatedRecord>, SinkError> {
    let mut stmt = conn.prepare(SELECT_SQL)?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(decode_row(row)?);
    }
    Ok(out)
}

fn decode_row(row: &Row<'_>) -> Result<ConsolidatedRecord, SinkError> {
    let date_text: String = row.get(0)?;
    let client_id: String = row.get(1)?;
    let line_id: String = row.get(2)?;
    let label = format!("{date_text}/{client_id}/{line_id}");
    let corrupt = |detail: String| SinkError::Corrupt {
        key: label.clone(),
        detail,
    };
    let date = |text: &str| {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| corrupt(format!("date {text:?}: {e}")))
    };
    let decimal = |idx: usize| -> Result<Decimal, SinkError> {
        let text: String = row.get(idx)?;
        Decimal::from_str(&text).map_err(|e| corrupt(format!("decimal {text:?}: {e}")))
    };

    let basket_size: i64 = row.get(13)?;
    let linked_date: Option<String> = row.get(16)?;
    let linked_employee_id: Option<String> = row.get(17)?;
    let item_type: String = row.get(6)?;

    Ok(ConsolidatedRecord {
        key: RecordKey {
            transaction_date: date(&date_text)?,
            client_id: ClientId::new(client_id),
            line_id: LineId::new(line_id),
        },
        client_name: row.get(3)?,
        employee_id: EmployeeId::new(row.get::<_, String>(4)?),
        employee_name: row.get(5)?,
        item_type: ItemType::from_code(&item_type),
        item_name: row.get(7)?,
        quantity: decimal(8)?,
        line_amount: decimal(9)?,
        attributed_employee_id: EmployeeId::new(row.get::<_, String>(10)?),
        attributed_employee_name: row.get(11)?,
        transaction_total: decimal(12)?,
        basket_size: u32::try_from(basket_size)
            .map_err(|e| corrupt(format!("basket_size {basket_size}: {e}")))?,
        retail_units: decimal(14)?,
        is_rebooked: row.get(15)?,
        linked_appointment_date: linked_date.as_deref().map(date).transpose()?,
        linked_employee_id: linked_employee_id.map(EmployeeId::new),
        linked_employee_name: row.get(18)?,
        is_new_client: row.get(19)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sink() -> (TempDir, SqliteRecordSink) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let sink = SqliteRecordSink::open(&dir.path().join("rebook.sqlite3")).expect("open sink");
        (dir, sink)
    }

    fn record(line: &str, amount: &str) -> ConsolidatedRecord {
        ConsolidatedRecord {
            key: RecordKey {
                transaction_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"),
                client_id: ClientId::from("C1"),
                line_id: LineId::from(line),
            },
            client_name: None,
            employee_id: EmployeeId::from("E1"),
            employee_name: "Eve".into(),
            item_type: ItemType::Product,
            item_name: "Shampoo".into(),
            quantity: Decimal::from(2),
            line_amount: Decimal::from_str(amount).expect("decimal"),
            attributed_employee_id: EmployeeId::from("E1"),
            attributed_employee_name: "Eve".into(),
            transaction_total: Decimal::from_str(amount).expect("decimal"),
            basket_size: 1,
            retail_units: Decimal::from(2),
            is_rebooked: true,
            linked_appointment_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            linked_employee_id: Some(EmployeeId::from("E1")),
            linked_employee_name: Some("Eve".into()),
            is_new_client: false,
        }
    }

    #[test]
    fn first_write_inserts_second_is_unchanged() {
        let (_dir, mut sink) = sink();
        let batch = [record("L1", "24.50"), record("L2", "10")];

        let first = sink.write_batch(&batch).expect("first write");
        assert_eq!(first.inserted, 2);

        let second = sink.write_batch(&batch).expect("second write");
        assert_eq!(second, BatchOutcome { inserted: 0, updated: 0, unchanged: 2 });

        let stored = load_records(sink.connection()).expect("load");
        assert_eq!(stored, batch);
    }

    #[test]
    fn changed_content_replaces_row() {
        let (_dir, mut sink) = sink();
        sink.write_batch(&[record("L1", "24.50")]).expect("first write");

        let mut changed = record("L1", "24.50");
        changed.is_rebooked = false;
        changed.linked_appointment_date = None;
        changed.linked_employee_id = None;
        changed.linked_employee_name = None;
        let outcome = sink.write_batch(&[changed.clone()]).expect("second write");
        assert_eq!(outcome.updated, 1);

        let stored = load_records(sink.connection()).expect("load");
        assert_eq!(stored, vec![changed]);
    }

    #[test]
    fn failed_batch_leaves_no_partial_rows() {
        let (_dir, mut sink) = sink();
        let mut bad = record("L2", "5");
        // Violates the link-requires-rebooked check.
        bad.is_rebooked = false;
        let result = sink.write_batch(&[record("L1", "5"), bad]);
        assert!(matches!(result, Err(SinkError::Database(_))));
        assert!(load_records(sink.connection()).expect("load").is_empty());
    }

    #[test]
    fn finish_run_records_meta() {
        let (_dir, mut sink) = sink();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        sink.finish_run(start, 7).expect("finish run");
        let meta = db::read_run_meta(sink.connection())
            .expect("read meta")
            .expect("meta row");
        assert_eq!(meta.last_window_start, Some(start));
        assert_eq!(meta.last_record_count, 7);
        assert!(meta.last_run_at_us > 0);
    }

    #[test]
    fn corrupt_amount_is_reported() {
        let (_dir, mut sink) = sink();
        sink.write_batch(&[record("L1", "5")]).expect("write");
        sink.connection()
            .execute("UPDATE consolidated_records SET line_amount = 'five'", [])
            .expect("corrupt row");
        let err = load_records(sink.connection()).expect_err("should fail");
        assert!(matches!(err, SinkError::Corrupt { ref key, .. } if key == "2024-01-01/C1/L1"));
    }
}
