//! Output database schema versions.
//!
//! - v1 creates `consolidated_records` and seeds the single `rebook_meta` row.
//! - v2 adds the two read-path indexes used by the staff report
//!   (`attributed_employee_id, transaction_date`) and client lookups
//!   (`client_id, transaction_date`).
//!
//! `PRAGMA user_version` and `rebook_meta.schema_version` always agree after
//! a step commits.

use super::schema;
use rusqlite::{Connection, types::Type};

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        name: "records and run metadata",
        sql: schema::MIGRATION_V1_SQL,
    },
    Step {
        version: 2,
        name: "report indexes",
        sql: schema::MIGRATION_V2_SQL,
    },
];

/// Read `PRAGMA user_version` as a `u32`.
///
/// # Errors
///
/// Returns an error if querying SQLite fails or the stored version is out of
/// range.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Bring the output database to [`LATEST_SCHEMA_VERSION`].
///
/// # Errors
///
/// Returns an error if any step fails; earlier steps stay committed.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    migrate_to(conn, LATEST_SCHEMA_VERSION)
}

/// Apply every step above the stored version up to and including `target`,
/// one transaction per step. A database already at or past `target` is left
/// alone.
///
/// # Errors
///
/// Returns an error if any step fails.
pub fn migrate_to(conn: &mut Connection, target: u32) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for step in STEPS
        .iter()
        .filter(move |step| step.version > current && step.version <= target)
    {
        let tx = conn.transaction()?;
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", i64::from(step.version))?;
        tx.execute(
            "UPDATE rebook_meta SET schema_version = ?1 WHERE id = 1",
            [i64::from(step.version)],
        )?;
        tx.commit()?;
        tracing::debug!(version = step.version, step = step.name, "migrated output database");
        current = step.version;
    }

    Ok(current)
}
