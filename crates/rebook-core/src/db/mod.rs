//! SQLite database utilities for the output database and staging store.
//!
//! Output connections use:
//! - `journal_mode = WAL` so reports can read while a run writes
//! - `busy_timeout = 5s` to ride out short lock contention
//! - `synchronous = NORMAL`, which is durable enough under WAL

pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use std::{path::Path, time::Duration};

/// Busy timeout used for output DB connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the output database, apply runtime pragmas, and migrate
/// the schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening, configuring or migrating the database fails.
pub fn open_output(path: &Path) -> Result<Connection> {
    create_parent_dir(path)?;

    let mut conn = Connection::open(path)
        .with_context(|| format!("open output database {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply output migrations")?;

    Ok(conn)
}

/// Open (or create) a staging store and make sure its tables exist.
///
/// Production staging stores are written by the extract job; this is for
/// local setups and fixtures.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or the schema cannot be
/// created.
pub fn init_staging(path: &Path) -> Result<Connection> {
    create_parent_dir(path)?;

    let conn = Connection::open(path)
        .with_context(|| format!("open staging store {}", path.display()))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)
        .context("configure staging busy timeout")?;
    conn.execute_batch(schema::STAGING_SQL)
        .context("create staging tables")?;

    Ok(conn)
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create database directory {}", parent.display()))?;
    }
    Ok(())
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Run metadata
// ---------------------------------------------------------------------------

/// What the last completed run recorded in `rebook_meta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMeta {
    pub schema_version: u32,
    pub last_run_at_us: i64,
    pub last_window_start: Option<NaiveDate>,
    pub last_record_count: u64,
}

/// Record a completed run.
///
/// # Errors
///
/// Returns an error if the meta row cannot be updated.
pub fn write_run_meta(
    conn: &Connection,
    window_start: NaiveDate,
    record_count: u64,
    run_at_us: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE rebook_meta
         SET last_run_at_us = ?1, last_window_start = ?2, last_record_count = ?3
         WHERE id = 1",
        params![
            run_at_us,
            window_start.to_string(),
            i64::try_from(record_count).unwrap_or(i64::MAX)
        ],
    )?;
    Ok(())
}

/// Read the meta row, if the database has been migrated.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn read_run_meta(conn: &Connection) -> rusqlite::Result<Option<RunMeta>> {
    conn.query_row(
        "SELECT schema_version, last_run_at_us, last_window_start, last_record_count
         FROM rebook_meta WHERE id = 1",
        [],
        |row| {
            let schema_version: i64 = row.get(0)?;
            let window: Option<String> = row.get(2)?;
            let count: i64 = row.get(3)?;
            Ok(RunMeta {
                schema_version: u32::try_from(schema_version).unwrap_or_default(),
                last_run_at_us: row.get(1)?,
                last_window_start: window
                    .and_then(|w| NaiveDate::parse_from_str(&w, "%Y-%m-%d").ok()),
                last_record_count: u64::try_from(count).unwrap_or_default(),
            })
        },
    )
    .optional()
}
