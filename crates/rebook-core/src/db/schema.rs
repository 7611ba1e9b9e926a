//! SQLite schemas for the output database and the local staging store.
//!
//! Output database:
//! - `consolidated_records` holds one row per charged line, keyed by
//!   `(transaction_date, client_id, line_id)`, with a content fingerprint used
//!   to skip unchanged rows on rerun
//! - `rebook_meta` records the schema version and the last run's window
//!
//! Staging store:
//! - `sale_transaction_lines` and `appointments` mirror the vendor extracts
//!   verbatim. Columns are untyped text; typing happens in validation.

/// Migration v1: consolidated output table plus run metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS consolidated_records (
    transaction_date TEXT NOT NULL CHECK (transaction_date GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]'),
    client_id TEXT NOT NULL CHECK (length(trim(client_id)) > 0),
    line_id TEXT NOT NULL CHECK (length(trim(line_id)) > 0),
    client_name TEXT,
    employee_id TEXT NOT NULL,
    employee_name TEXT NOT NULL DEFAULT '',
    item_type TEXT NOT NULL CHECK (item_type IN ('service', 'product', 'prepayment', 'other')),
    item_name TEXT NOT NULL DEFAULT '',
    quantity TEXT NOT NULL,
    line_amount TEXT NOT NULL,
    attributed_employee_id TEXT NOT NULL,
    attributed_employee_name TEXT NOT NULL DEFAULT '',
    transaction_total TEXT NOT NULL,
    basket_size INTEGER NOT NULL CHECK (basket_size >= 1),
    retail_units TEXT NOT NULL,
    is_rebooked INTEGER NOT NULL CHECK (is_rebooked IN (0, 1)),
    linked_appointment_date TEXT,
    linked_employee_id TEXT,
    linked_employee_name TEXT,
    is_new_client INTEGER NOT NULL CHECK (is_new_client IN (0, 1)),
    fingerprint TEXT NOT NULL CHECK (fingerprint LIKE 'blake3:%'),
    updated_at_us INTEGER NOT NULL,
    PRIMARY KEY (transaction_date, client_id, line_id),
    CHECK (is_rebooked = 1 OR (linked_appointment_date IS NULL AND linked_employee_id IS NULL))
);

CREATE TABLE IF NOT EXISTS rebook_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_run_at_us INTEGER NOT NULL DEFAULT 0,
    last_window_start TEXT,
    last_record_count INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO rebook_meta (
    id,
    schema_version,
    last_run_at_us,
    last_window_start,
    last_record_count
) VALUES (1, 1, 0, NULL, 0);
";

/// Migration v2: read-path indexes for the staff report and client lookups.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_records_attributed_date
    ON consolidated_records(attributed_employee_id, transaction_date);

CREATE INDEX IF NOT EXISTS idx_records_client_date
    ON consolidated_records(client_id, transaction_date);

UPDATE rebook_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected to exist after all migrations are applied.
pub const REQUIRED_INDEXES: &[&str] = &["idx_records_attributed_date", "idx_records_client_date"];

/// Staging tables, as the extract job writes them.
pub const STAGING_SQL: &str = r"
CREATE TABLE IF NOT EXISTS sale_transaction_lines (
    line_id TEXT,
    transaction_date TEXT,
    client_id TEXT,
    client_name TEXT,
    employee_id TEXT,
    employee_name TEXT,
    item_type TEXT,
    item_name TEXT,
    quantity TEXT,
    line_amount TEXT,
    is_voided TEXT NOT NULL DEFAULT '0'
);

CREATE TABLE IF NOT EXISTS appointments (
    appointment_id TEXT,
    customer_id TEXT,
    appointment_date TEXT,
    is_cancellation TEXT,
    is_deleted TEXT,
    is_no_show TEXT,
    is_arrived TEXT
);

CREATE INDEX IF NOT EXISTS idx_staging_lines_date
    ON sale_transaction_lines(transaction_date);

CREATE INDEX IF NOT EXISTS idx_staging_appointments_customer
    ON appointments(customer_id, appointment_date);
";
