//! Typed validation of raw staging rows.
//!
//! The staging store hands over every column as optional text. Rows that are
//! missing a required field, or whose date, amount or flag does not parse, are
//! rejected one at a time; the rest of the batch carries on. Each rejection
//! keeps enough of the raw row (id, date, client) for an operator to find it
//! in the vendor system.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::model::{
    Appointment, ClientId, EmployeeId, ItemType, LineId, RawAppointment, RawTransactionLine,
    TransactionLine,
};

/// Largest absolute amount or quantity accepted on a single line. Keeps every
/// per-visit and per-client sum far inside `Decimal`'s range.
pub const MAX_MAGNITUDE: i64 = 1_000_000_000_000;

/// Result of validating one batch of raw rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated<T> {
    pub records: Vec<T>,
    pub rejections: Vec<Rejection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    TransactionLine,
    Appointment,
}

impl RecordKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TransactionLine => "transaction_line",
            Self::Appointment => "appointment",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectionReason {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` is not a date: {value:?}")]
    InvalidDate { field: &'static str, value: String },
    #[error("field `{field}` is not a decimal: {value:?}")]
    InvalidAmount { field: &'static str, value: String },
    #[error("field `{field}` exceeds magnitude {max}: {value:?}", max = MAX_MAGNITUDE)]
    OutOfRange { field: &'static str, value: String },
    #[error("field `{field}` is not a boolean flag: {value:?}")]
    InvalidFlag { field: &'static str, value: String },
    #[error("line id already seen earlier in this batch")]
    DuplicateLineId,
}

/// One dropped input row.
///
/// `record_id`, `date` and `client_id` are copied verbatim from the raw row
/// when present, whether or not they would have parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: RecordKind,
    /// Zero-based index in source read order.
    pub position: usize,
    pub record_id: Option<String>,
    pub date: Option<String>,
    pub client_id: Option<String>,
    pub reason: RejectionReason,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} (id={}, date={}, client={}): {}",
            self.kind,
            self.position,
            self.record_id.as_deref().unwrap_or("?"),
            self.date.as_deref().unwrap_or("?"),
            self.client_id.as_deref().unwrap_or("?"),
            self.reason
        )
    }
}

// ---------------------------------------------------------------------------
// Transaction lines
// ---------------------------------------------------------------------------

/// Validate raw transaction lines, assigning `seq` in read order.
///
/// `seq` is the row's position in `raw`, so it stays stable whether or not
/// earlier rows were rejected.
#[must_use]
pub fn validate_lines(raw: Vec<RawTransactionLine>) -> Validated<TransactionLine> {
    let mut records = Vec::with_capacity(raw.len());
    let mut rejections = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (position, (row, seq)) in raw.into_iter().zip(0_u64..).enumerate() {
        let result = parse_line(&row, seq).and_then(|line| {
            if seen.insert(line.line_id.as_str().to_owned()) {
                Ok(line)
            } else {
                Err(RejectionReason::DuplicateLineId)
            }
        });

        match result {
            Ok(line) => records.push(line),
            Err(reason) => rejections.push(reject(
                RecordKind::TransactionLine,
                position,
                row.line_id,
                row.transaction_date,
                row.client_id,
                reason,
            )),
        }
    }

    Validated {
        records,
        rejections,
    }
}

fn parse_line(row: &RawTransactionLine, seq: u64) -> Result<TransactionLine, RejectionReason> {
    let line_id = required(row.line_id.as_deref(), "line_id")?;
    let transaction_date = parse_date(
        required(row.transaction_date.as_deref(), "transaction_date")?,
        "transaction_date",
    )?;
    let client_id = required(row.client_id.as_deref(), "client_id")?;
    let employee_id = required(row.employee_id.as_deref(), "employee_id")?;
    let item_type = ItemType::from_code(required(row.item_type.as_deref(), "item_type")?);
    let line_amount = parse_decimal(
        required(row.line_amount.as_deref(), "line_amount")?,
        "line_amount",
    )?
    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let quantity = match present(row.quantity.as_deref()) {
        Some(value) => parse_decimal(value, "quantity")?,
        None => Decimal::ONE,
    };

    Ok(TransactionLine {
        seq,
        line_id: LineId::new(line_id),
        transaction_date,
        client_id: ClientId::new(client_id),
        client_name: present(row.client_name.as_deref()).map(str::to_owned),
        employee_id: EmployeeId::new(employee_id),
        employee_name: present(row.employee_name.as_deref())
            .unwrap_or_default()
            .to_owned(),
        item_type,
        item_name: present(row.item_name.as_deref())
            .unwrap_or_default()
            .to_owned(),
        quantity,
        line_amount,
    })
}

// ---------------------------------------------------------------------------
// Appointments
// ---------------------------------------------------------------------------

#[must_use]
pub fn validate_appointments(raw: Vec<RawAppointment>) -> Validated<Appointment> {
    let mut records = Vec::with_capacity(raw.len());
    let mut rejections = Vec::new();

    for (position, row) in raw.into_iter().enumerate() {
        match parse_appointment(&row) {
            Ok(appointment) => records.push(appointment),
            Err(reason) => rejections.push(reject(
                RecordKind::Appointment,
                position,
                row.appointment_id,
                row.appointment_date,
                row.customer_id,
                reason,
            )),
        }
    }

    Validated {
        records,
        rejections,
    }
}

fn parse_appointment(row: &RawAppointment) -> Result<Appointment, RejectionReason> {
    let customer_id = required(row.customer_id.as_deref(), "customer_id")?;
    let appointment_date = parse_date(
        required(row.appointment_date.as_deref(), "appointment_date")?,
        "appointment_date",
    )?;
    let is_cancellation = parse_flag(
        required(row.is_cancellation.as_deref(), "is_cancellation")?,
        "is_cancellation",
    )?;
    let is_deleted = parse_flag(
        required(row.is_deleted.as_deref(), "is_deleted")?,
        "is_deleted",
    )?;
    let is_no_show = parse_flag(
        required(row.is_no_show.as_deref(), "is_no_show")?,
        "is_no_show",
    )?;
    let is_arrived = match present(row.is_arrived.as_deref()) {
        Some(value) => parse_flag(value, "is_arrived")?,
        None => false,
    };

    Ok(Appointment {
        appointment_id: present(row.appointment_id.as_deref()).map(str::to_owned),
        customer_id: ClientId::new(customer_id),
        appointment_date,
        is_cancellation,
        is_deleted,
        is_no_show,
        is_arrived,
    })
}

// ---------------------------------------------------------------------------
// Field parsing
// ---------------------------------------------------------------------------

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, RejectionReason> {
    present(value).ok_or(RejectionReason::MissingField(field))
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time component
/// (`2024-01-01 09:30:00`, `2024-01-01T09:30:00Z`).
fn parse_date(value: &str, field: &'static str) -> Result<NaiveDate, RejectionReason> {
    let invalid = || RejectionReason::InvalidDate {
        field,
        value: value.to_owned(),
    };
    let day = value.get(..10).ok_or_else(invalid)?;
    let rest = value.get(10..).unwrap_or_default();
    if !(rest.is_empty() || rest.starts_with(' ') || rest.starts_with('T')) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| invalid())
}

fn parse_decimal(value: &str, field: &'static str) -> Result<Decimal, RejectionReason> {
    let parsed = Decimal::from_str(value).map_err(|_| RejectionReason::InvalidAmount {
        field,
        value: value.to_owned(),
    })?;
    if parsed.abs() > Decimal::from(MAX_MAGNITUDE) {
        return Err(RejectionReason::OutOfRange {
            field,
            value: value.to_owned(),
        });
    }
    Ok(parsed)
}

fn parse_flag(value: &str, field: &'static str) -> Result<bool, RejectionReason> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(RejectionReason::InvalidFlag {
            field,
            value: value.to_owned(),
        }),
    }
}

fn reject(
    kind: RecordKind,
    position: usize,
    record_id: Option<String>,
    date: Option<String>,
    client_id: Option<String>,
    reason: RejectionReason,
) -> Rejection {
    let rejection = Rejection {
        kind,
        position,
        record_id,
        date,
        client_id,
        reason,
    };
    tracing::warn!(
        kind = %rejection.kind,
        position = rejection.position,
        record_id = rejection.record_id.as_deref().unwrap_or(""),
        date = rejection.date.as_deref().unwrap_or(""),
        client_id = rejection.client_id.as_deref().unwrap_or(""),
        reason = %rejection.reason,
        "rejected input row"
    );
    rejection
}
