use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{ClientId, EmployeeId, LineId};

/// What a transaction line charged for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Service,
    Product,
    Prepayment,
    Other,
}

impl ItemType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Product => "product",
            Self::Prepayment => "prepayment",
            Self::Other => "other",
        }
    }

    /// Map a vendor item type code onto an [`ItemType`].
    ///
    /// Accepts the point-of-sale form (`ItemType.Service`,
    /// `ItemType.BookingPrepayment`) as well as the plain lowercase names.
    /// Unrecognized codes map to [`ItemType::Other`]; they still count toward
    /// revenue but never toward retail units.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        let code = code.trim();
        let bare = code.strip_prefix("ItemType.").unwrap_or(code);
        match bare.to_ascii_lowercase().as_str() {
            "service" => Self::Service,
            "product" => Self::Product,
            "prepayment" | "bookingprepayment" => Self::Prepayment,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one client visit: every line a client was charged on one day.
///
/// Ordered by date first, then client.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionKey {
    pub transaction_date: NaiveDate,
    pub client_id: ClientId,
}

impl TransactionKey {
    #[must_use]
    pub const fn new(transaction_date: NaiveDate, client_id: ClientId) -> Self {
        Self {
            transaction_date,
            client_id,
        }
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.transaction_date, self.client_id)
    }
}

/// A validated, charged line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLine {
    /// Position in source read order. Attribution ties resolve to the
    /// employee with the lowest `seq`.
    pub seq: u64,
    pub line_id: LineId,
    pub transaction_date: NaiveDate,
    pub client_id: ClientId,
    pub client_name: Option<String>,
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub item_type: ItemType,
    pub item_name: String,
    pub quantity: Decimal,
    /// Tax-inclusive amount, rounded to cents.
    pub line_amount: Decimal,
}

impl TransactionLine {
    #[must_use]
    pub fn key(&self) -> TransactionKey {
        TransactionKey::new(self.transaction_date, self.client_id.clone())
    }
}

/// A transaction line as the staging store hands it over.
///
/// Every column is optional text: the extract job coerces all vendor columns
/// to strings, so typing happens in [`crate::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTransactionLine {
    pub line_id: Option<String>,
    pub transaction_date: Option<String>,
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub employee_id: Option<String>,
    pub employee_name: Option<String>,
    pub item_type: Option<String>,
    pub item_name: Option<String>,
    pub quantity: Option<String>,
    pub line_amount: Option<String>,
}
