//! The exported unit of work: one row per charged line, carrying the visit's
//! attribution and the client's rebooking facts alongside the line itself.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{ClientId, EmployeeId, LineId};
use super::line::{ItemType, TransactionKey};

/// Stable upsert key, built only from immutable source identifiers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub transaction_date: NaiveDate,
    pub client_id: ClientId,
    pub line_id: LineId,
}

impl RecordKey {
    #[must_use]
    pub fn transaction_key(&self) -> TransactionKey {
        TransactionKey::new(self.transaction_date, self.client_id.clone())
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.transaction_date, self.client_id, self.line_id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedRecord {
    pub key: RecordKey,
    pub client_name: Option<String>,

    // Line detail.
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub item_type: ItemType,
    pub item_name: String,
    pub quantity: Decimal,
    pub line_amount: Decimal,

    // Visit attribution.
    pub attributed_employee_id: EmployeeId,
    pub attributed_employee_name: String,
    pub transaction_total: Decimal,
    pub basket_size: u32,
    pub retail_units: Decimal,

    // Client rebooking.
    pub is_rebooked: bool,
    pub linked_appointment_date: Option<NaiveDate>,
    pub linked_employee_id: Option<EmployeeId>,
    pub linked_employee_name: Option<String>,
    pub is_new_client: bool,
}

const FIELD_SEP: &[u8] = &[0x1f];

fn put(hasher: &mut blake3::Hasher, value: &str) {
    hasher.update(value.as_bytes());
    hasher.update(FIELD_SEP);
}

fn put_opt(hasher: &mut blake3::Hasher, value: Option<&str>) {
    match value {
        Some(value) => {
            hasher.update(&[1]);
            put(hasher, value);
        }
        None => {
            hasher.update(&[0]);
            hasher.update(FIELD_SEP);
        }
    }
}

impl ConsolidatedRecord {
    /// Content hash over every field, in declaration order.
    ///
    /// Format: `blake3:<lowercase hex>`. Decimals are normalized first so
    /// `70.0` and `70.00` hash the same. Optional fields carry a presence
    /// byte so `None` never hashes like `Some("")`.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        let h = &mut hasher;

        put(h, &self.key.transaction_date.to_string());
        put(h, self.key.client_id.as_str());
        put(h, self.key.line_id.as_str());
        put_opt(h, self.client_name.as_deref());
        put(h, self.employee_id.as_str());
        put(h, &self.employee_name);
        put(h, self.item_type.as_str());
        put(h, &self.item_name);
        put(h, &self.quantity.normalize().to_string());
        put(h, &self.line_amount.normalize().to_string());
        put(h, self.attributed_employee_id.as_str());
        put(h, &self.attributed_employee_name);
        put(h, &self.transaction_total.normalize().to_string());
        put(h, &self.basket_size.to_string());
        put(h, &self.retail_units.normalize().to_string());
        put(h, if self.is_rebooked { "1" } else { "0" });
        put_opt(
            h,
            self.linked_appointment_date
                .map(|d| d.to_string())
                .as_deref(),
        );
        put_opt(h, self.linked_employee_id.as_ref().map(EmployeeId::as_str));
        put_opt(h, self.linked_employee_name.as_deref());
        put(h, if self.is_new_client { "1" } else { "0" });

        format!("blake3:{}", hasher.finalize().to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn record() -> ConsolidatedRecord {
        ConsolidatedRecord {
            key: RecordKey {
                transaction_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"),
                client_id: ClientId::from("C1"),
                line_id: LineId::from("L1"),
            },
            client_name: Some("Ada Lovelace".into()),
            employee_id: EmployeeId::from("E1"),
            employee_name: "Eve".into(),
            item_type: ItemType::Service,
            item_name: "Cut".into(),
            quantity: Decimal::ONE,
            line_amount: Decimal::from_str("50.00").expect("decimal"),
            attributed_employee_id: EmployeeId::from("E2"),
            attributed_employee_name: "Bo".into(),
            transaction_total: Decimal::from_str("120.00").expect("decimal"),
            basket_size: 2,
            retail_units: Decimal::ZERO,
            is_rebooked: true,
            linked_appointment_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            linked_employee_id: Some(EmployeeId::from("E1")),
            linked_employee_name: Some("Eve".into()),
            is_new_client: false,
        }
    }

    #[test]
    fn fingerprint_is_stable_and_prefixed() {
        let a = record().fingerprint();
        let b = record().fingerprint();
        assert_eq!(a, b);
        assert!(a.starts_with("blake3:"));
        assert_eq!(a.len(), "blake3:".len() + 64);
    }

    #[test]
    fn fingerprint_ignores_decimal_scale() {
        let mut scaled = record();
        scaled.line_amount = Decimal::from_str("50.0").expect("decimal");
        assert_eq!(scaled.fingerprint(), record().fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_rebooking_state() {
        let mut changed = record();
        changed.is_rebooked = false;
        changed.linked_appointment_date = None;
        assert_ne!(changed.fingerprint(), record().fingerprint());
    }

    #[test]
    fn missing_and_empty_client_name_hash_differently() {
        let mut missing = record();
        missing.client_name = None;
        let mut empty = record();
        empty.client_name = Some(String::new());
        assert_ne!(missing.fingerprint(), empty.fingerprint());
    }

    #[test]
    fn missing_linked_name_differs_from_empty() {
        let mut missing = record();
        missing.linked_employee_name = None;
        let mut empty = record();
        empty.linked_employee_name = Some(String::new());
        assert_ne!(missing.fingerprint(), empty.fingerprint());
    }
}
