#![allow(dead_code)]

use chrono::NaiveDate;
use proptest::prelude::*;
use rebook_core::model::{
    ClientId, EmployeeId, ItemType, LineId, RawAppointment, RawTransactionLine, TransactionLine,
};
use rust_decimal::Decimal;

pub fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).expect("base date")
}

/// Amounts in whole cents, -50.00 ..= 500.00, kept coarse so ties happen.
pub fn arb_amount() -> impl Strategy<Value = Decimal> + Clone {
    prop_oneof![
        (-10i64..=100).prop_map(|units| Decimal::new(units * 500, 2)),
        (-5000i64..=50000).prop_map(|cents| Decimal::new(cents, 2)),
    ]
}

pub fn arb_item_type() -> impl Strategy<Value = ItemType> + Clone {
    prop_oneof![
        4 => Just(ItemType::Service),
        2 => Just(ItemType::Product),
        1 => Just(ItemType::Prepayment),
        1 => Just(ItemType::Other),
    ]
}

/// `(day offset, client, employee, item type, quantity, amount)`
pub type LineParams = (u32, u8, u8, ItemType, u8, Decimal);

pub fn arb_line_params() -> impl Strategy<Value = LineParams> + Clone {
    (0u32..10, 0u8..4, 0u8..4, arb_item_type(), 1u8..4, arb_amount())
}

pub fn arb_line_params_list() -> impl Strategy<Value = Vec<LineParams>> + Clone {
    prop::collection::vec(arb_line_params(), 1..40)
}

/// Typed lines with `seq` and `line_id` assigned in list order.
pub fn typed_lines(params: &[LineParams]) -> Vec<TransactionLine> {
    params
        .iter()
        .zip(0u64..)
        .map(|(&(day, client, employee, item_type, qty, amount), seq)| TransactionLine {
            seq,
            line_id: LineId::new(format!("L{seq}")),
            transaction_date: base_date() + chrono::Days::new(u64::from(day)),
            client_id: ClientId::new(format!("C{client}")),
            client_name: None,
            employee_id: EmployeeId::new(format!("E{employee}")),
            employee_name: format!("Employee {employee}"),
            item_type,
            item_name: String::new(),
            quantity: Decimal::from(qty),
            line_amount: amount,
        })
        .collect()
}

/// The same lines as the staging store would hand them over.
pub fn raw_lines(params: &[LineParams]) -> Vec<RawTransactionLine> {
    typed_lines(params)
        .into_iter()
        .map(|line| RawTransactionLine {
            line_id: Some(line.line_id.to_string()),
            transaction_date: Some(line.transaction_date.to_string()),
            client_id: Some(line.client_id.to_string()),
            client_name: None,
            employee_id: Some(line.employee_id.to_string()),
            employee_name: Some(line.employee_name),
            item_type: Some(line.item_type.as_str().to_owned()),
            item_name: None,
            quantity: Some(line.quantity.to_string()),
            line_amount: Some(line.line_amount.to_string()),
        })
        .collect()
}

/// `(day offset, client, cancelled, arrived)`
pub type AppointmentParams = (u32, u8, bool, bool);

pub fn arb_appointment_params() -> impl Strategy<Value = Vec<AppointmentParams>> + Clone {
    prop::collection::vec((0u32..20, 0u8..4, any::<bool>(), any::<bool>()), 0..12)
}

pub fn raw_appointments(params: &[AppointmentParams]) -> Vec<RawAppointment> {
    params
        .iter()
        .enumerate()
        .map(|(i, &(day, client, cancelled, arrived))| RawAppointment {
            appointment_id: Some(format!("A{i}")),
            customer_id: Some(format!("C{client}")),
            appointment_date: Some((base_date() + chrono::Days::new(u64::from(day))).to_string()),
            is_cancellation: Some(if cancelled { "1" } else { "0" }.into()),
            is_deleted: Some("0".into()),
            is_no_show: Some("0".into()),
            is_arrived: Some(if arrived { "1" } else { "0" }.into()),
        })
        .collect()
}
