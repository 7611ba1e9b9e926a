//! Max-revenue attribution of a visit to a single employee.
//!
//! Each employee's lines are summed; the largest total wins. On an exact tie
//! the employee whose first line came earliest in source order (`seq`) wins.
//! The tie-break is deterministic but carries no business meaning.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::group::Transaction;
use crate::model::{EmployeeId, ItemType, TransactionKey, TransactionLine};

/// Revenue one employee brought into a set of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeRevenueTotal {
    pub employee_id: EmployeeId,
    /// Taken from the employee's first line.
    pub employee_name: String,
    pub total: Decimal,
    /// `seq` of the employee's first line.
    pub first_seq: u64,
}

/// Per-employee totals, ordered by each employee's first appearance.
pub fn employee_totals<'a>(
    lines: impl IntoIterator<Item = &'a TransactionLine>,
) -> Vec<EmployeeRevenueTotal> {
    let mut totals: Vec<EmployeeRevenueTotal> = Vec::new();
    let mut index: HashMap<&EmployeeId, usize> = HashMap::new();

    for line in lines {
        if let Some(&slot) = index.get(&line.employee_id) {
            let entry = &mut totals[slot];
            entry.total += line.line_amount;
            if line.seq < entry.first_seq {
                entry.first_seq = line.seq;
                entry.employee_name.clone_from(&line.employee_name);
            }
        } else {
            index.insert(&line.employee_id, totals.len());
            totals.push(EmployeeRevenueTotal {
                employee_id: line.employee_id.clone(),
                employee_name: line.employee_name.clone(),
                total: line.line_amount,
                first_seq: line.seq,
            });
        }
    }

    totals.sort_by_key(|t| t.first_seq);
    totals
}

/// Highest total, ties to the lowest `first_seq`.
#[must_use]
pub fn top_earner(totals: &[EmployeeRevenueTotal]) -> Option<&EmployeeRevenueTotal> {
    totals.iter().max_by(|a, b| {
        a.total
            .cmp(&b.total)
            .then_with(|| b.first_seq.cmp(&a.first_seq))
    })
}

/// A visit with its credited employee and basket figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributedTransaction {
    pub key: TransactionKey,
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub total_amount: Decimal,
    /// Number of lines in the visit.
    pub basket_size: u32,
    /// Sum of `quantity` over product lines.
    pub retail_units: Decimal,
    pub employee_totals: Vec<EmployeeRevenueTotal>,
}

/// Attribute one visit.
///
/// Works for any non-empty visit, including all-zero and all-negative ones:
/// the same max-then-first rule applies.
#[must_use]
pub fn attribute(tx: &Transaction) -> AttributedTransaction {
    let employee_totals = employee_totals(tx.lines());
    let (employee_id, employee_name) = top_earner(&employee_totals).map_or_else(
        || {
            let first = tx.first_line();
            (first.employee_id.clone(), first.employee_name.clone())
        },
        |top| (top.employee_id.clone(), top.employee_name.clone()),
    );

    let total_amount = tx.lines().iter().map(|l| l.line_amount).sum();
    let retail_units = tx
        .lines()
        .iter()
        .filter(|l| l.item_type == ItemType::Product)
        .map(|l| l.quantity)
        .sum();
    let basket_size = u32::try_from(tx.len()).unwrap_or(u32::MAX);

    AttributedTransaction {
        key: tx.key().clone(),
        employee_id,
        employee_name,
        total_amount,
        basket_size,
        retail_units,
        employee_totals,
    }
}
