use crate::attribution::AttributedTransaction;
use crate::group::Transaction;
use crate::model::{ConsolidatedRecord, RecordKey};
use crate::rebooking::RebookingLink;

/// One output row per line of `tx`, each carrying the visit's attribution
/// and the client's rebooking facts. Rows come back sorted by [`RecordKey`].
#[must_use]
pub fn consolidate(
    tx: &Transaction,
    attribution: &AttributedTransaction,
    link: &RebookingLink,
) -> Vec<ConsolidatedRecord> {
    debug_assert_eq!(tx.key(), &attribution.key);
    debug_assert_eq!(tx.key(), &link.key);

    let mut records: Vec<ConsolidatedRecord> = tx
        .lines()
        .iter()
        .map(|line| ConsolidatedRecord {
            key: RecordKey {
                transaction_date: line.transaction_date,
                client_id: line.client_id.clone(),
                line_id: line.line_id.clone(),
            },
            client_name: line.client_name.clone(),
            employee_id: line.employee_id.clone(),
            employee_name: line.employee_name.clone(),
            item_type: line.item_type,
            item_name: line.item_name.clone(),
            quantity: line.quantity,
            line_amount: line.line_amount,
            attributed_employee_id: attribution.employee_id.clone(),
            attributed_employee_name: attribution.employee_name.clone(),
            transaction_total: attribution.total_amount,
            basket_size: attribution.basket_size,
            retail_units: attribution.retail_units,
            is_rebooked: link.is_rebooked,
            linked_appointment_date: link.linked_appointment_date,
            linked_employee_id: link.linked_employee.as_ref().map(|e| e.id.clone()),
            linked_employee_name: link.linked_employee.as_ref().map(|e| e.name.clone()),
            is_new_client: link.is_new_client,
        })
        .collect();

    records.sort_by(|a, b| a.key.cmp(&b.key));
    records
}
