use std::collections::BTreeMap;

use chrono::NaiveDate;
use proptest::prelude::*;
use rebook_core::attribution::attribute;
use rebook_core::group::group_lines;
use rebook_core::model::{ClientId, EmployeeId};
use rebook_core::pipeline::{RunOptions, run};
use rebook_core::rebooking::{AppointmentIndex, RebookingResolver};
use rebook_core::sink::MemoryRecordSink;
use rebook_core::source::MemoryLineStore;
use rebook_core::validate::validate_appointments;
use rust_decimal::Decimal;

#[path = "generators.rs"]
mod generators;
use generators::*;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 31).expect("date")
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn attributed_employee_has_max_total_and_earliest_first_line(params in arb_line_params_list()) {
        let groups = group_lines(typed_lines(&params));
        for tx in &groups {
            let attributed = attribute(tx);

            // Brute force: (total, first seq) per employee.
            let mut per_employee: BTreeMap<EmployeeId, (Decimal, u64)> = BTreeMap::new();
            for line in tx.lines() {
                let entry = per_employee
                    .entry(line.employee_id.clone())
                    .or_insert((Decimal::ZERO, line.seq));
                entry.0 += line.line_amount;
                entry.1 = entry.1.min(line.seq);
            }
            let max = per_employee.values().map(|(total, _)| *total).max().expect("non-empty");
            let expected = per_employee
                .iter()
                .filter(|(_, (total, _))| *total == max)
                .min_by_key(|(_, (_, first))| *first)
                .map(|(id, _)| id.clone())
                .expect("some maximum");

            prop_assert_eq!(&attributed.employee_id, &expected);
            prop_assert_eq!(
                attributed.total_amount,
                tx.lines().iter().map(|l| l.line_amount).sum::<Decimal>()
            );
            prop_assert_eq!(attributed.basket_size as usize, tx.len());
        }
    }

    #[test]
    fn single_employee_visit_gets_the_whole_sum(
        amounts in prop::collection::vec(arb_amount(), 1..8),
        employee in 0u8..4,
    ) {
        let params: Vec<LineParams> = amounts
            .iter()
            .map(|&amount| (0, 0, employee, rebook_core::model::ItemType::Service, 1, amount))
            .collect();
        let groups = group_lines(typed_lines(&params));
        let tx = groups.iter().next().expect("one visit");
        let attributed = attribute(tx);
        prop_assert_eq!(attributed.employee_id.as_str(), format!("E{employee}"));
        prop_assert_eq!(attributed.total_amount, amounts.iter().copied().sum::<Decimal>());
    }

    #[test]
    fn rebooked_iff_latest_valid_appointment_is_after_visit(
        params in arb_line_params_list(),
        appointments in arb_appointment_params(),
    ) {
        let groups = group_lines(typed_lines(&params));
        let valid = validate_appointments(raw_appointments(&appointments)).records;
        let resolver = RebookingResolver::new(AppointmentIndex::build(&valid, &valid), []);
        let links = resolver.resolve_all(&groups);

        for tx in &groups {
            let key = tx.key();
            let latest = valid
                .iter()
                .filter(|a| a.customer_id == key.client_id && a.is_valid())
                .map(|a| a.appointment_date)
                .max();
            let link = &links[key];
            let expected = latest.is_some_and(|d| d > key.transaction_date);
            prop_assert_eq!(link.is_rebooked, expected);
            prop_assert_eq!(link.linked_appointment_date.is_some(), expected);
            prop_assert_eq!(link.linked_employee.is_some(), expected);
            if expected {
                prop_assert_eq!(link.linked_appointment_date, latest);
            }

            let arrived_before = valid.iter().any(|a| {
                a.customer_id == key.client_id && a.is_arrived && a.appointment_date < key.transaction_date
            });
            prop_assert_eq!(link.is_new_client, !arrived_before);
        }
    }

    #[test]
    fn linked_employee_is_shared_across_a_clients_rebooked_visits(
        params in arb_line_params_list(),
        appointments in arb_appointment_params(),
    ) {
        let groups = group_lines(typed_lines(&params));
        let valid = validate_appointments(raw_appointments(&appointments)).records;
        let resolver = RebookingResolver::new(AppointmentIndex::build(&valid, &[]), []);
        let links = resolver.resolve_all(&groups);

        let mut per_client: BTreeMap<&ClientId, Vec<&EmployeeId>> = BTreeMap::new();
        for link in links.values() {
            if let Some(employee) = &link.linked_employee {
                per_client.entry(&link.key.client_id).or_default().push(&employee.id);
            }
        }
        for employees in per_client.values() {
            prop_assert!(employees.windows(2).all(|w| w[0] == w[1]));
        }
    }

    #[test]
    fn reruns_are_idempotent(
        params in arb_line_params_list(),
        appointments in arb_appointment_params(),
        batch_size in 1usize..16,
    ) {
        let store = MemoryLineStore::new(raw_lines(&params), raw_appointments(&appointments));
        let options = RunOptions::new(today(), 30).with_batch_size(batch_size);
        let mut sink = MemoryRecordSink::new();

        let first = run(&store, &mut sink, &options).expect("first run");
        let after_first: Vec<_> = sink.records().cloned().collect();
        let second = run(&store, &mut sink, &options).expect("second run");
        let after_second: Vec<_> = sink.records().cloned().collect();

        prop_assert_eq!(first.records, params.len());
        prop_assert_eq!(first.outcome.inserted as usize, params.len());
        prop_assert_eq!(second.outcome.unchanged as usize, params.len());
        prop_assert_eq!(second.outcome.written(), 0);
        prop_assert_eq!(after_first, after_second);
    }
}
