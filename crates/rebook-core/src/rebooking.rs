//! Rebooking linkage and the new-client flag.
//!
//! Linkage is per client, not per visit: the client's latest valid
//! appointment in the window is compared against every one of their visit
//! dates, and the same linked employee (the client's top cumulative earner
//! across the window) is reported on every rebooked visit.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::attribution::{employee_totals, top_earner};
use crate::group::{Transaction, TransactionGroups};
use crate::model::{Appointment, ClientId, EmployeeId, TransactionKey};

/// Per-client appointment facts needed to resolve rebooking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentIndex {
    latest_valid: HashMap<ClientId, NaiveDate>,
    first_arrival: HashMap<ClientId, NaiveDate>,
}

impl AppointmentIndex {
    /// `valid` should cover the run window; `arrived` the client's whole
    /// history. Entries that do not match their role (an invalid appointment
    /// in `valid`, a non-arrival in `arrived`) are ignored.
    #[must_use]
    pub fn build(valid: &[Appointment], arrived: &[Appointment]) -> Self {
        let mut latest_valid: HashMap<ClientId, NaiveDate> = HashMap::new();
        for appt in valid.iter().filter(|a| a.is_valid()) {
            latest_valid
                .entry(appt.customer_id.clone())
                .and_modify(|d| *d = (*d).max(appt.appointment_date))
                .or_insert(appt.appointment_date);
        }

        let mut first_arrival: HashMap<ClientId, NaiveDate> = HashMap::new();
        for appt in arrived.iter().filter(|a| a.is_arrived) {
            first_arrival
                .entry(appt.customer_id.clone())
                .and_modify(|d| *d = (*d).min(appt.appointment_date))
                .or_insert(appt.appointment_date);
        }

        Self {
            latest_valid,
            first_arrival,
        }
    }

    #[must_use]
    pub fn latest_valid(&self, client: &ClientId) -> Option<NaiveDate> {
        self.latest_valid.get(client).copied()
    }

    #[must_use]
    pub fn first_arrival(&self, client: &ClientId) -> Option<NaiveDate> {
        self.first_arrival.get(client).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedEmployee {
    pub id: EmployeeId,
    pub name: String,
}

/// Rebooking facts for one visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebookingLink {
    pub key: TransactionKey,
    pub is_rebooked: bool,
    /// Set only when `is_rebooked`.
    pub linked_appointment_date: Option<NaiveDate>,
    /// Set only when `is_rebooked`.
    pub linked_employee: Option<LinkedEmployee>,
    pub is_new_client: bool,
}

impl RebookingLink {
    fn unlinked(key: TransactionKey, is_new_client: bool) -> Self {
        Self {
            key,
            is_rebooked: false,
            linked_appointment_date: None,
            linked_employee: None,
            is_new_client,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RebookingResolver {
    index: AppointmentIndex,
    walk_ins: HashSet<ClientId>,
}

impl RebookingResolver {
    pub fn new(index: AppointmentIndex, walk_ins: impl IntoIterator<Item = ClientId>) -> Self {
        Self {
            index,
            walk_ins: walk_ins.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn is_walk_in(&self, client: &ClientId) -> bool {
        self.walk_ins.contains(client)
    }

    /// Resolve every visit of one client.
    ///
    /// `visits` must all belong to `client`. Walk-in accounts are never
    /// rebooked and never new.
    #[must_use]
    pub fn resolve_client(&self, client: &ClientId, visits: &[&Transaction]) -> Vec<RebookingLink> {
        if self.is_walk_in(client) {
            return visits
                .iter()
                .map(|tx| RebookingLink::unlinked(tx.key().clone(), false))
                .collect();
        }

        let latest = self.index.latest_valid(client);
        let first_arrival = self.index.first_arrival(client);
        let linked_employee = latest.and_then(|_| {
            let totals = employee_totals(visits.iter().flat_map(|tx| tx.lines()));
            top_earner(&totals).map(|top| LinkedEmployee {
                id: top.employee_id.clone(),
                name: top.employee_name.clone(),
            })
        });

        visits
            .iter()
            .map(|tx| {
                let visit_date = tx.key().transaction_date;
                let is_new_client = first_arrival.is_none_or(|d| d >= visit_date);
                match latest {
                    Some(date) if date > visit_date => RebookingLink {
                        key: tx.key().clone(),
                        is_rebooked: true,
                        linked_appointment_date: Some(date),
                        linked_employee: linked_employee.clone(),
                        is_new_client,
                    },
                    _ => RebookingLink::unlinked(tx.key().clone(), is_new_client),
                }
            })
            .collect()
    }

    /// Resolve every visit in `groups`, client by client.
    #[must_use]
    pub fn resolve_all(&self, groups: &TransactionGroups) -> BTreeMap<TransactionKey, RebookingLink> {
        let mut links = BTreeMap::new();
        for (client, visits) in groups.by_client() {
            for link in self.resolve_client(client, &visits) {
                links.insert(link.key.clone(), link);
            }
        }
        links
    }
}
