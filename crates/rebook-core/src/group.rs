//! Grouping of validated lines into client visits.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::model::{ClientId, TransactionKey, TransactionLine};

/// Every line a client was charged on one day.
///
/// Always holds at least one line: the only constructor is
/// [`group_lines`], which creates a group from the line that opens it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    key: TransactionKey,
    lines: Vec<TransactionLine>,
}

impl Transaction {
    fn open(line: TransactionLine) -> Self {
        Self {
            key: line.key(),
            lines: vec![line],
        }
    }

    #[must_use]
    pub const fn key(&self) -> &TransactionKey {
        &self.key
    }

    /// Lines in source read order.
    #[must_use]
    pub fn lines(&self) -> &[TransactionLine] {
        &self.lines
    }

    #[must_use]
    pub fn first_line(&self) -> &TransactionLine {
        &self.lines[0]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

/// Visits keyed by `(date, client)`, iterated in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionGroups {
    groups: BTreeMap<TransactionKey, Transaction>,
}

impl TransactionGroups {
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &TransactionKey) -> Option<&Transaction> {
        self.groups.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.groups.values()
    }

    /// Visits per client, each client's visits in date order.
    #[must_use]
    pub fn by_client(&self) -> BTreeMap<&ClientId, Vec<&Transaction>> {
        let mut out: BTreeMap<&ClientId, Vec<&Transaction>> = BTreeMap::new();
        for tx in self.groups.values() {
            out.entry(&tx.key.client_id).or_default().push(tx);
        }
        for visits in out.values_mut() {
            visits.sort_by_key(|tx| tx.key.transaction_date);
        }
        out
    }
}

impl<'a> IntoIterator for &'a TransactionGroups {
    type Item = &'a Transaction;
    type IntoIter = std::collections::btree_map::Values<'a, TransactionKey, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.values()
    }
}

/// Group lines by [`TransactionKey`], keeping read order within each group.
///
/// No filtering happens here: a single-line visit is a valid group.
#[must_use]
pub fn group_lines(lines: impl IntoIterator<Item = TransactionLine>) -> TransactionGroups {
    let mut groups: BTreeMap<TransactionKey, Transaction> = BTreeMap::new();
    for line in lines {
        match groups.entry(line.key()) {
            Entry::Occupied(mut entry) => entry.get_mut().lines.push(line),
            Entry::Vacant(entry) => {
                entry.insert(Transaction::open(line));
            }
        }
    }
    TransactionGroups { groups }
}
