use chrono::NaiveDate;

use super::{LineStore, SourceError};
use crate::model::{AppointmentQuery, RawAppointment, RawTransactionLine, Validity};

/// In-memory [`LineStore`] for tests and fixtures.
///
/// Lines are assumed non-voided. Date and flag filtering mirrors
/// [`super::SqliteLineStore`]: ambiguous rows pass through.
#[derive(Debug, Clone, Default)]
pub struct MemoryLineStore {
    pub lines: Vec<RawTransactionLine>,
    pub appointments: Vec<RawAppointment>,
    unavailable: Option<String>,
}

impl MemoryLineStore {
    #[must_use]
    pub const fn new(lines: Vec<RawTransactionLine>, appointments: Vec<RawAppointment>) -> Self {
        Self {
            lines,
            appointments,
            unavailable: None,
        }
    }

    /// Make every read fail with [`SourceError::Unavailable`].
    #[must_use]
    pub fn unavailable(mut self, reason: impl Into<String>) -> Self {
        self.unavailable = Some(reason.into());
        self
    }

    fn check(&self) -> Result<(), SourceError> {
        self.unavailable
            .as_ref()
            .map_or(Ok(()), |reason| Err(SourceError::Unavailable(reason.clone())))
    }
}

impl LineStore for MemoryLineStore {
    fn transaction_lines(&self, since: NaiveDate) -> Result<Vec<RawTransactionLine>, SourceError> {
        self.check()?;
        Ok(self
            .lines
            .iter()
            .filter(|l| on_or_after(l.transaction_date.as_deref(), Some(since)))
            .cloned()
            .collect())
    }

    fn appointments(&self, query: &AppointmentQuery) -> Result<Vec<RawAppointment>, SourceError> {
        self.check()?;
        Ok(self
            .appointments
            .iter()
            .filter(|a| on_or_after(a.appointment_date.as_deref(), query.since))
            .filter(|a| match query.validity {
                Validity::Any => true,
                Validity::Valid => {
                    !flag_set(a.is_cancellation.as_deref())
                        && !flag_set(a.is_deleted.as_deref())
                        && !flag_set(a.is_no_show.as_deref())
                }
                Validity::Arrived => flag_set(a.is_arrived.as_deref()),
            })
            .cloned()
            .collect())
    }
}

fn flag_set(value: Option<&str>) -> bool {
    value.is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

fn on_or_after(value: Option<&str>, since: Option<NaiveDate>) -> bool {
    let Some(since) = since else {
        return true;
    };
    value
        .map(str::trim)
        .and_then(|v| v.get(..10))
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        .is_none_or(|day| day >= since)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, date: Option<&str>) -> RawTransactionLine {
        RawTransactionLine {
            line_id: Some(id.into()),
            transaction_date: date.map(Into::into),
            ..RawTransactionLine::default()
        }
    }

    #[test]
    fn filters_by_window_but_keeps_unparseable_dates() {
        let store = MemoryLineStore::new(
            vec![
                line("L1", Some("2024-01-05")),
                line("L2", Some("2023-12-31")),
                line("L3", Some("garbage")),
                line("L4", None),
            ],
            Vec::new(),
        );
        let since = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        let ids: Vec<String> = store
            .transaction_lines(since)
            .expect("read")
            .into_iter()
            .filter_map(|l| l.line_id)
            .collect();
        assert_eq!(ids, ["L1", "L3", "L4"]);
    }

    #[test]
    fn unavailable_store_fails_every_read() {
        let store = MemoryLineStore::default().unavailable("maintenance");
        let since = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        assert!(matches!(
            store.transaction_lines(since),
            Err(SourceError::Unavailable(reason)) if reason == "maintenance"
        ));
        assert!(store.appointments(&AppointmentQuery::arrived()).is_err());
    }
}
