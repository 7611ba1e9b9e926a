use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ids::ClientId;

/// A validated appointment-book entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub appointment_id: Option<String>,
    pub customer_id: ClientId,
    pub appointment_date: NaiveDate,
    pub is_cancellation: bool,
    pub is_deleted: bool,
    pub is_no_show: bool,
    pub is_arrived: bool,
}

impl Appointment {
    /// An appointment counts toward rebooking only when it is still on the
    /// books: not cancelled, not deleted, not a no-show.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        !self.is_cancellation && !self.is_deleted && !self.is_no_show
    }
}

/// An appointment row as the staging store hands it over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAppointment {
    pub appointment_id: Option<String>,
    pub customer_id: Option<String>,
    pub appointment_date: Option<String>,
    pub is_cancellation: Option<String>,
    pub is_deleted: Option<String>,
    pub is_no_show: Option<String>,
    pub is_arrived: Option<String>,
}

/// Which appointments a [`crate::source::LineStore`] query should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// Every appointment, whatever its flags.
    Any,
    /// Not cancelled, not deleted, not a no-show.
    Valid,
    /// The client turned up.
    Arrived,
}

/// Filter passed to [`crate::source::LineStore::appointments`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppointmentQuery {
    pub validity: Validity,
    /// Inclusive lower bound on `appointment_date`.
    pub since: Option<NaiveDate>,
}

impl AppointmentQuery {
    #[must_use]
    pub const fn valid_since(since: NaiveDate) -> Self {
        Self {
            validity: Validity::Valid,
            since: Some(since),
        }
    }

    #[must_use]
    pub const fn arrived() -> Self {
        Self {
            validity: Validity::Arrived,
            since: None,
        }
    }
}
