//! Domain types shared by every stage of a run.

pub mod appointment;
pub mod ids;
pub mod line;
pub mod record;

pub use appointment::{Appointment, AppointmentQuery, RawAppointment, Validity};
pub use ids::{ClientId, EmployeeId, LineId};
pub use line::{ItemType, RawTransactionLine, TransactionKey, TransactionLine};
pub use record::{ConsolidatedRecord, RecordKey};
