//! `dienstplan-bookings`: durable booking records and their audit trail.
//!
//! [`BookingStore`] is the only writer of the `bookings` table. Callers decide
//! *whether* a booking is allowed; the store guarantees that at most one
//! confirmed booking per slot ever exists.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::BookingStore;
pub use types::{ArchivedBooking, AuditEntry, Booking, BookingStatus};
