//! `dienstplan-engine`: booking rules and derived views.
//!
//! [`SchedulingEngine`] decides *whether* a booking, cancellation or rebook is
//! allowed and turns storage outcomes into role-aware errors. Persistence is
//! delegated to [`dienstplan_bookings::BookingStore`].

pub mod engine;
pub mod error;
pub mod notices;
pub mod types;

pub use engine::SchedulingEngine;
pub use error::{BookingError, CancelError, QueryError, RebookError};
pub use notices::{requests_for, Notice};
pub use types::{Notified, Overridden, SlotView, Stats};
