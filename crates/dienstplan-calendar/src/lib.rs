//! `dienstplan-calendar`: which duty slots exist and which dates are blocked.
//!
//! Everything here is pure: no I/O, no clock. Callers pass the dates they
//! care about, usually obtained from a [`dienstplan_core::Clock`].

pub mod error;
pub mod rules;
pub mod types;

pub use error::{CalendarError, Result};
pub use rules::{horizon_end, slot_date, week_start, CalendarRules, MAX_HORIZON_DAYS};
pub use types::{
    parse_date, parse_weekday, BlockReason, ConcreteSlot, TimeRange, WeeklySlotTemplate,
};
