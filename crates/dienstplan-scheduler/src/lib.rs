//! `dienstplan-scheduler`: the time-driven side of the duty roster.
//!
//! [`ReminderScheduler`] ticks on a fixed interval and, on each tick, runs:
//!
//! | Scan               | When                                   | Sends to            |
//! |--------------------|----------------------------------------|---------------------|
//! | 24h reminders      | from `reminder_24h_at` on              | holders of tomorrow |
//! | 1h reminders       | every tick                             | holders starting soon |
//! | Free-slot alarm    | once per day from `alarm_at` on        | active admins       |
//! | Digest and archive | once per day from `digest_at` on       | backup recipients and admins |
//!
//! Reminders are deduplicated through the [`ledger::ReminderLedger`].

pub mod db;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod schedule;
pub mod types;

pub use engine::{ReminderScheduler, ReminderSettings};
pub use error::{Result, SchedulerError};
pub use ledger::ReminderLedger;
pub use schedule::DailyAt;
pub use types::{LeadTime, LedgerEntry, ScanOutcome, ScanReport, TickReport};
