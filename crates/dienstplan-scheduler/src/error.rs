use dienstplan_bookings::StoreError;
use dienstplan_core::DienstplanError;
use thiserror::Error;

/// Errors that can occur within the reminder scheduler.
///
/// None of them stop the loop: a failed scan is logged and tried again on the
/// next tick.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Reminder ledger access failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Booking store error: {0}")]
    Store(#[from] StoreError),

    #[error("User directory error: {0}")]
    Directory(#[from] DienstplanError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configured time of day could not be parsed.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
