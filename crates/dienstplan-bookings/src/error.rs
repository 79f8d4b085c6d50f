use chrono::NaiveDate;
use dienstplan_calendar::TimeRange;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors surfaced by the booking store.
///
/// Every failing operation leaves the database unchanged: writes run inside a
/// transaction that is dropped (rolled back) on the error path.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Booking not found: {id}")]
    NotFound { id: String },

    #[error("Slot {slot_date} {slot_time} is already booked")]
    SlotTaken {
        slot_date: NaiveDate,
        slot_time: TimeRange,
    },

    #[error("Booking {id} is already cancelled")]
    AlreadyCancelled { id: String },

    /// Database locked/busy past the busy timeout, or the connection is
    /// unusable. Nothing was written; the caller may retry.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    /// A stored row could not be decoded into a typed record.
    #[error("Corrupt booking record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "NOT_FOUND",
            StoreError::SlotTaken { .. } => "SLOT_TAKEN",
            StoreError::AlreadyCancelled { .. } => "ALREADY_CANCELLED",
            StoreError::Unavailable(_) => "STORAGE_UNAVAILABLE",
            StoreError::Database(_) => "DATABASE_ERROR",
            StoreError::Corrupt(_) => "CORRUPT_RECORD",
        }
    }
}

// Busy/locked are transient and must be reported as retryable, so this is a
// hand-written From rather than #[from].
impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(f, _)
                if matches!(f.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
            {
                StoreError::Unavailable(e.to_string())
            }
            rusqlite::Error::FromSqlConversionFailure(..) => StoreError::Corrupt(e.to_string()),
            _ => StoreError::Database(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
