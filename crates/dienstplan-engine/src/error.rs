use chrono::NaiveDate;
use dienstplan_bookings::StoreError;
use dienstplan_calendar::{BlockReason, TimeRange};
use dienstplan_core::DienstplanError;
use thiserror::Error;

/// Why a booking (or override) was refused.
///
/// Validation and conflict variants are decided before anything is written.
#[derive(Debug, Error)]
pub enum BookingError {
    /// Holiday or summer pause. Applies to every role.
    #[error("{date} is blocked ({reason})")]
    SlotBlocked { date: NaiveDate, reason: BlockReason },

    #[error("Slot {slot_date} {slot_time} is already booked")]
    SlotTaken {
        slot_date: NaiveDate,
        slot_time: TimeRange,
    },

    /// Admin-only variant of `SlotTaken`: carries what an override needs.
    #[error("Slot is held by {holder} (booking {booking_id})")]
    SlotTakenByOther { booking_id: String, holder: String },

    #[error("You already hold this slot (booking {booking_id})")]
    AlreadyOwnBooking { booking_id: String },

    /// No configured slot matches, or the date lies in the past.
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    #[error("User {0} is deactivated")]
    InactiveUser(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Booking not found: {id}")]
    NotFound { id: String },

    /// Override target is no longer confirmed.
    #[error("Booking {id} is not confirmed")]
    NotConfirmed { id: String },

    #[error(transparent)]
    Storage(StoreError),
}

impl BookingError {
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::SlotBlocked { .. } => "SLOT_BLOCKED",
            BookingError::SlotTaken { .. } => "SLOT_TAKEN",
            BookingError::SlotTakenByOther { .. } => "SLOT_TAKEN_BY_OTHER",
            BookingError::AlreadyOwnBooking { .. } => "ALREADY_OWN_BOOKING",
            BookingError::InvalidSlot(_) => "INVALID_SLOT",
            BookingError::InactiveUser(_) => "INACTIVE_USER",
            BookingError::Forbidden(_) => "FORBIDDEN",
            BookingError::NotFound { .. } => "NOT_FOUND",
            BookingError::NotConfirmed { .. } => "NOT_CONFIRMED",
            BookingError::Storage(e) => e.code(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::Storage(e) if e.is_retryable())
    }
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SlotTaken {
                slot_date,
                slot_time,
            } => BookingError::SlotTaken {
                slot_date,
                slot_time,
            },
            StoreError::NotFound { id } => BookingError::NotFound { id },
            StoreError::AlreadyCancelled { id } => BookingError::NotConfirmed { id },
            other => BookingError::Storage(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum CancelError {
    #[error("Only the holder or an admin may cancel booking {id}")]
    NotOwner { id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Booking {id} is already cancelled")]
    AlreadyCancelled { id: String },

    #[error("Booking not found: {id}")]
    NotFound { id: String },

    #[error(transparent)]
    Storage(StoreError),
}

impl CancelError {
    pub fn code(&self) -> &'static str {
        match self {
            CancelError::NotOwner { .. } => "NOT_OWNER",
            CancelError::Forbidden(_) => "FORBIDDEN",
            CancelError::AlreadyCancelled { .. } => "ALREADY_CANCELLED",
            CancelError::NotFound { .. } => "NOT_FOUND",
            CancelError::Storage(e) => e.code(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CancelError::Storage(e) if e.is_retryable())
    }
}

impl From<StoreError> for CancelError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { id } => CancelError::NotFound { id },
            StoreError::AlreadyCancelled { id } => CancelError::AlreadyCancelled { id },
            other => CancelError::Storage(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum RebookError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Booking not found: {id}")]
    NotFound { id: String },

    #[error("Booking {id} is already cancelled")]
    AlreadyCancelled { id: String },

    #[error("User {0} is deactivated")]
    InactiveUser(String),

    #[error(transparent)]
    Storage(StoreError),
}

impl RebookError {
    pub fn code(&self) -> &'static str {
        match self {
            RebookError::Forbidden(_) => "FORBIDDEN",
            RebookError::NotFound { .. } => "NOT_FOUND",
            RebookError::AlreadyCancelled { .. } => "ALREADY_CANCELLED",
            RebookError::InactiveUser(_) => "INACTIVE_USER",
            RebookError::Storage(e) => e.code(),
        }
    }
}

impl From<StoreError> for RebookError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { id } => RebookError::NotFound { id },
            StoreError::AlreadyCancelled { id } => RebookError::AlreadyCancelled { id },
            other => RebookError::Storage(other),
        }
    }
}

/// Failures of read-only queries.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Directory(#[from] DienstplanError),
}

impl QueryError {
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Forbidden(_) => "FORBIDDEN",
            QueryError::Storage(e) => e.code(),
            QueryError::Directory(e) => e.code(),
        }
    }
}
