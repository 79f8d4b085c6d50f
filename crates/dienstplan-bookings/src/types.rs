use chrono::{DateTime, NaiveDate, Utc};
use dienstplan_calendar::TimeRange;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a booking. `Cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

/// A volunteer's claim on one concrete slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// UUIDv7, so ids sort by creation time.
    pub id: String,
    pub slot_date: NaiveDate,
    #[serde(rename = "slot_time")]
    pub slot_time_range: TimeRange,
    pub user_email: String,
    pub user_name: String,
    /// Empty when the holder has no phone on file.
    pub user_phone: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub cancelled_by: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Set when an admin reassigned the booking to another volunteer.
    pub rebooked_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }

    pub fn is_held_by(&self, email: &str) -> bool {
        self.user_email.eq_ignore_ascii_case(email)
    }
}

/// Booking moved out of the live table by the archive job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedBooking {
    #[serde(flatten)]
    pub booking: Booking,
    pub archived_at: DateTime<Utc>,
}

/// One row of the append-only audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    /// e.g. `booking_created`, `booking_cancelled`, `booking_rebooked`.
    pub action: String,
    pub details: String,
    /// Email of the acting user, or `system` for scheduled jobs.
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}
