use thiserror::Error;

/// Errors raised while building calendar rules or parsing slot input.
///
/// All of these are caller mistakes (bad config or malformed input); none is
/// transient.
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Unknown weekday: {0}")]
    UnknownWeekday(String),

    #[error("Invalid date {input:?}: expected YYYY-MM-DD")]
    InvalidDate { input: String },

    #[error("Invalid time range {input:?}: {reason}")]
    InvalidTimeRange { input: String, reason: String },

    #[error("Invalid calendar config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CalendarError>;
