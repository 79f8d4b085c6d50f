use thiserror::Error;

/// Why a notification did not reach its recipient.
///
/// Never rolls back a booking; the core reports it and moves on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The provider refused the request (bad address, blocked number, ...).
    #[error("Delivery rejected: {0}")]
    Rejected(String),

    /// The provider could not be reached.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// The send exceeded its time budget.
    #[error("Send timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The gateway is missing credentials or settings for this channel.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DeliveryError {
    pub fn code(&self) -> &'static str {
        match self {
            DeliveryError::Rejected(_) => "DELIVERY_REJECTED",
            DeliveryError::Unavailable(_) => "TRANSPORT_UNAVAILABLE",
            DeliveryError::Timeout { .. } => "TIMEOUT",
            DeliveryError::ConfigError(_) => "CONFIG_ERROR",
        }
    }
}
