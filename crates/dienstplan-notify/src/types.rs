use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Delivery medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which message the gateway should render. Wording lives in the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    BookingConfirmation,
    Cancellation,
    Reminder24h,
    Reminder1h,
    FreeSlotsAlarm,
    BookingSnapshot,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::BookingConfirmation => "booking_confirmation",
            TemplateKind::Cancellation => "cancellation",
            TemplateKind::Reminder24h => "reminder_24h",
            TemplateKind::Reminder1h => "reminder_1h",
            TemplateKind::FreeSlotsAlarm => "free_slots_alarm",
            TemplateKind::BookingSnapshot => "booking_snapshot",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message to one recipient over one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub channel: Channel,
    /// Email address or E.164 phone number, depending on `channel`.
    pub recipient: String,
    pub kind: TemplateKind,
    pub params: BTreeMap<String, String>,
}

impl NotificationRequest {
    pub fn new(channel: Channel, recipient: impl Into<String>, kind: TemplateKind) -> Self {
        Self {
            channel,
            recipient: recipient.into(),
            kind,
            params: BTreeMap::new(),
        }
    }

    /// Builder-style parameter insert.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Outcome of one send, returned to whoever initiated it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub channel: Channel,
    pub recipient: String,
    pub kind: TemplateKind,
    /// `None` on success, otherwise the rendered delivery error.
    pub error: Option<String>,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        self.error.is_none()
    }
}
