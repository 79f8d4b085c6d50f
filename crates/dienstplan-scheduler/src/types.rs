use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dienstplan_engine::Notice;
use serde::{Deserialize, Serialize};

/// How far ahead of shift start a reminder goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadTime {
    #[serde(rename = "24h")]
    Hours24,
    #[serde(rename = "1h")]
    Hours1,
}

impl LeadTime {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadTime::Hours24 => "24h",
            LeadTime::Hours1 => "1h",
        }
    }

    pub fn notice(&self) -> Notice {
        match self {
            LeadTime::Hours24 => Notice::Reminder24h,
            LeadTime::Hours1 => Notice::Reminder1h,
        }
    }
}

impl fmt::Display for LeadTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadTime {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "24h" => Ok(LeadTime::Hours24),
            "1h" => Ok(LeadTime::Hours1),
            other => Err(format!("unknown lead time: {other}")),
        }
    }
}

/// Jobs that run at most once per local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyJob {
    FreeSlotsAlarm,
    Digest,
}

impl DailyJob {
    pub fn as_str(&self) -> &'static str {
        match self {
            DailyJob::FreeSlotsAlarm => "free_slots_alarm",
            DailyJob::Digest => "digest",
        }
    }
}

/// One row of the reminder ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub booking_id: String,
    pub lead_time: LeadTime,
    pub recipient: String,
    pub claimed_at: DateTime<Utc>,
    pub delivered: u32,
    pub failed: u32,
}

/// Counts for one scan that ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Requests the gateway accepted.
    pub sent: usize,
    /// Requests the gateway rejected or that timed out.
    pub failed: usize,
    /// Bookings skipped because their reminder was already claimed.
    pub already_sent: usize,
}

impl ScanReport {
    pub(crate) fn absorb(&mut self, reports: &[dienstplan_notify::DeliveryReport]) {
        let ok = reports.iter().filter(|r| r.is_delivered()).count();
        self.sent += ok;
        self.failed += reports.len() - ok;
    }
}

/// What happened to one scan during a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Not yet time (or already done today).
    #[default]
    NotDue,
    Ran(ScanReport),
    /// The scan aborted; it is retried on the next tick.
    Failed { error: String },
}

impl ScanOutcome {
    pub fn report(&self) -> Option<&ScanReport> {
        match self {
            ScanOutcome::Ran(r) => Some(r),
            _ => None,
        }
    }
}

/// Result of one scheduler tick, one entry per scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub reminders_24h: ScanOutcome,
    pub reminders_1h: ScanOutcome,
    pub free_slots_alarm: ScanOutcome,
    pub digest: ScanOutcome,
}

impl TickReport {
    /// Total requests sent across all scans.
    pub fn sent(&self) -> usize {
        [
            &self.reminders_24h,
            &self.reminders_1h,
            &self.free_slots_alarm,
            &self.digest,
        ]
        .iter()
        .filter_map(|o| o.report())
        .map(|r| r.sent)
        .sum()
    }
}
