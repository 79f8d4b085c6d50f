use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{CalendarError, Result};

/// Start/end of a duty shift on a single day. Canonical text form `HH:MM-HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeRange {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if end <= start {
            return Err(CalendarError::InvalidTimeRange {
                input: format!("{}-{}", start.format("%H:%M"), end.format("%H:%M")),
                reason: "end must be after start".to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Build from two `HH:MM` strings.
    pub fn from_parts(start: &str, end: &str) -> Result<Self> {
        let parse = |s: &str| {
            NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|e| {
                CalendarError::InvalidTimeRange {
                    input: format!("{start}-{end}"),
                    reason: e.to_string(),
                }
            })
        };
        Self::new(parse(start)?, parse(end)?)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

impl FromStr for TimeRange {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| CalendarError::InvalidTimeRange {
                input: s.to_string(),
                reason: "expected HH:MM-HH:MM".to_string(),
            })?;
        Self::from_parts(start, end)
    }
}

impl TryFrom<String> for TimeRange {
    type Error = CalendarError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<TimeRange> for String {
    fn from(r: TimeRange) -> Self {
        r.to_string()
    }
}

/// Why a date accepts no bookings. Holiday wins when both apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    Holiday,
    SummerPause,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::Holiday => "holiday",
            BlockReason::SummerPause => "summer_pause",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurring weekly duty definition. Configured, never computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySlotTemplate {
    pub id: u32,
    pub weekday: Weekday,
    pub label: String,
    pub time: TimeRange,
}

/// A template placed on one calendar date. Recomputed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcreteSlot {
    pub template_id: u32,
    pub label: String,
    pub date: NaiveDate,
    pub time: TimeRange,
    pub blocked: bool,
    pub block_reason: Option<BlockReason>,
}

impl ConcreteSlot {
    pub fn start_time(&self) -> NaiveTime {
        self.time.start()
    }

    pub fn end_time(&self) -> NaiveTime {
        self.time.end()
    }

    /// Shift start as an instant in `tz`; `None` inside a DST gap.
    pub fn starts_at<T: TimeZone>(&self, tz: &T) -> Option<DateTime<T>> {
        tz.from_local_datetime(&self.date.and_time(self.start_time()))
            .earliest()
    }
}

/// Parse an English weekday name (`"tuesday"`, `"Tue"`), case-insensitive.
pub fn parse_weekday(name: &str) -> Result<Weekday> {
    let day = match name.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Weekday::Mon,
        "tuesday" | "tue" => Weekday::Tue,
        "wednesday" | "wed" => Weekday::Wed,
        "thursday" | "thu" => Weekday::Thu,
        "friday" | "fri" => Weekday::Fri,
        "saturday" | "sat" => Weekday::Sat,
        "sunday" | "sun" => Weekday::Sun,
        _ => return Err(CalendarError::UnknownWeekday(name.to_string())),
    };
    Ok(day)
}

/// Parse a strict ISO `YYYY-MM-DD` date.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| CalendarError::InvalidDate {
        input: input.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_range_text_form() {
        let r: TimeRange = "17:00-20:00".parse().unwrap();
        assert_eq!(r.to_string(), "17:00-20:00");
        assert_eq!(r.start(), NaiveTime::from_hms_opt(17, 0, 0).unwrap());
    }

    #[test]
    fn time_range_rejects_inverted_and_garbage() {
        assert!("20:00-17:00".parse::<TimeRange>().is_err());
        assert!("17:00".parse::<TimeRange>().is_err());
        assert!("5pm-8pm".parse::<TimeRange>().is_err());
    }

    #[test]
    fn concrete_slot_start_in_timezone() {
        use chrono::{FixedOffset, Timelike};
        let slot = ConcreteSlot {
            template_id: 1,
            label: "Samstag".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            time: TimeRange::from_parts("14:00", "17:00").unwrap(),
            blocked: false,
            block_reason: None,
        };
        let cet = FixedOffset::east_opt(3600).unwrap();
        let start = slot.starts_at(&cet).unwrap();
        assert_eq!(start.naive_utc().hour(), 13);
    }

    #[test]
    fn weekday_names() {
        assert_eq!(parse_weekday("Tuesday").unwrap(), Weekday::Tue);
        assert_eq!(parse_weekday("sat").unwrap(), Weekday::Sat);
        assert!(matches!(
            parse_weekday("dienstag"),
            Err(CalendarError::UnknownWeekday(_))
        ));
    }

    #[test]
    fn dates_are_strict_iso() {
        assert!(parse_date("2025-12-25").is_ok());
        assert!(parse_date("25.12.2025").is_err());
        assert!(parse_date("2025-02-30").is_err());
    }
}
