use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveTime, TimeZone};

use crate::error::SchedulerError;

/// A local wall-clock time of day, written `HH:MM` in the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DailyAt(NaiveTime);

impl DailyAt {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }

    /// True once the local time of `now` has reached this time of day.
    pub fn is_due<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        now.time() >= self.0
    }

    /// First occurrence strictly after `from`, in `from`'s timezone.
    ///
    /// A day on which the time does not exist locally (DST gap) is skipped.
    pub fn next_after<Tz: TimeZone>(&self, from: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = from.timezone();
        let mut day = from.date_naive();
        for _ in 0..3 {
            if let Some(candidate) = tz.from_local_datetime(&day.and_time(self.0)).earliest() {
                if candidate > *from {
                    return Some(candidate);
                }
            }
            day += Duration::days(1);
        }
        None
    }
}

impl FromStr for DailyAt {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Self)
            .map_err(|e| SchedulerError::InvalidSchedule(format!("{s:?}: {e}")))
    }
}

impl fmt::Display for DailyAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};
    use chrono_tz::Europe::Berlin;

    fn berlin(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<chrono_tz::Tz> {
        Berlin
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(y, m, d)
                    .unwrap()
                    .and_hms_opt(h, min, 0)
                    .unwrap(),
            )
            .single()
            .unwrap()
    }

    #[test]
    fn parse_and_display() {
        let at: DailyAt = "18:00".parse().unwrap();
        assert_eq!(at.to_string(), "18:00");
        assert!("25:00".parse::<DailyAt>().is_err());
        assert!("six pm".parse::<DailyAt>().is_err());
    }

    #[test]
    fn due_from_the_configured_minute_on() {
        let at = DailyAt::new(18, 0).unwrap();
        assert!(!at.is_due(&berlin(2025, 12, 17, 17, 59)));
        assert!(at.is_due(&berlin(2025, 12, 17, 18, 0)));
        assert!(at.is_due(&berlin(2025, 12, 17, 23, 30)));
    }

    #[test]
    fn next_after_rolls_to_tomorrow() {
        let at = DailyAt::new(20, 0).unwrap();
        let today = at.next_after(&berlin(2025, 12, 17, 9, 0)).unwrap();
        assert_eq!(today.date_naive(), NaiveDate::from_ymd_opt(2025, 12, 17).unwrap());
        let tomorrow = at.next_after(&berlin(2025, 12, 17, 20, 0)).unwrap();
        assert_eq!(tomorrow.date_naive(), NaiveDate::from_ymd_opt(2025, 12, 18).unwrap());
        assert_eq!(tomorrow.hour(), 20);
    }

    #[test]
    fn next_after_skips_dst_gap() {
        // 02:30 does not exist in Berlin on 2026-03-29.
        let at = DailyAt::new(2, 30).unwrap();
        let next = at.next_after(&berlin(2026, 3, 28, 12, 0)).unwrap();
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 30).unwrap());
    }
}
