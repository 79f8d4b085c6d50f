//! Time source for every date comparison in the workspace.
//!
//! Holiday checks, "tomorrow", and "within the next hour" are all evaluated in
//! the configured timezone, never the host's local time.

use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Timezone all calendar arithmetic is done in.
    fn timezone(&self) -> Tz;

    fn local_now(&self) -> DateTime<Tz> {
        self.now().with_timezone(&self.timezone())
    }

    fn today(&self) -> NaiveDate {
        self.local_now().date_naive()
    }
}

/// Wall-clock time in a fixed timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn timezone(&self) -> Tz {
        self.tz
    }
}

/// Manually driven clock for tests and dry runs.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
    tz: Tz,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, tz: Tz) -> Self {
        Self {
            now: Mutex::new(now),
            tz,
        }
    }

    /// Clock pinned to a local wall-clock time in `tz`.
    ///
    /// Returns `None` for times that do not exist locally (DST gap).
    pub fn at_local(tz: Tz, date: NaiveDate, hour: u32, minute: u32) -> Option<Self> {
        let local = tz
            .from_local_datetime(&date.and_hms_opt(hour, minute, 0)?)
            .earliest()?;
        Some(Self::new(local.with_timezone(&Utc), tz))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn timezone(&self) -> Tz {
        self.tz
    }
}
