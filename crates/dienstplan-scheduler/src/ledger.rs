use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use tracing::debug;

use crate::db::init_db;
use crate::error::Result;
use crate::types::{DailyJob, LeadTime, LedgerEntry};

/// Persistent record of which reminders and daily jobs already fired.
///
/// Written only by the reminder scheduler. Claims are taken *before* sending,
/// so a crash mid-send loses at most that reminder instead of repeating it.
pub struct ReminderLedger {
    conn: Mutex<Connection>,
}

impl ReminderLedger {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Claim the `(booking, lead, recipient)` reminder.
    ///
    /// Returns `false` when it was claimed before.
    pub fn claim(
        &self,
        booking_id: &str,
        lead: LeadTime,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let n = self.conn().execute(
            "INSERT OR IGNORE INTO reminder_ledger (booking_id, lead_time, recipient, claimed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![booking_id, lead.as_str(), recipient, ts(now)],
        )?;
        if n == 0 {
            debug!(booking_id, lead = %lead, recipient, "reminder already claimed");
        }
        Ok(n == 1)
    }

    /// Store how many of the claimed reminder's requests went through.
    pub fn record_outcome(
        &self,
        booking_id: &str,
        lead: LeadTime,
        recipient: &str,
        delivered: usize,
        failed: usize,
    ) -> Result<()> {
        self.conn().execute(
            "UPDATE reminder_ledger SET delivered = ?4, failed = ?5
             WHERE booking_id = ?1 AND lead_time = ?2 AND recipient = ?3",
            params![
                booking_id,
                lead.as_str(),
                recipient,
                delivered as i64,
                failed as i64
            ],
        )?;
        Ok(())
    }

    pub fn daily_ran(&self, job: DailyJob, date: NaiveDate) -> Result<bool> {
        let n: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM daily_runs WHERE job = ?1 AND run_date = ?2",
            params![job.as_str(), date.to_string()],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    pub fn mark_daily(&self, job: DailyJob, date: NaiveDate, now: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO daily_runs (job, run_date, ran_at) VALUES (?1, ?2, ?3)",
            params![job.as_str(), date.to_string(), ts(now)],
        )?;
        Ok(())
    }

    /// All ledger rows for a booking, for inspection.
    pub fn entries_for(&self, booking_id: &str) -> Result<Vec<LedgerEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT booking_id, lead_time, recipient, claimed_at, delivered, failed
             FROM reminder_ledger WHERE booking_id = ?1 ORDER BY claimed_at, lead_time",
        )?;
        let rows = stmt.query_map(params![booking_id], |row| {
            let lead: String = row.get(1)?;
            let claimed: String = row.get(3)?;
            Ok(LedgerEntry {
                booking_id: row.get(0)?,
                lead_time: lead.parse().map_err(|e: String| conversion(1, e))?,
                recipient: row.get(2)?,
                claimed_at: DateTime::parse_from_rfc3339(&claimed)
                    .map(|d| d.with_timezone(&Utc))
                    .map_err(|e| conversion(3, e.to_string()))?,
                delivered: row.get(4)?,
                failed: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn conversion(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> ReminderLedger {
        ReminderLedger::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn claim_is_once_per_key() {
        let l = ledger();
        let now = Utc::now();
        assert!(l.claim("b1", LeadTime::Hours24, "anna@example.org", now).unwrap());
        assert!(!l.claim("b1", LeadTime::Hours24, "anna@example.org", now).unwrap());
        // Different lead time or new holder: separate claims.
        assert!(l.claim("b1", LeadTime::Hours1, "anna@example.org", now).unwrap());
        assert!(l.claim("b1", LeadTime::Hours24, "ben@example.org", now).unwrap());
        assert_eq!(l.entries_for("b1").unwrap().len(), 3);
    }

    #[test]
    fn outcome_is_recorded() {
        let l = ledger();
        l.claim("b1", LeadTime::Hours1, "anna@example.org", Utc::now())
            .unwrap();
        l.record_outcome("b1", LeadTime::Hours1, "anna@example.org", 1, 1)
            .unwrap();
        let e = &l.entries_for("b1").unwrap()[0];
        assert_eq!((e.delivered, e.failed), (1, 1));
        assert_eq!(e.lead_time, LeadTime::Hours1);
    }

    #[test]
    fn daily_runs_are_per_date() {
        let l = ledger();
        let day = NaiveDate::from_ymd_opt(2025, 12, 17).unwrap();
        assert!(!l.daily_ran(DailyJob::Digest, day).unwrap());
        l.mark_daily(DailyJob::Digest, day, Utc::now()).unwrap();
        assert!(l.daily_ran(DailyJob::Digest, day).unwrap());
        assert!(!l.daily_ran(DailyJob::FreeSlotsAlarm, day).unwrap());
        assert!(!l
            .daily_ran(DailyJob::Digest, day.succ_opt().unwrap())
            .unwrap());
    }
}
