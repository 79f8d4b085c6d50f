use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use dienstplan_calendar::TimeRange;
use dienstplan_core::{Clock, User};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::types::{ArchivedBooking, AuditEntry, Booking, BookingStatus};

const BOOKING_COLUMNS: &str = "id, slot_date, slot_time, user_email, user_name, user_phone,
     status, created_at, cancelled_by, cancelled_at, rebooked_at";

/// Single source of truth for bookings and the only code that mutates them.
///
/// Wraps one SQLite connection in a `Mutex`, which serialises writers inside
/// this process. Writers in other processes (or other `BookingStore`s on the
/// same file) are kept honest by the partial UNIQUE index on confirmed slots.
pub struct BookingStore {
    db: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl BookingStore {
    /// Wrap an open connection, initialising the schema if needed.
    pub fn new(conn: Connection, clock: Arc<dyn Clock>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            clock,
        })
    }

    /// Open `path` with a bounded wait on locked databases.
    pub fn open(path: &str, busy_timeout: Duration, clock: Arc<dyn Clock>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::new(conn, clock)
    }

    /// Confirmed booking on a slot, if any.
    pub fn get_active_booking(
        &self,
        slot_date: NaiveDate,
        slot_time: TimeRange,
    ) -> Result<Option<Booking>> {
        let db = self.conn()?;
        let booking = db
            .query_row(
                &format!(
                    "SELECT {BOOKING_COLUMNS} FROM bookings
                     WHERE slot_date = ?1 AND slot_time = ?2 AND status = 'confirmed'"
                ),
                params![slot_date.to_string(), slot_time.to_string()],
                row_to_booking,
            )
            .optional()?;
        Ok(booking)
    }

    /// Booking by id, whatever its status.
    pub fn get_booking(&self, id: &str) -> Result<Option<Booking>> {
        let db = self.conn()?;
        Ok(fetch(&db, id)?)
    }

    /// Create a confirmed booking for `user` on the slot.
    ///
    /// The INSERT itself is the availability check: a second confirmed row for
    /// the same slot violates `idx_bookings_one_confirmed` and comes back as
    /// [`StoreError::SlotTaken`], whichever connection got there first.
    #[instrument(skip(self, user), fields(user = %user.email))]
    pub fn create_booking(
        &self,
        slot_date: NaiveDate,
        slot_time: TimeRange,
        user: &User,
    ) -> Result<Booking> {
        let now = self.clock.now();
        let mut db = self.conn()?;
        let tx = db.transaction()?;

        let id = insert_confirmed(&tx, slot_date, slot_time, user, now)?;
        append_audit(
            &tx,
            "booking_created",
            &format!("{slot_date} {slot_time} for {}", user.email),
            &user.email,
            now,
        )?;
        let booking = fetch_required(&tx, &id)?;
        tx.commit()?;

        info!(booking_id = %booking.id, "booking created");
        Ok(booking)
    }

    /// Soft-cancel a confirmed booking. The row is kept for the audit trail.
    #[instrument(skip(self))]
    pub fn cancel_booking(&self, id: &str, cancelled_by: &str) -> Result<Booking> {
        let now = self.clock.now();
        let mut db = self.conn()?;
        let tx = db.transaction()?;

        cancel_confirmed(&tx, id, cancelled_by, now)?;
        let booking = fetch_required(&tx, id)?;
        append_audit(
            &tx,
            "booking_cancelled",
            &format!(
                "{} {} held by {}",
                booking.slot_date, booking.slot_time_range, booking.user_email
            ),
            cancelled_by,
            now,
        )?;
        tx.commit()?;

        info!(booking_id = %id, "booking cancelled");
        Ok(booking)
    }

    /// Reassign a confirmed booking to `new_user` in place.
    ///
    /// `id`, `created_at` and `status` are untouched; `rebooked_at` is stamped.
    #[instrument(skip(self, new_user), fields(new_user = %new_user.email))]
    pub fn rebook(&self, id: &str, new_user: &User, actor: &str) -> Result<Booking> {
        let now = self.clock.now();
        let mut db = self.conn()?;
        let tx = db.transaction()?;

        let previous = fetch_required(&tx, id)?;
        let n = tx.execute(
            "UPDATE bookings
             SET user_email = ?2, user_name = ?3, user_phone = ?4, rebooked_at = ?5
             WHERE id = ?1 AND status = 'confirmed'",
            params![id, new_user.email, new_user.name, new_user.phone, ts(now)],
        )?;
        if n == 0 {
            return Err(StoreError::AlreadyCancelled { id: id.to_string() });
        }
        append_audit(
            &tx,
            "booking_rebooked",
            &format!(
                "{} {} from {} to {}",
                previous.slot_date, previous.slot_time_range, previous.user_email, new_user.email
            ),
            actor,
            now,
        )?;
        let booking = fetch_required(&tx, id)?;
        tx.commit()?;

        info!(booking_id = %id, from = %previous.user_email, "booking rebooked");
        Ok(booking)
    }

    /// Cancel `existing_id` and create a booking for `new_user` on the same
    /// slot as one transaction. On any failure neither change is kept, so the
    /// slot is never left empty by a half-done override.
    ///
    /// Returns `(cancelled, created)`.
    #[instrument(skip(self, new_user), fields(new_user = %new_user.email))]
    pub fn replace_booking(
        &self,
        existing_id: &str,
        new_user: &User,
        actor: &str,
    ) -> Result<(Booking, Booking)> {
        let now = self.clock.now();
        let mut db = self.conn()?;
        let tx = db.transaction()?;

        let existing = fetch_required(&tx, existing_id)?;
        cancel_confirmed(&tx, existing_id, actor, now)?;
        let new_id = insert_confirmed(
            &tx,
            existing.slot_date,
            existing.slot_time_range,
            new_user,
            now,
        )?;
        append_audit(
            &tx,
            "booking_overridden",
            &format!(
                "{} {} from {} to {}",
                existing.slot_date, existing.slot_time_range, existing.user_email, new_user.email
            ),
            actor,
            now,
        )?;
        let cancelled = fetch_required(&tx, existing_id)?;
        let created = fetch_required(&tx, &new_id)?;
        tx.commit()?;

        info!(cancelled = %existing_id, created = %new_id, "booking overridden");
        Ok((cancelled, created))
    }

    /// Confirmed bookings held by `email`, ascending by slot date.
    ///
    /// With `future_only`, slots before today (scheduler timezone) are skipped.
    pub fn list_bookings_for_user(&self, email: &str, future_only: bool) -> Result<Vec<Booking>> {
        let from = if future_only {
            self.clock.today().to_string()
        } else {
            String::new()
        };
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE user_email = ?1 AND status = 'confirmed' AND slot_date >= ?2
             ORDER BY slot_date, slot_time"
        ))?;
        let rows = stmt.query_map(params![email.to_lowercase(), from], row_to_booking)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Confirmed bookings with `start <= slot_date <= end`, chronological.
    pub fn list_bookings_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Booking>> {
        let db = self.conn()?;
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE status = 'confirmed' AND slot_date >= ?1 AND slot_date <= ?2
             ORDER BY slot_date, slot_time"
        ))?;
        let rows = stmt.query_map(params![start.to_string(), end.to_string()], row_to_booking)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Number of confirmed bookings with `start <= slot_date <= end`.
    pub fn count_confirmed_between(&self, start: NaiveDate, end: NaiveDate) -> Result<u64> {
        let db = self.conn()?;
        let n: i64 = db.query_row(
            "SELECT COUNT(*) FROM bookings
             WHERE status = 'confirmed' AND slot_date >= ?1 AND slot_date <= ?2",
            params![start.to_string(), end.to_string()],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    /// Number of confirmed bookings on or after `start`.
    pub fn count_confirmed_from(&self, start: NaiveDate) -> Result<u64> {
        let db = self.conn()?;
        let n: i64 = db.query_row(
            "SELECT COUNT(*) FROM bookings WHERE status = 'confirmed' AND slot_date >= ?1",
            params![start.to_string()],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    /// Every live booking regardless of status, for snapshots.
    pub fn all_bookings(&self) -> Result<Vec<Booking>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY slot_date, slot_time, created_at"
        ))?;
        let rows = stmt.query_map([], row_to_booking)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Move bookings whose slot date is before `cutoff` into the archive table.
    ///
    /// Returns how many rows moved.
    #[instrument(skip(self))]
    pub fn archive_before(&self, cutoff: NaiveDate) -> Result<usize> {
        let now = self.clock.now();
        let mut db = self.conn()?;
        let tx = db.transaction()?;

        let moved = tx.execute(
            &format!(
                "INSERT INTO bookings_archive ({BOOKING_COLUMNS}, archived_at)
                 SELECT {BOOKING_COLUMNS}, ?1 FROM bookings WHERE slot_date < ?2"
            ),
            params![ts(now), cutoff.to_string()],
        )?;
        let deleted = tx.execute(
            "DELETE FROM bookings WHERE slot_date < ?1",
            params![cutoff.to_string()],
        )?;
        if moved != deleted {
            // Dropping the transaction rolls both statements back.
            warn!(moved, deleted, "archive row counts diverged; rolling back");
            return Err(StoreError::Unavailable(
                "archive aborted: concurrent modification".to_string(),
            ));
        }
        if moved > 0 {
            append_audit(
                &tx,
                "bookings_archived",
                &format!("{moved} bookings before {cutoff}"),
                "system",
                now,
            )?;
        }
        tx.commit()?;

        if moved > 0 {
            info!(moved, %cutoff, "bookings archived");
        } else {
            debug!(%cutoff, "nothing to archive");
        }
        Ok(moved)
    }

    /// Archived bookings, oldest slot first.
    pub fn list_archived(&self) -> Result<Vec<ArchivedBooking>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {BOOKING_COLUMNS}, archived_at FROM bookings_archive
             ORDER BY slot_date, slot_time"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(ArchivedBooking {
                booking: row_to_booking(row)?,
                archived_at: parse_col(row, 11, parse_ts)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Most recent audit entries, newest first.
    pub fn audit_log(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT id, action, details, actor, timestamp FROM audit_log
             ORDER BY rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(AuditEntry {
                id: row.get(0)?,
                action: row.get(1)?,
                details: row.get(2)?,
                actor: row.get(3)?,
                timestamp: parse_col(row, 4, parse_ts)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| StoreError::Unavailable("booking store lock poisoned".to_string()))
    }
}

// --- statement helpers ------------------------------------------------------

fn insert_confirmed(
    tx: &Transaction<'_>,
    slot_date: NaiveDate,
    slot_time: TimeRange,
    user: &User,
    now: DateTime<Utc>,
) -> Result<String> {
    let id = Uuid::now_v7().to_string();
    let inserted = tx.execute(
        "INSERT INTO bookings
         (id, slot_date, slot_time, user_email, user_name, user_phone, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'confirmed', ?7)",
        params![
            id,
            slot_date.to_string(),
            slot_time.to_string(),
            user.email,
            user.name,
            user.phone,
            ts(now)
        ],
    );
    match inserted {
        Ok(_) => Ok(id),
        Err(rusqlite::Error::SqliteFailure(f, _)) if f.code == ErrorCode::ConstraintViolation => {
            Err(StoreError::SlotTaken {
                slot_date,
                slot_time,
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Conditional UPDATE so the confirmed→cancelled transition is atomic.
fn cancel_confirmed(
    tx: &Transaction<'_>,
    id: &str,
    cancelled_by: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let n = tx.execute(
        "UPDATE bookings SET status = 'cancelled', cancelled_by = ?2, cancelled_at = ?3
         WHERE id = ?1 AND status = 'confirmed'",
        params![id, cancelled_by, ts(now)],
    )?;
    if n == 1 {
        return Ok(());
    }
    match fetch(tx, id)? {
        Some(_) => Err(StoreError::AlreadyCancelled { id: id.to_string() }),
        None => Err(StoreError::NotFound { id: id.to_string() }),
    }
}

fn append_audit(
    tx: &Transaction<'_>,
    action: &str,
    details: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    tx.execute(
        "INSERT INTO audit_log (id, action, details, actor, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![Uuid::now_v7().to_string(), action, details, actor, ts(now)],
    )?;
    Ok(())
}

fn fetch(conn: &Connection, id: &str) -> rusqlite::Result<Option<Booking>> {
    conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        row_to_booking,
    )
    .optional()
}

fn fetch_required(conn: &Connection, id: &str) -> Result<Booking> {
    fetch(conn, id)?.ok_or_else(|| StoreError::NotFound { id: id.to_string() })
}

// --- row mapping ------------------------------------------------------------

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc))
}

/// Read a TEXT column and parse it, reporting failures as conversion errors.
fn parse_col<T, E: std::fmt::Display>(
    row: &Row<'_>,
    idx: usize,
    parse: impl FnOnce(&str) -> std::result::Result<T, E>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("{raw:?}: {e}").into(),
        )
    })
}

fn parse_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(_) => parse_col(row, idx, parse_ts).map(Some),
    }
}

fn row_to_booking(row: &Row<'_>) -> rusqlite::Result<Booking> {
    Ok(Booking {
        id: row.get(0)?,
        slot_date: parse_col(row, 1, |s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))?,
        slot_time_range: parse_col(row, 2, |s| s.parse::<TimeRange>())?,
        user_email: row.get(3)?,
        user_name: row.get(4)?,
        user_phone: row.get(5)?,
        status: parse_col(row, 6, |s| s.parse::<BookingStatus>())?,
        created_at: parse_col(row, 7, parse_ts)?,
        cancelled_by: row.get(8)?,
        cancelled_at: parse_opt_ts(row, 9)?,
        rebooked_at: parse_opt_ts(row, 10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use dienstplan_core::{FixedClock, UserRole};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn thu() -> TimeRange {
        "17:00-20:00".parse().unwrap()
    }

    fn user(email: &str, name: &str) -> User {
        User::new(email, name, "+491700000000", UserRole::User).unwrap()
    }

    fn store_at(date: &str) -> (BookingStore, Arc<FixedClock>) {
        let clock = Arc::new(
            FixedClock::at_local(chrono_tz::Europe::Berlin, d(date), 10, 0).unwrap(),
        );
        let store =
            BookingStore::new(Connection::open_in_memory().unwrap(), clock.clone()).unwrap();
        (store, clock)
    }

    #[test]
    fn create_then_get_active() {
        let (store, _) = store_at("2025-12-10");
        let anna = user("anna@example.org", "Anna");
        let b = store.create_booking(d("2025-12-18"), thu(), &anna).unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert_eq!(b.user_email, "anna@example.org");

        let active = store.get_active_booking(d("2025-12-18"), thu()).unwrap();
        assert_eq!(active, Some(b));
        assert!(store.get_active_booking(d("2025-12-19"), thu()).unwrap().is_none());
    }

    #[test]
    fn second_booking_on_same_slot_is_slot_taken() {
        let (store, _) = store_at("2025-12-10");
        store
            .create_booking(d("2025-12-18"), thu(), &user("anna@example.org", "Anna"))
            .unwrap();
        let err = store
            .create_booking(d("2025-12-18"), thu(), &user("ben@example.org", "Ben"))
            .unwrap_err();
        assert!(matches!(err, StoreError::SlotTaken { .. }));
        assert_eq!(store.all_bookings().unwrap().len(), 1);
    }

    #[test]
    fn cancel_is_soft_and_frees_the_slot() {
        let (store, _) = store_at("2025-12-10");
        let b = store
            .create_booking(d("2025-12-18"), thu(), &user("anna@example.org", "Anna"))
            .unwrap();
        let cancelled = store.cancel_booking(&b.id, "anna@example.org").unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.cancelled_by.as_deref(), Some("anna@example.org"));
        assert!(cancelled.cancelled_at.is_some());

        // Row is still there.
        assert_eq!(store.get_booking(&b.id).unwrap().unwrap().id, b.id);
        // And a fresh booking can take the slot.
        let again = store
            .create_booking(d("2025-12-18"), thu(), &user("ben@example.org", "Ben"))
            .unwrap();
        assert_ne!(again.id, b.id);
    }

    #[test]
    fn cancel_twice_reports_already_cancelled() {
        let (store, _) = store_at("2025-12-10");
        let b = store
            .create_booking(d("2025-12-18"), thu(), &user("anna@example.org", "Anna"))
            .unwrap();
        let first = store.cancel_booking(&b.id, "x@example.org").unwrap();
        let err = store.cancel_booking(&b.id, "y@example.org").unwrap_err();
        assert!(matches!(err, StoreError::AlreadyCancelled { .. }));
        // First cancellation's actor is preserved.
        assert_eq!(store.get_booking(&b.id).unwrap().unwrap(), first);
    }

    #[test]
    fn cancel_unknown_is_not_found() {
        let (store, _) = store_at("2025-12-10");
        assert!(matches!(
            store.cancel_booking("nope", "x@example.org"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn rebook_keeps_identity() {
        let (store, clock) = store_at("2025-12-10");
        let b = store
            .create_booking(d("2025-12-18"), thu(), &user("anna@example.org", "Anna"))
            .unwrap();
        clock.advance(ChronoDuration::hours(2));
        let ben = user("ben@example.org", "Ben");
        let r = store.rebook(&b.id, &ben, "admin@example.org").unwrap();
        assert_eq!(r.id, b.id);
        assert_eq!(r.created_at, b.created_at);
        assert_eq!(r.user_email, "ben@example.org");
        assert_eq!(r.user_name, "Ben");
        assert_eq!(r.status, BookingStatus::Confirmed);
        assert!(r.rebooked_at.unwrap() > r.created_at);
    }

    #[test]
    fn rebook_cancelled_fails() {
        let (store, _) = store_at("2025-12-10");
        let b = store
            .create_booking(d("2025-12-18"), thu(), &user("anna@example.org", "Anna"))
            .unwrap();
        store.cancel_booking(&b.id, "anna@example.org").unwrap();
        let err = store
            .rebook(&b.id, &user("ben@example.org", "Ben"), "admin@example.org")
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyCancelled { .. }));
    }

    #[test]
    fn replace_booking_swaps_holder_atomically() {
        let (store, _) = store_at("2025-12-10");
        let anna = store
            .create_booking(d("2025-12-18"), thu(), &user("anna@example.org", "Anna"))
            .unwrap();
        let (old, new) = store
            .replace_booking(&anna.id, &user("ben@example.org", "Ben"), "admin@example.org")
            .unwrap();
        assert_eq!(old.status, BookingStatus::Cancelled);
        assert_eq!(new.user_email, "ben@example.org");
        let active = store.get_active_booking(d("2025-12-18"), thu()).unwrap().unwrap();
        assert_eq!(active.id, new.id);
    }

    #[test]
    fn replace_booking_rolls_back_on_failure() {
        let (store, _) = store_at("2025-12-10");
        let anna = store
            .create_booking(d("2025-12-18"), thu(), &user("anna@example.org", "Anna"))
            .unwrap();
        store.cancel_booking(&anna.id, "anna@example.org").unwrap();
        let ben = store
            .create_booking(d("2025-12-18"), thu(), &user("ben@example.org", "Ben"))
            .unwrap();

        // Overriding a booking that is no longer confirmed must not touch Ben's.
        let err = store
            .replace_booking(&anna.id, &user("cara@example.org", "Cara"), "admin@example.org")
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyCancelled { .. }));
        let active = store.get_active_booking(d("2025-12-18"), thu()).unwrap().unwrap();
        assert_eq!(active.id, ben.id);
    }

    #[test]
    fn user_listing_is_sorted_and_filters_past() {
        let (store, _) = store_at("2025-12-17");
        let anna = user("anna@example.org", "Anna");
        store.create_booking(d("2025-12-25"), thu(), &anna).unwrap();
        store.create_booking(d("2025-12-11"), thu(), &anna).unwrap();
        store.create_booking(d("2025-12-18"), thu(), &anna).unwrap();
        store
            .create_booking(d("2025-12-04"), thu(), &user("ben@example.org", "Ben"))
            .unwrap();

        let all: Vec<NaiveDate> = store
            .list_bookings_for_user("Anna@Example.org", false)
            .unwrap()
            .iter()
            .map(|b| b.slot_date)
            .collect();
        assert_eq!(all, vec![d("2025-12-11"), d("2025-12-18"), d("2025-12-25")]);

        let future = store.list_bookings_for_user("anna@example.org", true).unwrap();
        assert_eq!(future.len(), 2);
        assert_eq!(future[0].slot_date, d("2025-12-18"));
    }

    #[test]
    fn range_queries_only_see_confirmed() {
        let (store, _) = store_at("2025-12-01");
        let anna = user("anna@example.org", "Anna");
        let a = store.create_booking(d("2025-12-04"), thu(), &anna).unwrap();
        store.create_booking(d("2025-12-11"), thu(), &anna).unwrap();
        store.create_booking(d("2025-12-18"), thu(), &anna).unwrap();
        store.cancel_booking(&a.id, "anna@example.org").unwrap();

        let in_range = store
            .list_bookings_in_range(d("2025-12-01"), d("2025-12-11"))
            .unwrap();
        assert_eq!(in_range.len(), 1);
        assert_eq!(in_range[0].slot_date, d("2025-12-11"));
        assert_eq!(
            store
                .count_confirmed_between(d("2025-12-01"), d("2025-12-31"))
                .unwrap(),
            2
        );
        assert_eq!(store.count_confirmed_from(d("2025-12-12")).unwrap(), 1);
    }

    #[test]
    fn archive_moves_old_rows() {
        let (store, _) = store_at("2025-12-01");
        let anna = user("anna@example.org", "Anna");
        store.create_booking(d("2024-11-07"), thu(), &anna).unwrap();
        store.create_booking(d("2025-12-04"), thu(), &anna).unwrap();

        assert_eq!(store.archive_before(d("2025-01-01")).unwrap(), 1);
        assert_eq!(store.all_bookings().unwrap().len(), 1);
        let archived = store.list_archived().unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].booking.slot_date, d("2024-11-07"));
        // Second run is a no-op.
        assert_eq!(store.archive_before(d("2025-01-01")).unwrap(), 0);
    }

    #[test]
    fn mutations_are_audited_newest_first() {
        let (store, _) = store_at("2025-12-01");
        let b = store
            .create_booking(d("2025-12-18"), thu(), &user("anna@example.org", "Anna"))
            .unwrap();
        store.cancel_booking(&b.id, "admin@example.org").unwrap();

        let log = store.audit_log(10).unwrap();
        let actions: Vec<&str> = log.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["booking_cancelled", "booking_created"]);
        assert_eq!(log[0].actor, "admin@example.org");
    }

    #[test]
    fn failed_create_leaves_no_audit_entry() {
        let (store, _) = store_at("2025-12-01");
        let anna = user("anna@example.org", "Anna");
        store.create_booking(d("2025-12-18"), thu(), &anna).unwrap();
        let _ = store.create_booking(d("2025-12-18"), thu(), &user("ben@example.org", "Ben"));
        assert_eq!(store.audit_log(10).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_creates_admit_exactly_one() {
        let (store, _) = store_at("2025-12-10");
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let u = user(&format!("v{i}@example.org"), &format!("V{i}"));
                    store.create_booking(d("2025-12-18"), thu(), &u)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let ok = results.iter().filter(|r| r.is_ok()).count();
        let taken = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::SlotTaken { .. })))
            .count();
        assert_eq!(ok, 1);
        assert_eq!(taken, 7);
    }

    #[test]
    fn separate_connections_cannot_double_book() {
        let path = std::env::temp_dir().join(format!("dienstplan-{}.db", Uuid::new_v4()));
        let path_str = path.to_string_lossy().to_string();
        let clock: Arc<dyn Clock> = Arc::new(
            FixedClock::at_local(chrono_tz::Europe::Berlin, d("2025-12-10"), 10, 0).unwrap(),
        );
        let a = BookingStore::open(&path_str, Duration::from_secs(5), clock.clone()).unwrap();
        let b = BookingStore::open(&path_str, Duration::from_secs(5), clock).unwrap();

        a.create_booking(d("2025-12-18"), thu(), &user("anna@example.org", "Anna"))
            .unwrap();
        let err = b
            .create_booking(d("2025-12-18"), thu(), &user("ben@example.org", "Ben"))
            .unwrap_err();
        assert!(matches!(err, StoreError::SlotTaken { .. }));

        drop(a);
        drop(b);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn locked_database_is_retryable_unavailable() {
        let path = std::env::temp_dir().join(format!("dienstplan-{}.db", Uuid::new_v4()));
        let path_str = path.to_string_lossy().to_string();
        let clock: Arc<dyn Clock> = Arc::new(
            FixedClock::at_local(chrono_tz::Europe::Berlin, d("2025-12-10"), 10, 0).unwrap(),
        );
        let store = BookingStore::open(&path_str, Duration::from_millis(50), clock).unwrap();

        let locker = Connection::open(&path_str).unwrap();
        locker.execute_batch("BEGIN EXCLUSIVE;").unwrap();

        let err = store
            .create_booking(d("2025-12-18"), thu(), &user("anna@example.org", "Anna"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "got {err:?}");
        assert!(err.is_retryable());
        assert_eq!(err.code(), "STORAGE_UNAVAILABLE");

        locker.execute_batch("ROLLBACK;").unwrap();
        store
            .create_booking(d("2025-12-18"), thu(), &user("anna@example.org", "Anna"))
            .unwrap();

        drop(locker);
        drop(store);
        let _ = std::fs::remove_file(&path);
    }
}
