use rusqlite::Connection;

use crate::error::Result;

/// Initialise the booking schema in `conn`.
///
/// Idempotent: every statement uses `IF NOT EXISTS`.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS bookings (
            id            TEXT    NOT NULL PRIMARY KEY,
            slot_date     TEXT    NOT NULL,   -- YYYY-MM-DD
            slot_time     TEXT    NOT NULL,   -- HH:MM-HH:MM
            user_email    TEXT    NOT NULL,
            user_name     TEXT    NOT NULL,
            user_phone    TEXT    NOT NULL DEFAULT '',
            status        TEXT    NOT NULL CHECK (status IN ('confirmed', 'cancelled')),
            created_at    TEXT    NOT NULL,
            cancelled_by  TEXT,
            cancelled_at  TEXT,
            rebooked_at   TEXT
        ) STRICT;

        -- At most one confirmed booking per slot. This index is what makes
        -- concurrent bookers on the same slot lose with a constraint error.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_bookings_one_confirmed
            ON bookings (slot_date, slot_time) WHERE status = 'confirmed';
        CREATE INDEX IF NOT EXISTS idx_bookings_user
            ON bookings (user_email, slot_date);
        CREATE INDEX IF NOT EXISTS idx_bookings_date
            ON bookings (slot_date);

        CREATE TABLE IF NOT EXISTS bookings_archive (
            id            TEXT    NOT NULL PRIMARY KEY,
            slot_date     TEXT    NOT NULL,
            slot_time     TEXT    NOT NULL,
            user_email    TEXT    NOT NULL,
            user_name     TEXT    NOT NULL,
            user_phone    TEXT    NOT NULL,
            status        TEXT    NOT NULL,
            created_at    TEXT    NOT NULL,
            cancelled_by  TEXT,
            cancelled_at  TEXT,
            rebooked_at   TEXT,
            archived_at   TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS audit_log (
            id         TEXT NOT NULL PRIMARY KEY,
            action     TEXT NOT NULL,
            details    TEXT NOT NULL,
            actor      TEXT NOT NULL,
            timestamp  TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_audit_log_ts ON audit_log (timestamp DESC);
        ",
    )?;
    Ok(())
}
