use dienstplan_core::{NotificationPrefs, User, UserRole};
use rusqlite::{Connection, Result};

/// Column list shared by every SELECT in this crate; order matches `row_to_user`.
pub(crate) const USER_COLUMNS: &str = "email, name, phone, role, active,
     email_notifications, email_on_booking, email_24h, email_1h,
     sms_notifications, sms_on_booking, sms_24h, sms_1h";

pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> Result<User> {
    let role_raw: String = row.get(3)?;
    let role = role_raw.parse::<UserRole>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;
    let flag = |idx: usize| row.get::<_, i64>(idx).map(|v| v != 0);
    Ok(User {
        email: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        role,
        active: flag(4)?,
        prefs: NotificationPrefs {
            email_notifications: flag(5)?,
            email_on_booking: flag(6)?,
            email_24h: flag(7)?,
            email_1h: flag(8)?,
            sms_notifications: flag(9)?,
            sms_on_booking: flag(10)?,
            sms_24h: flag(11)?,
            sms_1h: flag(12)?,
        },
    })
}

/// Initialise the users table. Idempotent; safe on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    // Emails are stored lowercased, so the primary key doubles as the
    // case-insensitive lookup key.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            email               TEXT PRIMARY KEY NOT NULL,
            name                TEXT NOT NULL,
            phone               TEXT NOT NULL DEFAULT '',
            role                TEXT NOT NULL DEFAULT 'user'
                                CHECK (role IN ('user', 'admin')),
            active              INTEGER NOT NULL DEFAULT 1,
            email_notifications INTEGER NOT NULL DEFAULT 1,
            email_on_booking    INTEGER NOT NULL DEFAULT 1,
            email_24h           INTEGER NOT NULL DEFAULT 1,
            email_1h            INTEGER NOT NULL DEFAULT 1,
            sms_notifications   INTEGER NOT NULL DEFAULT 0,
            sms_on_booking      INTEGER NOT NULL DEFAULT 0,
            sms_24h             INTEGER NOT NULL DEFAULT 0,
            sms_1h              INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_users_active ON users (active, role);",
    )
}
