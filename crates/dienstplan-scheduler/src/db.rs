use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler's own tables in `conn`. Idempotent.
///
/// `reminder_ledger` has one row per reminder ever claimed; its primary key is
/// what makes a scan safe to repeat. `daily_runs` has one row per once-a-day
/// job and local date.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS reminder_ledger (
            booking_id  TEXT    NOT NULL,
            lead_time   TEXT    NOT NULL,   -- '24h' | '1h'
            recipient   TEXT    NOT NULL,   -- holder email at claim time
            claimed_at  TEXT    NOT NULL,   -- RFC 3339
            delivered   INTEGER NOT NULL DEFAULT 0,
            failed      INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (booking_id, lead_time, recipient)
        ) STRICT;

        CREATE TABLE IF NOT EXISTS daily_runs (
            job         TEXT    NOT NULL,
            run_date    TEXT    NOT NULL,   -- local YYYY-MM-DD
            ran_at      TEXT    NOT NULL,
            PRIMARY KEY (job, run_date)
        ) STRICT;
        ",
    )?;
    Ok(())
}
