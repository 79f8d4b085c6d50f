use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use dienstplan_core::config::AdminConfig;
use dienstplan_core::{NotificationPrefs, User, UserDirectory, UserRole};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{info, instrument};

use crate::db::{init_db, row_to_user, USER_COLUMNS};
use crate::error::{Result, UserError};

/// SQLite-backed user directory.
///
/// The scheduling core only reads through [`UserDirectory`]; the mutating
/// methods here serve operator tooling and admin seeding.
pub struct SqliteUserDirectory {
    db: Mutex<Connection>,
}

impl SqliteUserDirectory {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Insert a new user. Fails with `AlreadyExists` if the email is taken.
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub fn create_user(&self, user: &User) -> Result<User> {
        let now = Utc::now().to_rfc3339();
        let db = self.conn()?;
        let p = &user.prefs;
        let res = db.execute(
            "INSERT INTO users
                (email, name, phone, role, active,
                 email_notifications, email_on_booking, email_24h, email_1h,
                 sms_notifications, sms_on_booking, sms_24h, sms_1h,
                 created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?14)",
            params![
                user.email.to_lowercase(),
                user.name,
                user.phone,
                user.role.to_string(),
                user.active as i64,
                p.email_notifications as i64,
                p.email_on_booking as i64,
                p.email_24h as i64,
                p.email_1h as i64,
                p.sms_notifications as i64,
                p.sms_on_booking as i64,
                p.sms_24h as i64,
                p.sms_1h as i64,
                now,
            ],
        );
        match res {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(f, _))
                if f.code == ErrorCode::ConstraintViolation =>
            {
                return Err(UserError::AlreadyExists(user.email.clone()));
            }
            Err(e) => return Err(e.into()),
        }
        info!(role = %user.role, "user created");
        fetch(&db, &user.email)?.ok_or_else(|| UserError::NotFound(user.email.clone()))
    }

    /// Look up a user by email, active or not.
    pub fn find(&self, email: &str) -> Result<Option<User>> {
        let db = self.conn()?;
        fetch(&db, email)
    }

    /// Every user, including deactivated ones, sorted by email.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY email"))?;
        let rows = stmt.query_map([], row_to_user)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Deactivated users keep their bookings but can no longer be booked.
    #[instrument(skip(self))]
    pub fn set_active(&self, email: &str, active: bool) -> Result<()> {
        self.update(
            email,
            "UPDATE users SET active = ?2, updated_at = ?3 WHERE email = ?1",
            active as i64,
        )
    }

    #[instrument(skip(self))]
    pub fn set_role(&self, email: &str, role: UserRole) -> Result<()> {
        self.update(
            email,
            "UPDATE users SET role = ?2, updated_at = ?3 WHERE email = ?1",
            role.to_string(),
        )
    }

    pub fn update_prefs(&self, email: &str, prefs: &NotificationPrefs) -> Result<()> {
        let db = self.conn()?;
        let n = db.execute(
            "UPDATE users SET
                email_notifications = ?2, email_on_booking = ?3, email_24h = ?4, email_1h = ?5,
                sms_notifications = ?6, sms_on_booking = ?7, sms_24h = ?8, sms_1h = ?9,
                updated_at = ?10
             WHERE email = ?1",
            params![
                email.to_lowercase(),
                prefs.email_notifications as i64,
                prefs.email_on_booking as i64,
                prefs.email_24h as i64,
                prefs.email_1h as i64,
                prefs.sms_notifications as i64,
                prefs.sms_on_booking as i64,
                prefs.sms_24h as i64,
                prefs.sms_1h as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;
        if n == 0 {
            return Err(UserError::NotFound(email.to_string()));
        }
        Ok(())
    }

    /// Make sure the configured admin account exists.
    ///
    /// An existing row is left as is (an operator may have changed its name or
    /// preferences); only a missing one is created.
    pub fn ensure_admin(&self, cfg: &AdminConfig) -> Result<User> {
        if let Some(existing) = self.find(&cfg.email)? {
            return Ok(existing);
        }
        let admin = User::new(&cfg.email, &cfg.name, &cfg.phone, UserRole::Admin)
            .map_err(|e| UserError::Invalid(e.to_string()))?;
        info!(email = %admin.email, "seeding admin account");
        self.create_user(&admin)
    }

    fn update(&self, email: &str, sql: &str, value: impl rusqlite::ToSql) -> Result<()> {
        let db = self.conn()?;
        let n = db.execute(
            sql,
            params![email.to_lowercase(), value, Utc::now().to_rfc3339()],
        )?;
        if n == 0 {
            return Err(UserError::NotFound(email.to_string()));
        }
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        // A panic while holding the lock cannot leave SQLite half-written,
        // so the connection is still usable.
        Ok(self.db.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

impl UserDirectory for SqliteUserDirectory {
    fn get_user(&self, email: &str) -> dienstplan_core::Result<Option<User>> {
        Ok(self.find(email)?)
    }

    fn list_active_users(&self) -> dienstplan_core::Result<Vec<User>> {
        let db = self.conn()?;
        let mut stmt = db
            .prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE active = 1 ORDER BY email"
            ))
            .map_err(UserError::from)?;
        let rows = stmt.query_map([], row_to_user).map_err(UserError::from)?;
        Ok(rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(UserError::from)?)
    }
}

fn fetch(conn: &Connection, email: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email.trim().to_lowercase()],
            row_to_user,
        )
        .optional()?)
}
