use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Datelike;
use dienstplan_bookings::BookingStore;
use dienstplan_calendar::CalendarRules;
use dienstplan_core::{Clock, DienstplanConfig, SystemClock, User, UserDirectory};
use dienstplan_engine::SchedulingEngine;
use dienstplan_notify::{Dispatcher, LogGateway};
use dienstplan_scheduler::{ReminderScheduler, ReminderSettings};
use dienstplan_users::SqliteUserDirectory;
use rusqlite::Connection;
use tracing::{info, warn};

/// Every subsystem wired against one database file.
///
/// Each component holds its own connection; they share the file, not a handle.
pub struct App {
    pub config: DienstplanConfig,
    pub store: Arc<BookingStore>,
    pub users: Arc<SqliteUserDirectory>,
    pub engine: Arc<SchedulingEngine>,
    pub dispatcher: Dispatcher,
    pub clock: Arc<dyn Clock>,
    busy_timeout: Duration,
}

impl App {
    pub fn open(config: DienstplanConfig) -> anyhow::Result<Self> {
        let tz = config.calendar.tz()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(tz));
        let calendar = CalendarRules::from_config(&config.calendar)
            .context("invalid [calendar] section")?;
        let year = clock.today().year();
        if !calendar.covered_years().contains(&year) {
            warn!(year, "no holidays configured for the current year");
        }

        let db_path = config.database.path.clone();
        ensure_parent_dir(&db_path);
        info!(path = %db_path, "opening SQLite database");

        let busy_timeout = Duration::from_millis(config.storage.busy_timeout_ms);
        let db = Connection::open(&db_path)?;
        db.execute_batch("PRAGMA journal_mode=WAL;")?;

        // run all schema migrations (idempotent)
        dienstplan_bookings::db::init_db(&db)?;
        dienstplan_users::db::init_db(&db)?;
        dienstplan_scheduler::db::init_db(&db)?;
        info!("database migrations complete");

        let store = Arc::new(BookingStore::open(&db_path, busy_timeout, clock.clone())?);
        let users = Arc::new(SqliteUserDirectory::new(open_conn(&db_path, busy_timeout)?)?);
        let admin = users.ensure_admin(&config.admin)?;
        info!(email = %admin.email, "admin account ready");

        let dispatcher = Dispatcher::new(
            Arc::new(LogGateway),
            Duration::from_secs(config.notifications.send_timeout_secs),
        );
        let directory: Arc<dyn UserDirectory> = users.clone();
        let engine = Arc::new(SchedulingEngine::new(
            store.clone(),
            directory,
            Arc::new(calendar),
            dispatcher.clone(),
            clock.clone(),
        ));

        Ok(Self {
            config,
            store,
            users,
            engine,
            dispatcher,
            clock,
            busy_timeout,
        })
    }

    /// The reminder scheduler, on a connection of its own.
    pub fn scheduler(&self) -> anyhow::Result<ReminderScheduler> {
        let settings = ReminderSettings::from_config(&self.config.scheduler)?;
        let directory: Arc<dyn UserDirectory> = self.users.clone();
        Ok(ReminderScheduler::new(
            open_conn(&self.config.database.path, self.busy_timeout)?,
            self.engine.clone(),
            self.store.clone(),
            directory,
            self.dispatcher.clone(),
            self.clock.clone(),
            settings,
        )?)
    }

    /// Look up the acting user; defaults to the configured admin.
    pub fn actor(&self, email: Option<&str>) -> anyhow::Result<User> {
        let email = email.unwrap_or(&self.config.admin.email);
        self.user(email)
    }

    pub fn user(&self, email: &str) -> anyhow::Result<User> {
        self.users
            .find(email)?
            .with_context(|| format!("unknown user {email}"))
    }
}

fn open_conn(path: &str, busy_timeout: Duration) -> anyhow::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    Ok(conn)
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
