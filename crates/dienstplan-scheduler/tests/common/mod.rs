#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Weekday};
use dienstplan_bookings::BookingStore;
use dienstplan_calendar::{CalendarRules, TimeRange, WeeklySlotTemplate};
use dienstplan_core::config::CalendarConfig;
use dienstplan_core::{Clock, FixedClock, User, UserDirectory, UserRole};
use dienstplan_engine::SchedulingEngine;
use dienstplan_notify::{
    DeliveryError, Dispatcher, NotificationGateway, NotificationRequest, TemplateKind,
};
use dienstplan_scheduler::{DailyAt, ReminderScheduler, ReminderSettings};
use dienstplan_users::SqliteUserDirectory;
use rusqlite::Connection;

const TZ: chrono_tz::Tz = chrono_tz::Europe::Berlin;

/// Gateway double: records every accepted request, fails for listed recipients.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<NotificationRequest>>,
    fail_for: Mutex<HashSet<String>>,
}

impl RecordingGateway {
    pub fn fail_for(&self, recipient: &str) {
        self.fail_for.lock().unwrap().insert(recipient.to_string());
    }

    pub fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_of(&self, kind: TemplateKind) -> Vec<NotificationRequest> {
        self.sent().into_iter().filter(|r| r.kind == kind).collect()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, request: &NotificationRequest) -> Result<(), DeliveryError> {
        if self.fail_for.lock().unwrap().contains(&request.recipient) {
            return Err(DeliveryError::Rejected("mailbox full".to_string()));
        }
        self.sent.lock().unwrap().push(request.clone());
        Ok(())
    }
}

pub struct Harness {
    pub scheduler: ReminderScheduler,
    pub engine: Arc<SchedulingEngine>,
    pub store: Arc<BookingStore>,
    pub users: Arc<SqliteUserDirectory>,
    pub gateway: Arc<RecordingGateway>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    /// Scheduler over `rules`, clock at 10:00 Berlin time on `today`.
    pub fn new(rules: CalendarRules, settings: ReminderSettings, today: &str) -> Self {
        Self::over(Connection::open_in_memory().unwrap(), rules, settings, today)
    }

    /// Default rules and settings, bookings kept in the database file at `path`.
    pub fn on_file(path: &str, today: &str) -> Self {
        let conn = Connection::open(path).unwrap();
        conn.busy_timeout(Duration::from_millis(50)).unwrap();
        Self::over(
            conn,
            CalendarRules::from_config(&CalendarConfig::default()).unwrap(),
            settings(),
            today,
        )
    }

    fn over(
        bookings: Connection,
        rules: CalendarRules,
        settings: ReminderSettings,
        today: &str,
    ) -> Self {
        let clock = Arc::new(FixedClock::at_local(TZ, d(today), 10, 0).unwrap());
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let store = Arc::new(BookingStore::new(bookings, dyn_clock.clone()).unwrap());
        let users =
            Arc::new(SqliteUserDirectory::new(Connection::open_in_memory().unwrap()).unwrap());
        let directory: Arc<dyn UserDirectory> = users.clone();
        let gateway = Arc::new(RecordingGateway::default());
        let dispatcher = Dispatcher::new(gateway.clone(), Duration::from_secs(5));
        let engine = Arc::new(SchedulingEngine::new(
            store.clone(),
            directory.clone(),
            Arc::new(rules),
            dispatcher.clone(),
            dyn_clock.clone(),
        ));
        let scheduler = ReminderScheduler::new(
            Connection::open_in_memory().unwrap(),
            engine.clone(),
            store.clone(),
            directory,
            dispatcher,
            dyn_clock,
            settings,
        )
        .unwrap();
        Self {
            scheduler,
            engine,
            store,
            users,
            gateway,
            clock,
        }
    }

    pub fn standard(today: &str) -> Self {
        Self::with_settings(settings(), today)
    }

    /// Default slot set and holiday table.
    pub fn with_settings(settings: ReminderSettings, today: &str) -> Self {
        Self::new(
            CalendarRules::from_config(&CalendarConfig::default()).unwrap(),
            settings,
            today,
        )
    }

    /// Move the clock to `hh:mm` Berlin time on `date`.
    pub fn at(&self, date: &str, hour: u32, minute: u32) {
        let local = FixedClock::at_local(TZ, d(date), hour, minute).unwrap();
        self.clock.set(local.now());
    }

    /// Regular volunteer with a phone on file and default preferences.
    pub fn user(&self, email: &str, name: &str) -> User {
        self.add(email, name, "+4917000000", UserRole::User)
    }

    pub fn admin(&self, email: &str) -> User {
        self.add(email, "Admin", "", UserRole::Admin)
    }

    pub fn add(&self, email: &str, name: &str, phone: &str, role: UserRole) -> User {
        let user = User::new(email, name, phone, role).unwrap();
        self.users.create_user(&user).unwrap()
    }
}

/// 24h scan from 18:00, alarm at 19:00, digest at 21:00.
pub fn settings() -> ReminderSettings {
    ReminderSettings {
        tick: Duration::from_secs(60),
        reminder_24h_at: DailyAt::new(18, 0),
        alarm_at: DailyAt::new(19, 0).unwrap(),
        alarm_horizon_days: 7,
        digest_at: DailyAt::new(21, 0),
        archive_after_months: 1,
        backup_recipients: vec!["backup@example.org".to_string()],
    }
}

/// Two Friday slots, afternoon and evening, no holidays.
pub fn double_friday_rules() -> CalendarRules {
    let slot = |id, label: &str, time| WeeklySlotTemplate {
        id,
        weekday: Weekday::Fri,
        label: label.to_string(),
        time,
    };
    CalendarRules::new(
        vec![
            slot(1, "Freitag Nachmittag", afternoon()),
            slot(2, "Freitag Abend", evening()),
        ],
        Vec::<NaiveDate>::new(),
        (6, 9),
    )
    .unwrap()
}

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn evening() -> TimeRange {
    "17:00-20:00".parse().unwrap()
}

pub fn afternoon() -> TimeRange {
    "14:00-17:00".parse().unwrap()
}
