#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Weekday};
use dienstplan_bookings::BookingStore;
use dienstplan_calendar::{CalendarRules, TimeRange, WeeklySlotTemplate};
use dienstplan_core::config::CalendarConfig;
use dienstplan_core::{Clock, DienstplanError, FixedClock, User, UserDirectory, UserRole};
use dienstplan_engine::SchedulingEngine;
use dienstplan_notify::{DeliveryError, Dispatcher, NotificationGateway, NotificationRequest};
use dienstplan_users::SqliteUserDirectory;
use rusqlite::Connection;

/// Gateway double: records every request, fails for listed recipients.
#[derive(Default)]
pub struct RecordingGateway {
    pub sent: Mutex<Vec<NotificationRequest>>,
    pub fail_for: Mutex<HashSet<String>>,
}

impl RecordingGateway {
    pub fn fail_for(&self, recipient: &str) {
        self.fail_for.lock().unwrap().insert(recipient.to_string());
    }

    pub fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, request: &NotificationRequest) -> Result<(), DeliveryError> {
        if self.fail_for.lock().unwrap().contains(&request.recipient) {
            return Err(DeliveryError::Unavailable("smtp down".to_string()));
        }
        self.sent.lock().unwrap().push(request.clone());
        Ok(())
    }
}

/// Directory double whose every lookup fails.
pub struct UnreachableDirectory;

impl UserDirectory for UnreachableDirectory {
    fn get_user(&self, _email: &str) -> dienstplan_core::Result<Option<User>> {
        Err(DienstplanError::Directory("user database offline".to_string()))
    }

    fn list_active_users(&self) -> dienstplan_core::Result<Vec<User>> {
        Err(DienstplanError::Directory("user database offline".to_string()))
    }
}

pub struct Harness {
    pub engine: Arc<SchedulingEngine>,
    pub store: Arc<BookingStore>,
    pub users: Arc<SqliteUserDirectory>,
    pub gateway: Arc<RecordingGateway>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    /// Engine over `rules`, with the clock at 10:00 Berlin time on `today`.
    pub fn new(rules: CalendarRules, today: NaiveDate) -> Self {
        let clock = Arc::new(FixedClock::at_local(chrono_tz::Europe::Berlin, today, 10, 0).unwrap());
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let store = Arc::new(
            BookingStore::new(Connection::open_in_memory().unwrap(), dyn_clock.clone()).unwrap(),
        );
        let users =
            Arc::new(SqliteUserDirectory::new(Connection::open_in_memory().unwrap()).unwrap());
        let gateway = Arc::new(RecordingGateway::default());
        let dispatcher = Dispatcher::new(gateway.clone(), Duration::from_secs(5));
        let directory: Arc<dyn UserDirectory> = users.clone();
        let engine = Arc::new(SchedulingEngine::new(
            store.clone(),
            directory,
            Arc::new(rules),
            dispatcher,
            dyn_clock,
        ));
        Self {
            engine,
            store,
            users,
            gateway,
            clock,
        }
    }

    /// A second engine over the same store and clock, reading users from
    /// `directory` instead.
    pub fn engine_with(&self, directory: Arc<dyn UserDirectory>) -> SchedulingEngine {
        let clock: Arc<dyn Clock> = self.clock.clone();
        SchedulingEngine::new(
            self.store.clone(),
            directory,
            Arc::new(CalendarRules::from_config(&CalendarConfig::default()).unwrap()),
            Dispatcher::new(self.gateway.clone(), Duration::from_secs(5)),
            clock,
        )
    }

    /// Default slot set and holiday table.
    pub fn standard(today: &str) -> Self {
        Self::new(
            CalendarRules::from_config(&CalendarConfig::default()).unwrap(),
            d(today),
        )
    }

    pub fn user(&self, email: &str, name: &str) -> User {
        self.add(email, name, "", UserRole::User)
    }

    pub fn admin(&self, email: &str) -> User {
        self.add(email, "Admin", "", UserRole::Admin)
    }

    pub fn add(&self, email: &str, name: &str, phone: &str, role: UserRole) -> User {
        let user = User::new(email, name, phone, role).unwrap();
        self.users.create_user(&user).unwrap()
    }
}

/// Thursday 17:00-20:00 as the only slot, 2025-12-25 as the only holiday.
pub fn thursday_rules() -> CalendarRules {
    CalendarRules::new(
        vec![WeeklySlotTemplate {
            id: 1,
            weekday: Weekday::Thu,
            label: "Donnerstag".to_string(),
            time: evening(),
        }],
        [d("2025-12-25")],
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
