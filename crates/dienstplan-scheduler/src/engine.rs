use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use dienstplan_bookings::{Booking, BookingStore};
use dienstplan_core::config::SchedulerConfig;
use dienstplan_core::{Clock, UserDirectory};
use dienstplan_engine::{requests_for, SchedulingEngine};
use dienstplan_notify::{Channel, Dispatcher, NotificationRequest, TemplateKind};
use rusqlite::Connection;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::ledger::ReminderLedger;
use crate::schedule::DailyAt;
use crate::types::{DailyJob, LeadTime, ScanOutcome, ScanReport, TickReport};

/// Days per month when computing the archive cutoff.
const ARCHIVE_DAYS_PER_MONTH: i64 = 30;

/// Parsed `[scheduler]` settings.
#[derive(Debug, Clone)]
pub struct ReminderSettings {
    pub tick: std::time::Duration,
    /// `None` runs the 24h scan on every tick.
    pub reminder_24h_at: Option<DailyAt>,
    pub alarm_at: DailyAt,
    pub alarm_horizon_days: u32,
    /// `None` disables the digest (and with it the archive job).
    pub digest_at: Option<DailyAt>,
    pub archive_after_months: u32,
    pub backup_recipients: Vec<String>,
}

impl ReminderSettings {
    pub fn from_config(cfg: &SchedulerConfig) -> Result<Self> {
        Ok(Self {
            tick: std::time::Duration::from_secs(cfg.tick_secs.max(1)),
            reminder_24h_at: cfg
                .reminder_24h_at
                .as_deref()
                .map(str::parse::<DailyAt>)
                .transpose()?,
            alarm_at: cfg.alarm_at.parse::<DailyAt>()?,
            alarm_horizon_days: cfg.alarm_horizon_days,
            digest_at: if cfg.digest_enabled {
                Some(cfg.digest_at.parse::<DailyAt>()?)
            } else {
                None
            },
            archive_after_months: cfg.archive_after_months,
            backup_recipients: cfg
                .backup_recipients
                .iter()
                .map(|r| r.trim().to_lowercase())
                .filter(|r| !r.is_empty())
                .collect(),
        })
    }
}

/// Time-driven job runner: reminders, free-slot alarm and the daily digest.
///
/// Every scan is independent. One failing never prevents the others, and a
/// failed scan is simply attempted again on the next tick.
pub struct ReminderScheduler {
    engine: Arc<SchedulingEngine>,
    store: Arc<BookingStore>,
    users: Arc<dyn UserDirectory>,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    ledger: ReminderLedger,
    settings: ReminderSettings,
}

impl ReminderScheduler {
    /// Create the scheduler. `conn` holds the reminder ledger and is owned
    /// exclusively by the scheduler.
    pub fn new(
        conn: Connection,
        engine: Arc<SchedulingEngine>,
        store: Arc<BookingStore>,
        users: Arc<dyn UserDirectory>,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
        settings: ReminderSettings,
    ) -> Result<Self> {
        Ok(Self {
            engine,
            store,
            users,
            dispatcher,
            clock,
            ledger: ReminderLedger::new(conn)?,
            settings,
        })
    }

    pub fn ledger(&self) -> &ReminderLedger {
        &self.ledger
    }

    /// Main loop. Ticks every `settings.tick` until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let local = self.clock.local_now();
        info!(
            tick_secs = self.settings.tick.as_secs(),
            gateway = self.dispatcher.gateway_name(),
            next_alarm = ?self.settings.alarm_at.next_after(&local),
            next_digest = ?self.settings.digest_at.and_then(|d| d.next_after(&local)),
            "reminder scheduler started"
        );

        let mut interval = tokio::time::interval(self.settings.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick().await;
                    if report.sent() > 0 {
                        info!(?report, "scheduler tick");
                    } else {
                        debug!(?report, "scheduler tick");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("reminder scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run every scan that is due right now.
    pub async fn tick(&self) -> TickReport {
        let local = self.clock.local_now();
        let today = local.date_naive();

        let reminders_24h = match self.settings.reminder_24h_at {
            Some(at) if !at.is_due(&local) => ScanOutcome::NotDue,
            _ => outcome("reminders_24h", self.scan_24h(today).await),
        };
        let reminders_1h = outcome("reminders_1h", self.scan_1h(today).await);

        let free_slots_alarm = if self.settings.alarm_at.is_due(&local) {
            self.daily(DailyJob::FreeSlotsAlarm, today).await
        } else {
            ScanOutcome::NotDue
        };
        let digest = match self.settings.digest_at {
            Some(at) if at.is_due(&local) => self.daily(DailyJob::Digest, today).await,
            _ => ScanOutcome::NotDue,
        };

        TickReport {
            reminders_24h,
            reminders_1h,
            free_slots_alarm,
            digest,
        }
    }

    // ── scans ───────────────────────────────────────────────────────────────

    /// Confirmed bookings for tomorrow.
    async fn scan_24h(&self, today: NaiveDate) -> Result<ScanReport> {
        let tomorrow = today + Duration::days(1);
        let bookings = self.store.list_bookings_in_range(tomorrow, tomorrow)?;
        self.remind(LeadTime::Hours24, bookings).await
    }

    /// Confirmed bookings whose shift starts within the next hour.
    async fn scan_1h(&self, today: NaiveDate) -> Result<ScanReport> {
        let now = self.clock.now();
        let horizon = now + Duration::hours(1);
        let tz = self.clock.timezone();
        let due: Vec<Booking> = self
            .store
            .list_bookings_in_range(today, today + Duration::days(1))?
            .into_iter()
            .filter(|b| {
                tz.from_local_datetime(&b.slot_date.and_time(b.slot_time_range.start()))
                    .earliest()
                    .map(|start| start.with_timezone(&Utc))
                    .is_some_and(|start| start > now && start <= horizon)
            })
            .collect();
        self.remind(LeadTime::Hours1, due).await
    }

    async fn remind(&self, lead: LeadTime, bookings: Vec<Booking>) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        for booking in bookings {
            let holder = match self.users.get_user(&booking.user_email) {
                Ok(holder) => holder,
                Err(e) => {
                    // Left unclaimed, so the next tick retries it.
                    warn!(booking_id = %booking.id, error = %e, "holder lookup failed");
                    continue;
                }
            };
            let requests = requests_for(lead.notice(), &booking, holder.as_ref());
            if requests.is_empty() {
                continue;
            }
            if !self
                .ledger
                .claim(&booking.id, lead, &booking.user_email, self.clock.now())?
            {
                report.already_sent += 1;
                continue;
            }

            let deliveries = self.dispatcher.deliver_all(&requests).await;
            let mut one = ScanReport::default();
            one.absorb(&deliveries);
            if let Err(e) = self.ledger.record_outcome(
                &booking.id,
                lead,
                &booking.user_email,
                one.sent,
                one.failed,
            ) {
                warn!(booking_id = %booking.id, error = %e, "could not record reminder outcome");
            }
            report.sent += one.sent;
            report.failed += one.failed;
        }
        Ok(report)
    }

    /// Run a once-a-day job unless it already completed today.
    async fn daily(&self, job: DailyJob, today: NaiveDate) -> ScanOutcome {
        match self.ledger.daily_ran(job, today) {
            Ok(true) => return ScanOutcome::NotDue,
            Ok(false) => {}
            Err(e) => return outcome(job.as_str(), Err(e)),
        }
        let result = match job {
            DailyJob::FreeSlotsAlarm => self.free_slots_alarm(today).await,
            DailyJob::Digest => self.digest(today).await,
        };
        if result.is_ok() {
            if let Err(e) = self.ledger.mark_daily(job, today, self.clock.now()) {
                warn!(job = job.as_str(), error = %e, "could not record daily run");
            }
        }
        outcome(job.as_str(), result)
    }

    /// Email every active admin the list of free slots in the coming days.
    async fn free_slots_alarm(&self, today: NaiveDate) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        let free = self
            .engine
            .free_slots(today + Duration::days(1), self.settings.alarm_horizon_days)?;
        if free.is_empty() {
            return Ok(report);
        }

        let listing = free
            .iter()
            .map(|s| format!("{} {} {}", s.date, s.label, s.time))
            .collect::<Vec<_>>()
            .join("\n");
        let requests: Vec<NotificationRequest> = self
            .users
            .list_active_admins()?
            .into_iter()
            .map(|admin| {
                NotificationRequest::new(Channel::Email, admin.email, TemplateKind::FreeSlotsAlarm)
                    .with("name", admin.name)
                    .with("slot_count", free.len().to_string())
                    .with("slots", listing.as_str())
            })
            .collect();
        if requests.is_empty() {
            warn!(free = free.len(), "free slots but no active admin to alert");
        }
        report.absorb(&self.dispatcher.deliver_all(&requests).await);
        Ok(report)
    }

    /// Archive old bookings, then send a snapshot of the rest.
    async fn digest(&self, today: NaiveDate) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        let cutoff = today
            - Duration::days(ARCHIVE_DAYS_PER_MONTH * i64::from(self.settings.archive_after_months));
        let archived = self.store.archive_before(cutoff)?;

        let bookings = self.store.all_bookings()?;
        let snapshot = serde_json::to_string(&bookings)?;

        let mut recipients: BTreeSet<String> =
            self.settings.backup_recipients.iter().cloned().collect();
        recipients.extend(self.users.list_active_admins()?.into_iter().map(|a| a.email));

        let requests: Vec<NotificationRequest> = recipients
            .into_iter()
            .map(|to| {
                NotificationRequest::new(Channel::Email, to, TemplateKind::BookingSnapshot)
                    .with("snapshot_date", today.to_string())
                    .with("booking_count", bookings.len().to_string())
                    .with("archived_count", archived.to_string())
                    .with("snapshot", snapshot.as_str())
            })
            .collect();
        report.absorb(&self.dispatcher.deliver_all(&requests).await);
        info!(archived, bookings = bookings.len(), "daily digest done");
        Ok(report)
    }
}

fn outcome(scan: &str, result: Result<ScanReport>) -> ScanOutcome {
    match result {
        Ok(report) => ScanOutcome::Ran(report),
        Err(e) => {
            error!(scan, error = %e, "scan failed");
            ScanOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}
