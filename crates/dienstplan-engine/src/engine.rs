use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use dienstplan_bookings::{AuditEntry, Booking, BookingStore, StoreError};
use dienstplan_calendar::{
    horizon_end, week_start, CalendarRules, ConcreteSlot, TimeRange, MAX_HORIZON_DAYS,
};
use dienstplan_core::{Clock, User, UserDirectory};
use dienstplan_notify::Dispatcher;
use dienstplan_users::{Permission, PermissionCheck, PermissionChecker};
use tracing::{info, instrument, warn};

use crate::error::{BookingError, CancelError, QueryError, RebookError};
use crate::notices::{requests_for, Notice};
use crate::types::{Notified, Overridden, SlotView, Stats};

/// Days covered by the "free slots" figure in [`SchedulingEngine::stats`].
const STATS_FREE_SLOT_DAYS: u32 = 28;

/// Booking rules on top of the calendar, the store and the user directory.
///
/// Holds no state of its own; every answer is derived from its collaborators,
/// which are injected at construction.
pub struct SchedulingEngine {
    store: Arc<BookingStore>,
    users: Arc<dyn UserDirectory>,
    calendar: Arc<CalendarRules>,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
}

impl SchedulingEngine {
    pub fn new(
        store: Arc<BookingStore>,
        users: Arc<dyn UserDirectory>,
        calendar: Arc<CalendarRules>,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            users,
            calendar,
            dispatcher,
            clock,
        }
    }

    pub fn calendar(&self) -> &CalendarRules {
        &self.calendar
    }

    // ── bookings ────────────────────────────────────────────────────────────

    /// Book `user` onto the slot.
    ///
    /// Blocked dates are refused for everyone. When the slot is taken a
    /// regular user gets `SlotTaken`; an admin gets `SlotTakenByOther` with
    /// the booking id needed for [`Self::override_booking`].
    #[instrument(skip(self, user), fields(user = %user.email))]
    pub fn book(
        &self,
        user: &User,
        slot_date: NaiveDate,
        slot_time: TimeRange,
    ) -> Result<Booking, BookingError> {
        self.book_as(user, user, slot_date, slot_time)
    }

    /// Admin books a slot on behalf of `target`.
    #[instrument(skip(self, actor, target), fields(actor = %actor.email, target = %target.email))]
    pub fn book_for(
        &self,
        actor: &User,
        target: &User,
        slot_date: NaiveDate,
        slot_time: TimeRange,
    ) -> Result<Booking, BookingError> {
        require(actor, Permission::BookForOthers).map_err(BookingError::Forbidden)?;
        self.book_as(actor, target, slot_date, slot_time)
    }

    /// Replace the confirmed booking `existing_id` with one for `new_user`.
    ///
    /// Cancel and create happen in one transaction: on failure the original
    /// booking is still in place.
    #[instrument(skip(self, actor, new_user), fields(actor = %actor.email, new_user = %new_user.email))]
    pub fn override_booking(
        &self,
        actor: &User,
        existing_id: &str,
        new_user: &User,
    ) -> Result<Overridden, BookingError> {
        require(actor, Permission::Override).map_err(BookingError::Forbidden)?;
        if !new_user.active {
            return Err(BookingError::InactiveUser(new_user.email.clone()));
        }

        let existing = self
            .store
            .get_booking(existing_id)?
            .ok_or_else(|| BookingError::NotFound {
                id: existing_id.to_string(),
            })?;
        if !existing.is_confirmed() {
            return Err(BookingError::NotConfirmed {
                id: existing.id.clone(),
            });
        }
        if existing.is_held_by(&new_user.email) {
            return Err(BookingError::AlreadyOwnBooking {
                booking_id: existing.id.clone(),
            });
        }
        if let Some(reason) = self.calendar.block_reason(existing.slot_date) {
            return Err(BookingError::SlotBlocked {
                date: existing.slot_date,
                reason,
            });
        }

        let (replaced, booking) = self
            .store
            .replace_booking(existing_id, new_user, &actor.email)?;
        info!(replaced = %replaced.id, booking = %booking.id, "booking overridden");
        Ok(Overridden { replaced, booking })
    }

    /// Cancel a booking. Holders may cancel their own; admins any.
    #[instrument(skip(self, actor), fields(actor = %actor.email))]
    pub fn cancel(&self, actor: &User, booking_id: &str) -> Result<Booking, CancelError> {
        let booking = self
            .store
            .get_booking(booking_id)?
            .ok_or_else(|| CancelError::NotFound {
                id: booking_id.to_string(),
            })?;
        if booking.is_held_by(&actor.email) {
            require(actor, Permission::CancelOwn).map_err(CancelError::Forbidden)?;
        } else if !PermissionChecker::check(actor, Permission::CancelAny).is_allowed() {
            return Err(CancelError::NotOwner {
                id: booking.id.clone(),
            });
        }
        if !booking.is_confirmed() {
            return Err(CancelError::AlreadyCancelled {
                id: booking.id.clone(),
            });
        }
        Ok(self.store.cancel_booking(booking_id, &actor.email)?)
    }

    /// Hand a confirmed booking to `new_user`, keeping its id and creation time.
    #[instrument(skip(self, actor, new_user), fields(actor = %actor.email, new_user = %new_user.email))]
    pub fn rebook(
        &self,
        actor: &User,
        booking_id: &str,
        new_user: &User,
    ) -> Result<Booking, RebookError> {
        require(actor, Permission::Rebook).map_err(RebookError::Forbidden)?;
        if !new_user.active {
            return Err(RebookError::InactiveUser(new_user.email.clone()));
        }
        Ok(self.store.rebook(booking_id, new_user, &actor.email)?)
    }

    // ── notifying variants ──────────────────────────────────────────────────

    /// [`Self::book`] (or [`Self::book_for`] when `actor` is not `target`),
    /// then a confirmation to the holder per their preferences.
    pub async fn book_and_notify(
        &self,
        actor: &User,
        target: &User,
        slot_date: NaiveDate,
        slot_time: TimeRange,
    ) -> Result<Notified<Booking>, BookingError> {
        let booking = if actor.email.eq_ignore_ascii_case(&target.email) {
            self.book(target, slot_date, slot_time)?
        } else {
            self.book_for(actor, target, slot_date, slot_time)?
        };
        let requests = requests_for(Notice::Confirmation, &booking, Some(target));
        let deliveries = self.dispatcher.deliver_all(&requests).await;
        Ok(Notified {
            value: booking,
            deliveries,
        })
    }

    /// [`Self::cancel`], then a cancellation notice to the holder.
    pub async fn cancel_and_notify(
        &self,
        actor: &User,
        booking_id: &str,
    ) -> Result<Notified<Booking>, CancelError> {
        let booking = self.cancel(actor, booking_id)?;
        let holder = self.lookup_holder(&booking.user_email);
        let requests = requests_for(Notice::Cancellation, &booking, holder.as_ref());
        let deliveries = self.dispatcher.deliver_all(&requests).await;
        Ok(Notified {
            value: booking,
            deliveries,
        })
    }

    // ── views ───────────────────────────────────────────────────────────────

    /// Unblocked, unbooked slots with `from <= date < from + horizon_days`,
    /// chronological.
    ///
    /// The horizon is capped at [`MAX_HORIZON_DAYS`].
    pub fn free_slots(
        &self,
        from: NaiveDate,
        horizon_days: u32,
    ) -> Result<Vec<ConcreteSlot>, StoreError> {
        if horizon_days == 0 {
            return Ok(Vec::new());
        }
        if horizon_days > MAX_HORIZON_DAYS {
            warn!(horizon_days, max = MAX_HORIZON_DAYS, "free slot horizon capped");
        }
        let until = horizon_end(from, horizon_days.min(MAX_HORIZON_DAYS));
        let last = until.pred_opt().unwrap_or(until);
        let taken: HashSet<(NaiveDate, TimeRange)> = self
            .store
            .list_bookings_in_range(from, last)?
            .into_iter()
            .map(|b| (b.slot_date, b.slot_time_range))
            .collect();

        Ok(self
            .calendar
            .slots_between(from, until)
            .into_iter()
            .filter(|s| !s.blocked && !taken.contains(&(s.date, s.time)))
            .collect())
    }

    /// Dashboard figures as of `today`.
    pub fn stats(&self, today: NaiveDate) -> Stats {
        let month_start = today.with_day(1).unwrap_or(today);
        Stats {
            active_user_count: or_default(
                "active_user_count",
                self.users.list_active_users().map(|u| u.len() as u64),
            ),
            future_booking_count: or_default(
                "future_booking_count",
                self.store.count_confirmed_from(today),
            ),
            current_month_booking_count: or_default(
                "current_month_booking_count",
                self.store.count_confirmed_between(month_start, today),
            ),
            free_slots_next_4_weeks: or_default(
                "free_slots_next_4_weeks",
                self.free_slots(today, STATS_FREE_SLOT_DAYS),
            ),
        }
    }

    /// The user's confirmed bookings from today on.
    pub fn upcoming_for_user(&self, email: &str) -> Result<Vec<Booking>, StoreError> {
        self.store.list_bookings_for_user(email, true)
    }

    /// Every slot of the week containing `date`, with its booking.
    pub fn week_overview(&self, date: NaiveDate) -> Result<Vec<SlotView>, StoreError> {
        let monday = week_start(date);
        let bookings = self
            .store
            .list_bookings_in_range(monday, monday + Duration::days(6))?;
        Ok(self
            .calendar
            .enumerate_week(monday)
            .into_iter()
            .map(|slot| {
                let booking = bookings
                    .iter()
                    .find(|b| b.slot_date == slot.date && b.slot_time_range == slot.time)
                    .cloned();
                SlotView { slot, booking }
            })
            .collect())
    }

    pub fn audit_log(&self, actor: &User, limit: usize) -> Result<Vec<AuditEntry>, QueryError> {
        require(actor, Permission::ViewAudit).map_err(QueryError::Forbidden)?;
        Ok(self.store.audit_log(limit)?)
    }

    // ── internals ───────────────────────────────────────────────────────────

    fn book_as(
        &self,
        actor: &User,
        target: &User,
        slot_date: NaiveDate,
        slot_time: TimeRange,
    ) -> Result<Booking, BookingError> {
        if !target.active {
            return Err(BookingError::InactiveUser(target.email.clone()));
        }
        require(actor, Permission::BookOwn).map_err(BookingError::Forbidden)?;
        self.validate_slot(actor, slot_date, slot_time)?;

        match self.store.create_booking(slot_date, slot_time, target) {
            Ok(booking) => Ok(booking),
            Err(StoreError::SlotTaken { .. }) => {
                Err(self.classify_conflict(actor, target, slot_date, slot_time))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn validate_slot(
        &self,
        actor: &User,
        slot_date: NaiveDate,
        slot_time: TimeRange,
    ) -> Result<(), BookingError> {
        if self.calendar.template_for(slot_date, slot_time).is_none() {
            return Err(BookingError::InvalidSlot(format!(
                "no {slot_time} slot on {} {slot_date}",
                slot_date.weekday()
            )));
        }
        if let Some(reason) = self.calendar.block_reason(slot_date) {
            return Err(BookingError::SlotBlocked {
                date: slot_date,
                reason,
            });
        }
        if slot_date < self.clock.today()
            && !PermissionChecker::check(actor, Permission::BookPastDates).is_allowed()
        {
            return Err(BookingError::InvalidSlot(format!(
                "{slot_date} lies in the past"
            )));
        }
        Ok(())
    }

    /// Turn a storage-level conflict into the error the caller should see.
    fn classify_conflict(
        &self,
        actor: &User,
        target: &User,
        slot_date: NaiveDate,
        slot_time: TimeRange,
    ) -> BookingError {
        let taken = BookingError::SlotTaken {
            slot_date,
            slot_time,
        };
        match self.store.get_active_booking(slot_date, slot_time) {
            Ok(Some(existing)) if existing.is_held_by(&target.email) => {
                BookingError::AlreadyOwnBooking {
                    booking_id: existing.id,
                }
            }
            Ok(Some(existing))
                if PermissionChecker::check(actor, Permission::Override).is_allowed() =>
            {
                BookingError::SlotTakenByOther {
                    booking_id: existing.id,
                    holder: existing.user_email,
                }
            }
            Ok(_) => taken,
            Err(e) => {
                warn!(error = %e, "could not load conflicting booking");
                taken
            }
        }
    }

    fn lookup_holder(&self, email: &str) -> Option<User> {
        match self.users.get_user(email) {
            Ok(user) => user,
            Err(e) => {
                warn!(email, error = %e, "holder lookup failed");
                None
            }
        }
    }
}

fn require(actor: &User, permission: Permission) -> Result<(), String> {
    match PermissionChecker::check(actor, permission) {
        PermissionCheck::Allowed => Ok(()),
        PermissionCheck::Denied { reason } => Err(reason),
    }
}

fn or_default<T: Default, E: Display>(metric: &str, result: Result<T, E>) -> T {
    result.unwrap_or_else(|e| {
        warn!(metric, error = %e, "stats metric unavailable");
        T::default()
    })
}
