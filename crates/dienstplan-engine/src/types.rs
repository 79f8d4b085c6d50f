use dienstplan_bookings::Booking;
use dienstplan_calendar::ConcreteSlot;
use dienstplan_notify::DeliveryReport;
use serde::Serialize;

/// Dashboard numbers. Each field falls back to zero/empty on its own when
/// storage fails, so one bad query never hides the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub active_user_count: u64,
    /// Confirmed bookings from today on.
    pub future_booking_count: u64,
    /// Confirmed bookings from the first of this month up to today.
    pub current_month_booking_count: u64,
    pub free_slots_next_4_weeks: Vec<ConcreteSlot>,
}

/// One slot of a week with its confirmed booking, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotView {
    pub slot: ConcreteSlot,
    pub booking: Option<Booking>,
}

impl SlotView {
    pub fn is_free(&self) -> bool {
        !self.slot.blocked && self.booking.is_none()
    }
}

/// Result of an admin override: the displaced booking and its replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overridden {
    pub replaced: Booking,
    pub booking: Booking,
}

/// A committed change plus the outcome of the notices sent about it.
///
/// Delivery failures are reported here and never undo `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notified<T> {
    pub value: T,
    pub deliveries: Vec<DeliveryReport>,
}

impl<T> Notified<T> {
    pub fn all_delivered(&self) -> bool {
        self.deliveries.iter().all(DeliveryReport::is_delivered)
    }
}
