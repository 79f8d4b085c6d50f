//! Which notices a booking holder receives, and over which channels.

use dienstplan_bookings::Booking;
use dienstplan_core::{NotificationPrefs, User};
use dienstplan_notify::{Channel, NotificationRequest, TemplateKind};

/// Booking-related notice types that are gated by holder preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Confirmation,
    Cancellation,
    Reminder24h,
    Reminder1h,
}

impl Notice {
    pub fn template(&self) -> TemplateKind {
        match self {
            Notice::Confirmation => TemplateKind::BookingConfirmation,
            Notice::Cancellation => TemplateKind::Cancellation,
            Notice::Reminder24h => TemplateKind::Reminder24h,
            Notice::Reminder1h => TemplateKind::Reminder1h,
        }
    }

    pub fn is_reminder(&self) -> bool {
        matches!(self, Notice::Reminder24h | Notice::Reminder1h)
    }

    /// `(email, sms)` switches for this notice. Cancellations only look at the
    /// channel master switches.
    fn enabled(&self, p: &NotificationPrefs) -> (bool, bool) {
        let (email_flag, sms_flag) = match self {
            Notice::Confirmation => (p.email_on_booking, p.sms_on_booking),
            Notice::Cancellation => (true, true),
            Notice::Reminder24h => (p.email_24h, p.sms_24h),
            Notice::Reminder1h => (p.email_1h, p.sms_1h),
        };
        (
            p.email_notifications && email_flag,
            p.sms_notifications && sms_flag,
        )
    }
}

/// Requests for `notice` about `booking`.
///
/// `holder` is the directory record for the booking's holder. When it is
/// missing the only option left is an SMS to the phone stored on the booking.
pub fn requests_for(
    notice: Notice,
    booking: &Booking,
    holder: Option<&User>,
) -> Vec<NotificationRequest> {
    let mut out = Vec::new();
    let (email, sms, phone) = match holder {
        Some(user) => {
            let (email, sms) = notice.enabled(&user.prefs);
            let phone = if user.has_phone() {
                user.phone.as_str()
            } else {
                booking.user_phone.as_str()
            };
            (email, sms, phone)
        }
        None => (false, true, booking.user_phone.as_str()),
    };
    // Reminders only go to bookings with a phone number on file.
    if notice.is_reminder() && phone.is_empty() {
        return out;
    }

    if email {
        out.push(booking_request(notice, booking, Channel::Email, &booking.user_email));
    }
    if sms && !phone.is_empty() {
        out.push(booking_request(notice, booking, Channel::Sms, phone));
    }
    out
}

fn booking_request(
    notice: Notice,
    booking: &Booking,
    channel: Channel,
    recipient: &str,
) -> NotificationRequest {
    let req = NotificationRequest::new(channel, recipient, notice.template())
        .with("name", booking.user_name.as_str())
        .with("slot_date", booking.slot_date.to_string())
        .with("slot_time", booking.slot_time_range.to_string())
        .with("booking_id", booking.id.as_str());
    match notice {
        Notice::Reminder24h => req.with("hours_before", "24"),
        Notice::Reminder1h => req.with("hours_before", "1"),
        Notice::Confirmation | Notice::Cancellation => req,
    }
}
