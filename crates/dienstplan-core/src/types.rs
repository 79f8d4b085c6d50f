use serde::{Deserialize, Serialize};
use std::fmt;

/// Role hierarchy: admin > user.
///
/// Admins may book on behalf of others, override, rebook and read the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Per-user delivery switches. The `*_notifications` flags are master
/// switches; the others select which events reach that channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPrefs {
    pub email_notifications: bool,
    pub email_on_booking: bool,
    pub email_24h: bool,
    pub email_1h: bool,
    pub sms_notifications: bool,
    pub sms_on_booking: bool,
    pub sms_24h: bool,
    pub sms_1h: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            email_notifications: true,
            email_on_booking: true,
            email_24h: true,
            email_1h: true,
            sms_notifications: false,
            sms_on_booking: false,
            sms_24h: false,
            sms_1h: false,
        }
    }
}

/// A volunteer or admin as supplied by the identity collaborator.
///
/// `email` is the unique key; bookings copy name and phone at booking time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub name: String,
    /// Empty when no phone is on file. Stored in E.164 form (`+49...`).
    pub phone: String,
    pub role: UserRole,
    pub active: bool,
    pub prefs: NotificationPrefs,
}

impl User {
    /// Build a user, rejecting records that would break lookups later on.
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        phone: impl Into<String>,
        role: UserRole,
    ) -> crate::error::Result<Self> {
        let email = email.into().trim().to_lowercase();
        let name = name.into().trim().to_string();
        let phone = phone.into().trim().to_string();
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(crate::error::DienstplanError::Validation(format!(
                "invalid email address: {email:?}"
            )));
        }
        if name.is_empty() {
            return Err(crate::error::DienstplanError::Validation(
                "user name must not be empty".to_string(),
            ));
        }
        if !phone.is_empty() && !phone.starts_with('+') {
            return Err(crate::error::DienstplanError::Validation(format!(
                "phone number must start with '+': {phone:?}"
            )));
        }
        Ok(Self {
            email,
            name,
            phone,
            role,
            active: true,
            prefs: NotificationPrefs::default(),
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn has_phone(&self) -> bool {
        !self.phone.is_empty()
    }
}
