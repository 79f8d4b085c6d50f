use dienstplan_core::User;

use crate::error::{Result, UserError};

/// Everything role-gated in the scheduling core. Adding a variant forces
/// `check()` to decide on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Book a free slot for oneself.
    BookOwn,
    /// Book a slot on behalf of another volunteer.
    BookForOthers,
    /// Book a date that already lies in the past (corrections).
    BookPastDates,
    CancelOwn,
    CancelAny,
    /// Reassign an existing booking to another volunteer.
    Rebook,
    /// Replace a confirmed booking held by someone else.
    Override,
    ViewAudit,
    ManageUsers,
}

/// Outcome of a permission check. Callers match on it instead of catching
/// errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionCheck {
    Allowed,
    Denied { reason: String },
}

impl PermissionCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PermissionCheck::Allowed)
    }
}

pub struct PermissionChecker;

impl PermissionChecker {
    /// Evaluate whether `user` may perform `permission`.
    ///
    /// Deactivated accounts are denied everything, admins included.
    pub fn check(user: &User, permission: Permission) -> PermissionCheck {
        if !user.active {
            return PermissionCheck::Denied {
                reason: format!("account {} is deactivated", user.email),
            };
        }
        if user.is_admin() {
            return PermissionCheck::Allowed;
        }

        match permission {
            Permission::BookOwn | Permission::CancelOwn => PermissionCheck::Allowed,
            Permission::BookForOthers
            | Permission::BookPastDates
            | Permission::CancelAny
            | Permission::Rebook
            | Permission::Override
            | Permission::ViewAudit
            | Permission::ManageUsers => PermissionCheck::Denied {
                reason: "admin role required".to_string(),
            },
        }
    }

    /// `check()` for callers that propagate with `?`.
    pub fn require(user: &User, permission: Permission) -> Result<()> {
        match Self::check(user, permission) {
            PermissionCheck::Allowed => Ok(()),
            PermissionCheck::Denied { reason } => Err(UserError::Forbidden(reason)),
        }
    }
}
