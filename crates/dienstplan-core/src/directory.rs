use crate::error::Result;
use crate::types::User;

/// Read-only view of the identity collaborator.
///
/// The core never writes users; the SQLite implementation in
/// `dienstplan-users` carries the admin-side mutations separately.
pub trait UserDirectory: Send + Sync {
    /// Look a user up by email (case-insensitive). `None` when unknown.
    fn get_user(&self, email: &str) -> Result<Option<User>>;

    /// All users with `active = true`, admins included.
    fn list_active_users(&self) -> Result<Vec<User>>;

    fn list_active_admins(&self) -> Result<Vec<User>> {
        Ok(self
            .list_active_users()?
            .into_iter()
            .filter(User::is_admin)
            .collect())
    }
}
