pub mod db;
pub mod directory;
pub mod error;
pub mod permissions;

pub use directory::SqliteUserDirectory;
pub use error::{Result, UserError};
pub use permissions::{Permission, PermissionCheck, PermissionChecker};
