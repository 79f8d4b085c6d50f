//! `dienstplan-core`: configuration, shared types and collaborator contracts.

pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::DienstplanConfig;
pub use directory::UserDirectory;
pub use error::{DienstplanError, Result};
pub use types::{NotificationPrefs, User, UserRole};
