use dienstplan_core::DienstplanError;
use thiserror::Error;

/// User-layer errors. Kept separate from `DienstplanError` so callers can tell
/// "unknown user" apart from storage trouble.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("User already exists: {0}")]
    AlreadyExists(String),

    /// The acting account lacks the permission for a user-admin action.
    #[error("Not permitted: {0}")]
    Forbidden(String),

    #[error("Invalid user record: {0}")]
    Invalid(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
}

impl From<UserError> for DienstplanError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::Invalid(msg) => DienstplanError::Validation(msg),
            other => DienstplanError::Directory(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, UserError>;
