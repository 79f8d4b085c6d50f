use thiserror::Error;

#[derive(Debug, Error)]
pub enum DienstplanError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("User directory error: {0}")]
    Directory(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DienstplanError {
    /// Short error code string, stable across releases for CLI/JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            DienstplanError::Config(_) => "CONFIG_ERROR",
            DienstplanError::Directory(_) => "DIRECTORY_ERROR",
            DienstplanError::Validation(_) => "VALIDATION_ERROR",
            DienstplanError::Serialization(_) => "SERIALIZATION_ERROR",
            DienstplanError::Io(_) => "IO_ERROR",
            DienstplanError::Timeout { .. } => "TIMEOUT",
            DienstplanError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, DienstplanError>;
