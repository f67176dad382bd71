use serde::Serialize;
use std::fmt;

/// Engine error types for better error handling and user feedback.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    /// Malformed reminder input (empty title, no recurrence days, bad time)
    Validation(String),
    /// An operation referenced an unknown reminder or notification id
    NotFound(String),
    /// A durable write failed; in-memory state was rolled back
    Storage(String),
    /// The platform notification channel failed (best-effort, logged only)
    Delivery(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Delivery(msg) => write!(f, "Delivery error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

// Conversion to String for UI-facing return types
impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        error.to_string()
    }
}

// Convenience constructors
impl AppError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn storage<S: Into<String>>(msg: S) -> Self {
        AppError::Storage(msg.into())
    }

    pub fn delivery<S: Into<String>>(msg: S) -> Self {
        AppError::Delivery(msg.into())
    }
}

/// Result type alias for engine operations
pub type AppResult<T> = Result<T, AppError>;
