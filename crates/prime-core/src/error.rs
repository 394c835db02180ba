//! Error Types

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistent store failed (query, insert, update)
    #[error("Store error: {0}")]
    Store(String),

    /// Object storage failed to issue a signed URL
    #[error("Object storage error: {0}")]
    ObjectStorage(String),

    /// Session lookup against the auth provider failed
    #[error("Session error: {0}")]
    Session(String),

    /// Notification or email delivery failed
    #[error("Notification error: {0}")]
    Notification(String),

    /// Catalog model does not exist
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Caller may not download the model
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Cart persistence failed
    #[error("Cart storage error: {0}")]
    CartStorage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::ObjectStorage(_) | Self::Notification(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::ModelNotFound(_) => "Model not found".into(),
            Self::AccessDenied(msg) => msg.clone(),
            Self::Config(_) => "Service configuration error.".into(),
            _ => "Internal Server Error".into(),
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
