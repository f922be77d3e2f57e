//! Error types for the outreach engine

use thiserror::Error;

/// Main error type for all outreach operations
#[derive(Error, Debug)]
pub enum OutreachError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lead store is not configured")]
    StoreNotConfigured,

    #[error("Lead store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Lead store rejected request: {0}")]
    Store(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Document generation failed: {0}")]
    Document(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Daily send cap reached: {0}")]
    CapExhausted(String),
}

impl OutreachError {
    /// Errors that abort a whole run before any lead is touched
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            OutreachError::Config(_)
                | OutreachError::StoreNotConfigured
                | OutreachError::StoreUnavailable(_)
                | OutreachError::Template(_)
        )
    }
}

/// Result type for outreach operations
pub type Result<T> = std::result::Result<T, OutreachError>;
