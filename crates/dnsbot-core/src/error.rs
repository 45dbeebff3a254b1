//! Error types for the DNS bot
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for bot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DNS bot
#[derive(Error, Debug)]
pub enum Error {
    /// External IP resolver errors
    #[error("IP resolver error: {0}")]
    IpResolver(String),

    /// Messaging gateway errors (send/edit/delete/acknowledge)
    #[error("Messaging error: {0}")]
    Messaging(String),

    /// Session store errors
    #[error("Session store error: {0}")]
    SessionStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Record or zone not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A DDNS task for this domain is already running
    #[error("A DDNS task for {0} is already running")]
    DuplicateTask(String),

    /// Provider-specific error, with the HTTP status when the provider reported one
    #[error("{message}{}", .status.map(|s| format!(" (status: {s})")).unwrap_or_default())]
    Provider {
        /// Provider name
        provider: String,
        /// Human-readable reason
        message: String,
        /// HTTP status code, if any
        status: Option<u16>,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an IP resolver error
    pub fn ip_resolver(msg: impl Into<String>) -> Self {
        Self::IpResolver(msg.into())
    }

    /// Create a messaging error
    pub fn messaging(msg: impl Into<String>) -> Self {
        Self::Messaging(msg.into())
    }

    /// Create a session store error
    pub fn session_store(msg: impl Into<String>) -> Self {
        Self::SessionStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider error without a status code
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a provider error carrying the HTTP status the provider answered with
    pub fn provider_status(
        provider: impl Into<String>,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            status: Some(status),
        }
    }

    /// HTTP status code attached to a provider error
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => *status,
            _ => None,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_renders_status() {
        let err = Error::provider_status("cloudflare", "Record quota exceeded", 400);
        assert_eq!(err.to_string(), "Record quota exceeded (status: 400)");
        assert_eq!(err.status(), Some(400));

        let err = Error::provider("cloudflare", "Zone not found");
        assert_eq!(err.to_string(), "Zone not found");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn duplicate_task_names_domain() {
        let err = Error::DuplicateTask("home.example.com".to_string());
        assert!(err.to_string().contains("home.example.com"));
    }
}
