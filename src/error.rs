use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failure returned by an external collaborator (GitHub or an LLM provider).
///
/// Every variant is inspected by [`crate::rate_limit::RateLimitPolicy`] before any other
/// handling, so the text of each variant keeps the status code and provider message intact.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("rate limited{}: {message}", reset_suffix(.reset_at))]
    RateLimited {
        reset_at: Option<DateTime<Utc>>,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("{0}")]
    Other(String),
}

fn reset_suffix(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(at) => format!(" until {}", at.to_rfc3339()),
        None => String::new(),
    }
}

impl From<octocrab::Error> for ApiError {
    fn from(e: octocrab::Error) -> Self {
        match e {
            octocrab::Error::GitHub { source, .. } => ApiError::Status {
                status: source.status_code.as_u16(),
                message: source.message.clone(),
            },
            other => ApiError::Transport(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ApiError::Status {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None if e.is_decode() => ApiError::Malformed(e.to_string()),
            None => ApiError::Transport(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Malformed(e.to_string())
    }
}
