use thiserror::Error;

/// Errors surfaced by the remote API client. `Clone` so that callers
/// coalesced onto a single in-flight fetch can all observe the same failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("validation failed: {message}")]
    Validation { message: String },
    #[error("request failed with status {status}")]
    Request { status: u16, detail: Option<String> },
    #[error("network error: {message}")]
    Network { message: String },
    #[error("not found")]
    NotFound { detail: Option<String> },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        ApiError::Network {
            message: message.into(),
        }
    }

    /// Server-provided or client-side detail string, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Validation { message } => Some(message),
            ApiError::Request { detail, .. } | ApiError::NotFound { detail } => detail.as_deref(),
            ApiError::Network { message } => Some(message),
        }
    }
}
