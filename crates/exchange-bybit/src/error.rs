//! Error types for the Bybit integration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BybitError {
    /// Missing or unusable credentials/configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// HMAC signing failed.
    #[error("signing error: {0}")]
    Signing(String),

    /// Bybit returned a non-zero `retCode`.
    #[error("Bybit API error {ret_code}: {message}")]
    Api { ret_code: i64, message: String },

    /// HTTP-level failure (non-2xx status).
    #[error("HTTP error {status_code}: {message}")]
    Http { status_code: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimit { retry_after_secs: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timeout: {0}")]
    Timeout(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A well-formed response lacked the expected payload.
    #[error("missing data in response: {0}")]
    MissingData(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),
}

impl BybitError {
    pub fn api(ret_code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            ret_code,
            message: message.into(),
        }
    }

    pub fn http(status_code: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status_code,
            message: message.into(),
        }
    }

    /// True when a retry at a later time could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimit { .. } => true,
            Self::Http { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for BybitError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BybitError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BybitError>;
