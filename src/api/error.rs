//! Error types for backend access.

use thiserror::Error;

/// Result type for backend operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors raised while talking to the slow query backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

impl ApiError {
    /// Create an API error from an HTTP status and message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Short text suitable for an error banner.
    pub fn banner(&self) -> String {
        match self {
            ApiError::Http(e) if e.is_connect() => "Backend unreachable".to_string(),
            ApiError::Http(e) if e.is_timeout() => "Backend request timed out".to_string(),
            ApiError::Api { status, message } if message.is_empty() => format!("HTTP {}", status),
            ApiError::Api { status, message } => format!("HTTP {}: {}", status, message),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_text() {
        assert_eq!(ApiError::api(500, "").banner(), "HTTP 500");
        assert_eq!(
            ApiError::api(404, "Explain not found").banner(),
            "HTTP 404: Explain not found"
        );
        assert_eq!(
            ApiError::config("bad URL").banner(),
            "Configuration error: bad URL"
        );
    }
}
