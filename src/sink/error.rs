//! Error types for sink adapters.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while sending to the sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error sending to {url}: {source}")]
    Network {
        /// The endpoint being called.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout sending to {url}")]
    Timeout {
        /// The endpoint being called.
        url: String,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// The endpoint being called.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Server-provided wait before retrying, if any (429 responses).
        retry_after: Option<Duration>,
    },

    /// The sink rejected the credentials (401/403).
    #[error("sink rejected credentials (HTTP {status}) for {url}")]
    Unauthorized {
        /// The endpoint being called.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The message could not be encoded.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// The response body could not be decoded.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// The endpoint being called.
        url: String,
        /// Decoder error description.
        message: String,
    },

    /// HTTP client or request construction failed.
    #[error("failed to build HTTP request: {0}")]
    Client(#[source] reqwest::Error),
}

impl SinkError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error, or [`SinkError::Unauthorized`] for 401/403.
    pub fn http_status(url: impl Into<String>, status: u16, retry_after: Option<Duration>) -> Self {
        if matches!(status, 401 | 403) {
            return Self::Unauthorized {
                url: url.into(),
                status,
            };
        }
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Server-provided retry delay, if this error carries one.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::HttpStatus { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_statuses_promote_to_unauthorized() {
        assert!(matches!(
            SinkError::http_status("u", 401, None),
            SinkError::Unauthorized { status: 401, .. }
        ));
        assert!(matches!(
            SinkError::http_status("u", 403, None),
            SinkError::Unauthorized { status: 403, .. }
        ));
    }

    #[test]
    fn test_retry_after_only_on_http_status() {
        let error = SinkError::http_status("u", 429, Some(Duration::from_secs(2)));
        assert_eq!(error.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(SinkError::Timeout { url: "u".into() }.retry_after(), None);
    }
}
