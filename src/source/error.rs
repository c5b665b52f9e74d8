//! Error types for content source adapters.

use thiserror::Error;

/// Errors that can occur while fetching candidates from a content source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The collection name is empty or contains characters the source rejects.
    #[error("invalid collection name '{name}'")]
    InvalidCollection {
        /// The rejected collection name.
        name: String,
    },

    /// Obtaining or refreshing an access token failed.
    #[error("authentication with {source_name} failed: {message}")]
    Auth {
        /// Source adapter name.
        source_name: &'static str,
        /// Human-readable failure description.
        message: String,
    },

    /// Network-level error (DNS, connect, TLS, timeout).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL being requested.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// The URL being requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Response body could not be decoded.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// The URL being requested.
        url: String,
        /// Decoder error description.
        message: String,
    },

    /// HTTP client construction failed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl SourceError {
    /// Creates an invalid collection error.
    pub fn invalid_collection(name: impl Into<String>) -> Self {
        Self::InvalidCollection { name: name.into() }
    }

    /// Creates an authentication error.
    pub fn auth(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Auth {
            source_name,
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            message: message.into(),
        }
    }
}
