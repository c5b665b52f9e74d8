//! Shared HTTP client construction policy.
//!
//! Source, payload and sink clients all go through [`build_http_client`] so
//! they agree on timeouts, compression and user-agent handling.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (2 minutes; payloads can be tens of MiB).
pub const READ_TIMEOUT_SECS: u64 = 120;

/// Timeout settings for one HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Connection establishment timeout.
    pub connect: Duration,
    /// Whole-request timeout including body transfer.
    pub read: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read: Duration::from_secs(READ_TIMEOUT_SECS),
        }
    }
}

/// Builds a reqwest client with the shared policy.
///
/// `purpose` is only used for logging.
///
/// # Errors
///
/// Returns the underlying [`reqwest::Error`] if the TLS backend or
/// system configuration cannot be initialized.
pub(crate) fn build_http_client(
    purpose: &str,
    user_agent: &str,
    timeouts: HttpTimeouts,
) -> Result<Client, reqwest::Error> {
    debug!(
        purpose,
        connect_secs = timeouts.connect.as_secs(),
        read_secs = timeouts.read.as_secs(),
        "building HTTP client"
    );
    Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.read)
        .gzip(true)
        .user_agent(user_agent)
        .build()
}
