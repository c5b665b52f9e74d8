//! Shared User-Agent strings for payload and sink HTTP clients.
//!
//! The Reddit adapter sends the operator-configured user agent instead, since
//! Reddit's API rules require one that names the app and its owner.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/media-relay";

/// Default User-Agent for payload downloads.
#[must_use]
pub(crate) fn default_payload_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("media-relay/{version} (image-relay; +{PROJECT_UA_URL})")
}

/// Default User-Agent for sink requests.
///
/// Discord expects `DiscordBot (url, version)` for bot traffic.
#[must_use]
pub(crate) fn default_sink_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("DiscordBot ({PROJECT_UA_URL}, {version})")
}
