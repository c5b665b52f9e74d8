//! Sink boundary: where delivered items and notices end up.
//!
//! # Architecture
//!
//! - [`Sink`] - async trait the delivery pipeline consumes
//! - [`PresentationUnit`] - one item as shown to readers (title, author, link, image)
//! - [`DiscordSink`] - posts to a Discord text channel via the REST API
//! - [`RetryPolicy`] - backoff for rate-limited or transient sends

mod discord;
mod error;
mod retry;

pub use discord::{DiscordSink, EMBED_COLOR};
pub use error::SinkError;
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error,
    parse_retry_after,
};

use async_trait::async_trait;

use crate::source::ContentItem;

/// Bytes uploaded alongside a presentation unit.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name shown by the sink.
    pub name: String,
    /// Raw payload.
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One content item rendered for the sink.
///
/// Exactly one of `attachment` / `remote_image` is set: inline units carry
/// the payload, link-only units let the sink fetch the image itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationUnit {
    /// Item title.
    pub title: String,
    /// Body text (author line, plus the too-large marker for link-only units).
    pub body: String,
    /// Clickable source locator.
    pub link: String,
    /// Uploaded payload for inline delivery.
    pub attachment: Option<Attachment>,
    /// Image URL the sink renders by reference for link-only delivery.
    pub remote_image: Option<String>,
    /// True when the payload was too large to attach.
    pub too_large: bool,
}

impl PresentationUnit {
    /// Builds an inline unit that uploads `bytes` as `file_name`.
    #[must_use]
    pub fn inline(item: &ContentItem, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            title: item.title.clone(),
            body: author_line(&item.author),
            link: item.locator.clone(),
            attachment: Some(Attachment {
                name: file_name.into(),
                bytes,
            }),
            remote_image: None,
            too_large: false,
        }
    }

    /// Builds a link-only unit for a payload of `size` bytes that is too large to upload.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn link_only(item: &ContentItem, size: u64) -> Self {
        let mib = size as f64 / (1024.0 * 1024.0);
        Self {
            title: item.title.clone(),
            body: format!(
                "{}\n*File too large to attach ({mib:.1} MiB); showing remote image.*",
                author_line(&item.author)
            ),
            link: item.locator.clone(),
            attachment: None,
            remote_image: Some(item.locator.clone()),
            too_large: true,
        }
    }
}

fn author_line(author: &str) -> String {
    format!("**Author:** u/{author}")
}

/// Destination for delivered items and operator notices.
///
/// A sink is bound to a single destination at construction time.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Verifies credentials and returns the identity the sink posts as.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the sink is unreachable or rejects the credentials.
    async fn ready(&self) -> Result<String, SinkError>;

    /// Sends one presentation unit as a single message.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the send fails after any retries.
    async fn send_presentation_unit(&self, unit: &PresentationUnit) -> Result<(), SinkError>;

    /// Sends a plain-text notice.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the send fails after any retries.
    async fn send_notice(&self, text: &str) -> Result<(), SinkError>;
}
