//! Discord sink - posts embeds and notices to one text channel.
//!
//! Uses the REST API directly with a bot token; no gateway connection is
//! needed to create messages.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::http_client::{HttpTimeouts, build_http_client};
use crate::user_agent;

use super::retry::{RetryDecision, RetryPolicy, classify_error, parse_retry_after};
use super::{Attachment, PresentationUnit, Sink, SinkError};

/// Default Discord REST API base URL.
const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";

/// Embed accent colour (Discord's "pink").
pub const EMBED_COLOR: u32 = 0x00EB_459F;

const MAX_TITLE_CHARS: usize = 256;
const MAX_DESCRIPTION_CHARS: usize = 4096;
const MAX_CONTENT_CHARS: usize = 2000;

// ==================== Discord API Types ====================

#[derive(Debug, Serialize)]
struct CreateMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<AttachmentRef>,
    allowed_mentions: AllowedMentions,
}

/// Titles come from third parties; never let them ping anyone.
#[derive(Debug, Serialize, Default)]
struct AllowedMentions {
    parse: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    description: String,
    url: String,
    color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<EmbedImage>,
}

#[derive(Debug, Serialize)]
struct EmbedImage {
    url: String,
}

#[derive(Debug, Serialize)]
struct AttachmentRef {
    id: u32,
    filename: String,
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: Option<f64>,
}

enum MessageBody<'a> {
    Json(CreateMessage),
    Multipart {
        payload_json: String,
        attachment: &'a Attachment,
        upload_name: String,
    },
}

// ==================== DiscordSink ====================

/// [`Sink`] that posts to a single Discord channel.
pub struct DiscordSink {
    client: Client,
    token: String,
    channel_id: String,
    api_base_url: String,
    retry_policy: RetryPolicy,
}

impl DiscordSink {
    /// Creates a sink for `channel_id` authenticated with a bot `token`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Client`] if HTTP client construction fails.
    pub fn new(token: impl Into<String>, channel_id: impl Into<String>) -> Result<Self, SinkError> {
        Self::with_base_url(token, channel_id, DEFAULT_API_BASE_URL)
    }

    /// Creates a sink with a custom API base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Client`] if HTTP client construction fails.
    pub fn with_base_url(
        token: impl Into<String>,
        channel_id: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Result<Self, SinkError> {
        let client = build_http_client(
            "discord",
            &user_agent::default_sink_user_agent(),
            HttpTimeouts::default(),
        )
        .map_err(SinkError::Client)?;
        Ok(Self {
            client,
            token: token.into(),
            channel_id: channel_id.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Replaces the retry policy used for message sends.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Channel this sink posts to.
    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }

    fn messages_url(&self) -> String {
        format!("{}/channels/{}/messages", self.api_base_url, self.channel_id)
    }

    async fn post_message(&self, body: &MessageBody<'_>) -> Result<(), SinkError> {
        let url = self.messages_url();
        let mut attempt = 1;
        loop {
            let error = match self.post_once(&url, body).await {
                Ok(()) => return Ok(()),
                Err(error) => error,
            };
            match self
                .retry_policy
                .should_retry(classify_error(&error), attempt, error.retry_after())
            {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    warn!(
                        error = %error,
                        attempt,
                        delay_ms = delay.as_millis(),
                        "send failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next_attempt;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(reason = %reason, "not retrying send");
                    return Err(error);
                }
            }
        }
    }

    async fn post_once(&self, url: &str, body: &MessageBody<'_>) -> Result<(), SinkError> {
        let request = self.client.post(url).header(AUTHORIZATION, self.auth_header());
        let request = match body {
            MessageBody::Json(message) => request.json(message),
            MessageBody::Multipart {
                payload_json,
                attachment,
                upload_name,
            } => {
                let part = Part::bytes(attachment.bytes.clone())
                    .file_name(upload_name.clone())
                    .mime_str(content_type_for(upload_name))
                    .map_err(SinkError::Client)?;
                let form = Form::new()
                    .text("payload_json", payload_json.clone())
                    .part("files[0]", part);
                request.multipart(form)
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::network(url, e))?;
        ensure_success(url, response).await.map(drop)
    }
}

impl std::fmt::Debug for DiscordSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordSink")
            .field("channel_id", &self.channel_id)
            .field("api_base_url", &self.api_base_url)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Sink for DiscordSink {
    fn name(&self) -> &'static str {
        "discord"
    }

    #[instrument(skip(self), fields(sink = "discord"))]
    async fn ready(&self) -> Result<String, SinkError> {
        let url = format!("{}/users/@me", self.api_base_url);
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(|e| SinkError::network(&url, e))?;
        let response = ensure_success(&url, response).await?;
        let user: CurrentUser = response
            .json()
            .await
            .map_err(|e| SinkError::decode(&url, e.to_string()))?;
        info!(username = %user.username, "logged in to discord");
        Ok(user.username)
    }

    #[instrument(skip(self, unit), fields(sink = "discord", link = %unit.link, inline = unit.attachment.is_some()))]
    async fn send_presentation_unit(&self, unit: &PresentationUnit) -> Result<(), SinkError> {
        let body = match &unit.attachment {
            Some(attachment) => {
                let upload_name = upload_name(&attachment.name);
                let message = CreateMessage {
                    content: None,
                    embeds: vec![build_embed(
                        unit,
                        Some(format!("attachment://{upload_name}")),
                    )],
                    attachments: vec![AttachmentRef {
                        id: 0,
                        filename: upload_name.clone(),
                    }],
                    allowed_mentions: AllowedMentions::default(),
                };
                let payload_json = serde_json::to_string(&message).map_err(SinkError::Encode)?;
                MessageBody::Multipart {
                    payload_json,
                    attachment,
                    upload_name,
                }
            }
            None => MessageBody::Json(CreateMessage {
                content: None,
                embeds: vec![build_embed(unit, unit.remote_image.clone())],
                attachments: Vec::new(),
                allowed_mentions: AllowedMentions::default(),
            }),
        };

        self.post_message(&body).await?;
        debug!("presentation unit sent");
        Ok(())
    }

    #[instrument(skip(self, text), fields(sink = "discord"))]
    async fn send_notice(&self, text: &str) -> Result<(), SinkError> {
        let body = MessageBody::Json(CreateMessage {
            content: Some(truncate_chars(text, MAX_CONTENT_CHARS)),
            embeds: Vec::new(),
            attachments: Vec::new(),
            allowed_mentions: AllowedMentions::default(),
        });
        self.post_message(&body).await?;
        debug!("notice sent");
        Ok(())
    }
}

fn build_embed(unit: &PresentationUnit, image_url: Option<String>) -> Embed {
    Embed {
        title: truncate_chars(&unit.title, MAX_TITLE_CHARS),
        description: truncate_chars(&unit.body, MAX_DESCRIPTION_CHARS),
        url: unit.link.clone(),
        color: EMBED_COLOR,
        image: image_url.map(|url| EmbedImage { url }),
    }
}

async fn ensure_success(
    url: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, SinkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let header_hint = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.unwrap_or_default();
    let retry_after = header_hint.or_else(|| {
        serde_json::from_str::<RateLimitBody>(&body)
            .ok()
            .and_then(|b| b.retry_after)
            .and_then(|secs| parse_retry_after(&secs.to_string()))
    });
    debug!(status = status.as_u16(), body = %truncate_chars(&body, 200), "sink returned error status");
    Err(SinkError::http_status(url, status.as_u16(), retry_after))
}

/// Discord rewrites whitespace in attachment names, which would break
/// `attachment://` references, so normalize it up front.
fn upload_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

fn content_type_for(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    match lower.rsplit_once('.').map(|(_, ext)| ext) {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(max.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}
