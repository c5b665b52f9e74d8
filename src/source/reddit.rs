//! Reddit adapter - lists a subreddit's top posts via the OAuth API.
//!
//! Uses application-only OAuth (client credentials grant). The bearer token
//! is cached and refreshed shortly before it expires.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::http_client::{HttpTimeouts, build_http_client};

use super::{ContentItem, ContentSource, SourceError, TimeWindow, is_valid_collection};

/// Default token endpoint base URL.
const DEFAULT_AUTH_BASE_URL: &str = "https://www.reddit.com";

/// Default API base URL for authenticated requests.
const DEFAULT_API_BASE_URL: &str = "https://oauth.reddit.com";

/// Tokens are refreshed this long before their reported expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Reddit rejects listing limits above this.
const MAX_LISTING_LIMIT: u32 = 100;

// ==================== Reddit API Response Types ====================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct PostData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    is_self: bool,
}

impl PostData {
    fn into_item(self) -> Option<ContentItem> {
        let locator = self.url.filter(|url| !url.is_empty())?;
        Some(ContentItem {
            locator,
            title: self.title,
            author: self.author.unwrap_or_else(|| "[deleted]".to_string()),
            is_self_post: self.is_self,
        })
    }
}

// ==================== RedditSource ====================

/// Script-app credentials for the Reddit API.
#[derive(Clone)]
pub struct RedditCredentials {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// User agent required by Reddit's API rules.
    pub user_agent: String,
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// [`ContentSource`] backed by a subreddit's `top` listing.
pub struct RedditSource {
    client: Client,
    credentials: RedditCredentials,
    auth_base_url: String,
    api_base_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl RedditSource {
    /// Creates a source pointed at the public Reddit endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Client`] if HTTP client construction fails.
    pub fn new(credentials: RedditCredentials) -> Result<Self, SourceError> {
        Self::with_base_urls(credentials, DEFAULT_AUTH_BASE_URL, DEFAULT_API_BASE_URL)
    }

    /// Creates a source with custom endpoints (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Client`] if HTTP client construction fails.
    pub fn with_base_urls(
        credentials: RedditCredentials,
        auth_base_url: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let client = build_http_client("reddit", &credentials.user_agent, HttpTimeouts::default())
            .map_err(SourceError::Client)?;
        Ok(Self {
            client,
            credentials,
            auth_base_url: trim_base(auth_base_url.into()),
            api_base_url: trim_base(api_base_url.into()),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, SourceError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.value.clone());
        }

        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn request_token(&self) -> Result<CachedToken, SourceError> {
        let url = format!("{}/api/v1/access_token", self.auth_base_url);
        debug!(url = %url, "requesting reddit access token");

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| SourceError::network(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::auth(
                "reddit",
                format!("token endpoint returned HTTP {}", status.as_u16()),
            ));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SourceError::decode(&url, e.to_string()))?;
        let Some(value) = body.access_token.filter(|token| !token.is_empty()) else {
            let reason = body.error.unwrap_or_else(|| "no access_token in response".into());
            return Err(SourceError::auth("reddit", reason));
        };

        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));
        info!(expires_in_secs = lifetime.as_secs(), "obtained reddit access token");
        Ok(CachedToken {
            value,
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        })
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }
}

impl std::fmt::Debug for RedditSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditSource")
            .field("credentials", &self.credentials)
            .field("auth_base_url", &self.auth_base_url)
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ContentSource for RedditSource {
    fn name(&self) -> &'static str {
        "reddit"
    }

    #[instrument(skip(self), fields(source = "reddit"))]
    async fn fetch_top_items(
        &self,
        collection: &str,
        window: TimeWindow,
        limit: u32,
    ) -> Result<Vec<ContentItem>, SourceError> {
        validate_collection(collection)?;
        let limit = limit.clamp(1, MAX_LISTING_LIMIT);
        let token = self.access_token().await?;
        let url = format!("{}/r/{collection}/top", self.api_base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[
                ("t", window.as_str().to_string()),
                ("limit", limit.to_string()),
                ("raw_json", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| SourceError::network(&url, e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("reddit rejected cached token, it will be refreshed on the next fetch");
            self.invalidate_token().await;
            return Err(SourceError::auth("reddit", "listing request returned HTTP 401"));
        }
        if !status.is_success() {
            return Err(SourceError::http_status(&url, status.as_u16()));
        }

        let listing: Listing = response
            .json()
            .await
            .map_err(|e| SourceError::decode(&url, e.to_string()))?;
        let items: Vec<ContentItem> = listing
            .data
            .children
            .into_iter()
            .filter_map(|child| child.data.into_item())
            .collect();

        info!(collection, window = %window, count = items.len(), "fetched top items");
        Ok(items)
    }
}

fn trim_base(base: String) -> String {
    base.trim_end_matches('/').to_string()
}

fn validate_collection(name: &str) -> Result<(), SourceError> {
    if is_valid_collection(name) {
        Ok(())
    } else {
        Err(SourceError::invalid_collection(name))
    }
}
