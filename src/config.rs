//! Startup configuration loaded from a JSON file.
//!
//! Configuration is read once at startup and is immutable for the life of
//! the process. Any missing or invalid value is fatal.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::delivery::{
    DEFAULT_DOWNLOAD_DIR, DeliverySettings, INLINE_SIZE_LIMIT, MAX_ITEMS_PER_CYCLE,
};
use crate::source::{DEFAULT_FETCH_LIMIT, RedditCredentials, TimeWindow};

/// Default config file path.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Default collection polled when none is configured.
pub const DEFAULT_SUBREDDIT: &str = "pics";

/// Default dedup file path.
pub const DEFAULT_SENT_FILE: &str = "sent_images.txt";

/// Default poll interval in hours.
pub const DEFAULT_POLL_INTERVAL_HOURS: f64 = 25.0;

/// Longest accepted poll interval (one year).
pub const MAX_POLL_INTERVAL_HOURS: f64 = 24.0 * 365.0;

/// Errors raised while loading or validating the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON or has the wrong shape.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A value is present but unusable.
    #[error("invalid config value for `{field}`: {message}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Discord channel id, accepted as a JSON string or number.
#[derive(Clone, Deserialize)]
#[serde(untagged)]
enum ChannelId {
    Number(u64),
    Text(String),
}

impl ChannelId {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Deserialize)]
struct RawConfig {
    token: String,
    reddit_client_id: String,
    reddit_client_secret: String,
    reddit_user_agent: String,
    channel_id: ChannelId,
    #[serde(default = "default_subreddit")]
    subreddit: String,
    #[serde(default = "default_poll_interval_hours")]
    poll_interval_hours: f64,
    #[serde(default = "default_sent_file")]
    sent_images_file: PathBuf,
    #[serde(default = "default_download_dir")]
    download_dir: PathBuf,
    #[serde(default = "default_max_items")]
    max_items_per_cycle: usize,
    #[serde(default = "default_fetch_limit")]
    fetch_limit: u32,
    #[serde(default)]
    time_window: TimeWindow,
}

fn default_subreddit() -> String {
    DEFAULT_SUBREDDIT.to_string()
}

fn default_poll_interval_hours() -> f64 {
    DEFAULT_POLL_INTERVAL_HOURS
}

fn default_sent_file() -> PathBuf {
    PathBuf::from(DEFAULT_SENT_FILE)
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DOWNLOAD_DIR)
}

fn default_max_items() -> usize {
    MAX_ITEMS_PER_CYCLE
}

fn default_fetch_limit() -> u32 {
    DEFAULT_FETCH_LIMIT
}

/// Validated relay configuration.
#[derive(Clone)]
pub struct RelayConfig {
    /// Discord bot token.
    pub token: String,
    /// Reddit script-app client id.
    pub reddit_client_id: String,
    /// Reddit script-app client secret.
    pub reddit_client_secret: String,
    /// User agent sent to Reddit.
    pub reddit_user_agent: String,
    /// Destination channel id (numeric string).
    pub channel_id: String,
    /// Collection polled each cycle.
    pub subreddit: String,
    /// Hours between cycle starts.
    pub poll_interval_hours: f64,
    /// Dedup file path.
    pub sent_images_file: PathBuf,
    /// Temp payload directory.
    pub download_dir: PathBuf,
    /// Per-cycle delivery cap.
    pub max_items_per_cycle: usize,
    /// Candidates requested per fetch.
    pub fetch_limit: u32,
    /// Ranking window.
    pub time_window: TimeWindow,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("token", &"<redacted>")
            .field("reddit_client_id", &self.reddit_client_id)
            .field("reddit_client_secret", &"<redacted>")
            .field("reddit_user_agent", &self.reddit_user_agent)
            .field("channel_id", &self.channel_id)
            .field("subreddit", &self.subreddit)
            .field("poll_interval_hours", &self.poll_interval_hours)
            .field("sent_images_file", &self.sent_images_file)
            .field("download_dir", &self.download_dir)
            .field("max_items_per_cycle", &self.max_items_per_cycle)
            .field("fetch_limit", &self.fetch_limit)
            .field("time_window", &self.time_window)
            .finish()
    }
}

impl RelayConfig {
    /// Reads and validates the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, malformed, or holds an
    /// invalid value.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parses and validates config JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        let config = Self {
            token: raw.token.trim().to_string(),
            reddit_client_id: raw.reddit_client_id.trim().to_string(),
            reddit_client_secret: raw.reddit_client_secret.trim().to_string(),
            reddit_user_agent: raw.reddit_user_agent.trim().to_string(),
            channel_id: raw.channel_id.into_string(),
            subreddit: raw.subreddit.trim().to_string(),
            poll_interval_hours: raw.poll_interval_hours,
            sent_images_file: raw.sent_images_file,
            download_dir: raw.download_dir,
            max_items_per_cycle: raw.max_items_per_cycle,
            fetch_limit: raw.fetch_limit,
            time_window: raw.time_window,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks every value against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("token", &self.token)?;
        require_non_empty("reddit_client_id", &self.reddit_client_id)?;
        require_non_empty("reddit_client_secret", &self.reddit_client_secret)?;
        require_non_empty("reddit_user_agent", &self.reddit_user_agent)?;

        if self.channel_id.is_empty() || !self.channel_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::invalid(
                "channel_id",
                format!("'{}' is not a numeric channel id", self.channel_id),
            ));
        }

        if !crate::source::is_valid_collection(&self.subreddit) {
            return Err(ConfigError::invalid(
                "subreddit",
                format!(
                    "'{}' must be 1-50 letters, digits or underscores",
                    self.subreddit
                ),
            ));
        }

        if !self.poll_interval_hours.is_finite()
            || self.poll_interval_hours <= 0.0
            || self.poll_interval_hours > MAX_POLL_INTERVAL_HOURS
        {
            return Err(ConfigError::invalid(
                "poll_interval_hours",
                format!(
                    "{}. Expected a positive number of hours up to {MAX_POLL_INTERVAL_HOURS}",
                    self.poll_interval_hours
                ),
            ));
        }

        if !(1..=100).contains(&self.max_items_per_cycle) {
            return Err(ConfigError::invalid(
                "max_items_per_cycle",
                format!("{}. Expected range: 1..=100", self.max_items_per_cycle),
            ));
        }

        if !(1..=100).contains(&self.fetch_limit) {
            return Err(ConfigError::invalid(
                "fetch_limit",
                format!("{}. Expected range: 1..=100", self.fetch_limit),
            ));
        }

        if self.sent_images_file.as_os_str().is_empty() {
            return Err(ConfigError::invalid("sent_images_file", "must not be empty"));
        }
        if self.download_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("download_dir", "must not be empty"));
        }

        Ok(())
    }

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_hours * 3600.0)
    }

    /// Pipeline settings derived from this config.
    #[must_use]
    pub fn delivery_settings(&self) -> DeliverySettings {
        DeliverySettings {
            collection: self.subreddit.clone(),
            window: self.time_window,
            fetch_limit: self.fetch_limit,
            max_items_per_cycle: self.max_items_per_cycle,
            inline_size_limit: INLINE_SIZE_LIMIT,
            download_dir: self.download_dir.clone(),
        }
    }

    /// Reddit credentials derived from this config.
    #[must_use]
    pub fn reddit_credentials(&self) -> RedditCredentials {
        RedditCredentials {
            client_id: self.reddit_client_id.clone(),
            client_secret: self.reddit_client_secret.clone(),
            user_agent: self.reddit_user_agent.clone(),
        }
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::invalid(field, "must not be empty"));
    }
    Ok(())
}
