//! Content source boundary: ranked items from a named collection.
//!
//! # Architecture
//!
//! - [`ContentSource`] - async trait the delivery pipeline consumes
//! - [`ContentItem`] - one ranked candidate, transient for one cycle
//! - [`TimeWindow`] - popularity window passed to the source
//! - [`RedditSource`] - Reddit "top" listing adapter (application-only OAuth)

mod error;
mod reddit;

pub use error::SourceError;
pub use reddit::{RedditCredentials, RedditSource};

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;

/// Default number of candidates requested per fetch.
pub const DEFAULT_FETCH_LIMIT: u32 = 100;

/// Longest collection name accepted.
pub const MAX_COLLECTION_LEN: usize = 50;

/// True when `name` is 1-50 ASCII letters, digits or underscores.
#[must_use]
pub fn is_valid_collection(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_COLLECTION_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A ranked item returned by a [`ContentSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    /// URL of the item's content. Also the dedup key.
    pub locator: String,
    /// Human-readable title.
    pub title: String,
    /// Author name as reported by the source.
    pub author: String,
    /// True for text-only posts that carry no media.
    pub is_self_post: bool,
}

impl ContentItem {
    /// Creates a link item (not a self post).
    #[must_use]
    pub fn link(
        locator: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            locator: locator.into(),
            title: title.into(),
            author: author.into(),
            is_self_post: false,
        }
    }
}

/// Time window over which the source ranks items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Hour,
    #[default]
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeWindow {
    /// Returns the wire label (`t=` query value).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "all" => Ok(Self::All),
            other => Err(format!(
                "unknown time window '{other}' (expected hour, day, week, month, year or all)"
            )),
        }
    }
}

/// Source of ranked content items.
///
/// Implementations own authentication and session handling. Results are
/// ordered by the source's own popularity ranking, highest first.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Lists the top `limit` items of `collection` over `window`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on authentication, network or decoding failures.
    async fn fetch_top_items(
        &self,
        collection: &str,
        window: TimeWindow,
        limit: u32,
    ) -> Result<Vec<ContentItem>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_window_default_is_day() {
        assert_eq!(TimeWindow::default(), TimeWindow::Day);
    }

    #[test]
    fn test_time_window_from_str_case_insensitive() {
        assert_eq!("WEEK".parse::<TimeWindow>(), Ok(TimeWindow::Week));
        assert_eq!(" all ".parse::<TimeWindow>(), Ok(TimeWindow::All));
        assert!("fortnight".parse::<TimeWindow>().is_err());
    }

    #[test]
    fn test_time_window_display_matches_wire_label() {
        assert_eq!(TimeWindow::Month.to_string(), "month");
    }

    #[test]
    fn test_content_item_link_is_not_self_post() {
        let item = ContentItem::link("https://i.redd.it/a.png", "A", "alice");
        assert!(!item.is_self_post);
        assert_eq!(item.author, "alice");
    }
}
