//! Media Relay Core Library
//!
//! Polls a ranked content source on a fixed interval, keeps the image
//! posts, and relays each one not seen before to a chat sink exactly once.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`source`] - content source boundary and the Reddit adapter
//! - [`filter`] - media eligibility check on candidate items
//! - [`payload`] - streaming download of one item into a self-deleting temp file
//! - [`sink`] - sink boundary and the Discord adapter (with retry policy)
//! - [`dedup`] - durable flat-file set of already-sent locators
//! - [`delivery`] - the fetch-filter-deliver cycle
//! - [`scheduler`] - interval timer with a single-flight guard
//! - [`shutdown`] - signal handling and the exit-time dedup flush
//! - [`config`] - JSON startup configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dedup;
pub mod delivery;
pub mod filter;
pub mod http_client;
pub mod payload;
pub mod scheduler;
pub mod shutdown;
pub mod sink;
pub mod source;
mod user_agent;

// Re-export commonly used types
pub use config::{ConfigError, DEFAULT_CONFIG_PATH, RelayConfig};
pub use dedup::{DedupError, DedupStore, SentSet};
pub use delivery::{
    CycleReport, DeliveryPath, DeliveryPipeline, DeliverySettings, INLINE_SIZE_LIMIT,
    ItemOutcome, MAX_ITEMS_PER_CYCLE,
};
pub use filter::{MEDIA_EXTENSIONS, filter_eligible, is_eligible};
pub use http_client::HttpTimeouts;
pub use payload::{PayloadClient, PayloadError, TempPayload};
pub use scheduler::{CycleRunner, Scheduler, SchedulerStats};
pub use shutdown::{flush_on_exit, shutdown_signal};
pub use sink::{DiscordSink, PresentationUnit, RetryPolicy, Sink, SinkError};
pub use source::{ContentItem, ContentSource, RedditCredentials, RedditSource, SourceError, TimeWindow};
