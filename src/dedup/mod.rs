//! Durable record of locators already delivered to the sink.
//!
//! # Overview
//!
//! - [`SentSet`] - in-memory set of delivered locators, owned by the running cycle
//! - [`DedupStore`] - flat-file persistence, one locator per line
//!
//! The file is read once at the start of each cycle, rewritten in full after
//! every successful delivery, and flushed one last time on shutdown.
//!
//! # Example
//!
//! ```no_run
//! use relay_core::dedup::DedupStore;
//!
//! # async fn example() -> Result<(), relay_core::dedup::DedupError> {
//! let store = DedupStore::new("sent_images.txt");
//! let mut sent = store.load().await?;
//! if sent.insert("https://i.redd.it/abc123.jpg") {
//!     store.save_or_log(&sent).await;
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod store;

pub use error::DedupError;
pub use store::{DedupStore, SentSet};
