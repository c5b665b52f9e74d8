//! Per-item outcomes and per-cycle reports.

use thiserror::Error;

use crate::dedup::DedupError;
use crate::payload::PayloadError;
use crate::sink::SinkError;
use crate::source::SourceError;

/// How a delivered item reached the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPath {
    /// Payload uploaded as an attachment.
    Inline,
    /// Payload too large; the sink renders the locator by reference.
    LinkOnly,
}

/// Result of running the single-item delivery procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Sent and recorded in the dedup store.
    Delivered(DeliveryPath),
    /// Locator was already in the dedup store; nothing was sent.
    SkippedAlreadySent,
    /// Download or send failed; the locator stays unrecorded.
    Failed {
        /// Human-readable failure description.
        reason: String,
    },
}

/// Failure inside the single-item procedure.
#[derive(Debug, Error)]
pub enum ItemError {
    /// Download or temp file IO failed.
    #[error(transparent)]
    Payload(#[from] PayloadError),
    /// Sending to the sink failed.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Failure that aborts a whole cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The content source could not be reached or returned garbage.
    #[error("failed to fetch candidates: {0}")]
    Source(#[from] SourceError),

    /// The sent list exists but could not be read. The cycle stops before
    /// any delivery so the unread history is never overwritten.
    #[error("failed to load sent list: {0}")]
    Dedup(#[from] DedupError),

    /// The temp download directory could not be created.
    #[error("failed to prepare download directory {path}: {source}")]
    DownloadDir {
        /// Directory path.
        path: std::path::PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Summary of one fetch-filter-deliver cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Candidates returned by the source.
    pub fetched: usize,
    /// Candidates that passed the item filter.
    pub eligible: usize,
    /// Eligible items skipped because they were already sent.
    pub skipped_already_sent: usize,
    /// Items delivered with an attachment.
    pub delivered_inline: usize,
    /// Items delivered link-only.
    pub delivered_link_only: usize,
    /// Items whose delivery failed.
    pub failed: usize,
    /// True when the per-cycle cap stopped the loop.
    pub cap_reached: bool,
    /// True when a shortfall notice was successfully sent.
    pub shortfall_notice_sent: bool,
    /// Cycle-level failure, if the cycle aborted.
    pub error: Option<String>,
}

impl CycleReport {
    /// Total items delivered by either path.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.delivered_inline + self.delivered_link_only
    }

    pub(crate) fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Delivered(DeliveryPath::Inline) => self.delivered_inline += 1,
            ItemOutcome::Delivered(DeliveryPath::LinkOnly) => self.delivered_link_only += 1,
            ItemOutcome::SkippedAlreadySent => self.skipped_already_sent += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
        }
    }
}
