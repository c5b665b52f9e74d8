//! Fetch, filter, deliver, persist.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::dedup::{DedupStore, SentSet};
use crate::filter::filter_eligible;
use crate::payload::PayloadClient;
use crate::scheduler::CycleRunner;
use crate::sink::{PresentationUnit, Sink};
use crate::source::{ContentItem, ContentSource, DEFAULT_FETCH_LIMIT, TimeWindow};

use super::constants::{
    CYCLE_ERROR_NOTICE, DEFAULT_DOWNLOAD_DIR, INLINE_SIZE_LIMIT, MAX_ITEMS_PER_CYCLE,
    shortfall_notice,
};
use super::outcome::{CycleError, CycleReport, DeliveryPath, ItemError, ItemOutcome};

/// What a cycle fetches and how it delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySettings {
    /// Collection (subreddit) to poll.
    pub collection: String,
    /// Ranking window passed to the source.
    pub window: TimeWindow,
    /// Candidates requested per fetch.
    pub fetch_limit: u32,
    /// Maximum deliveries per cycle.
    pub max_items_per_cycle: usize,
    /// Largest payload attached inline, in bytes (inclusive).
    pub inline_size_limit: u64,
    /// Directory for temp payload files; created if absent.
    pub download_dir: PathBuf,
}

impl DeliverySettings {
    /// Settings for `collection` with every other field at its default.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            window: TimeWindow::default(),
            fetch_limit: DEFAULT_FETCH_LIMIT,
            max_items_per_cycle: MAX_ITEMS_PER_CYCLE,
            inline_size_limit: INLINE_SIZE_LIMIT,
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
        }
    }

    /// Overrides the temp download directory.
    #[must_use]
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }
}

/// Runs fetch-filter-deliver cycles against one source and one sink.
///
/// Items are processed strictly in rank order, one at a time. Each
/// successful delivery is persisted before the next item starts, so a crash
/// can re-deliver at most the item in flight.
pub struct DeliveryPipeline {
    source: Arc<dyn ContentSource>,
    sink: Arc<dyn Sink>,
    payloads: PayloadClient,
    store: DedupStore,
    settings: DeliverySettings,
    live: watch::Sender<SentSet>,
}

impl DeliveryPipeline {
    /// Creates a pipeline. Nothing is fetched or loaded until a cycle runs.
    #[must_use]
    pub fn new(
        source: Arc<dyn ContentSource>,
        sink: Arc<dyn Sink>,
        payloads: PayloadClient,
        store: DedupStore,
        settings: DeliverySettings,
    ) -> Self {
        let (live, _) = watch::channel(SentSet::new());
        Self {
            source,
            sink,
            payloads,
            store,
            settings,
            live,
        }
    }

    /// Settings this pipeline runs with.
    #[must_use]
    pub fn settings(&self) -> &DeliverySettings {
        &self.settings
    }

    /// Dedup store backing this pipeline.
    #[must_use]
    pub fn store(&self) -> &DedupStore {
        &self.store
    }

    /// Subscribes to the live sent set.
    ///
    /// Updated at cycle start and after every delivery, so a shutdown hook
    /// can flush state that has not reached disk yet.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SentSet> {
        self.live.subscribe()
    }

    /// Runs one full cycle. Never fails: cycle-level errors are logged,
    /// reported to the sink as a notice, and recorded in the report.
    #[instrument(skip(self), fields(collection = %self.settings.collection))]
    pub async fn run_cycle(&self) -> CycleReport {
        info!("cycle starting");
        let mut report = CycleReport::default();

        if let Err(e) = self.try_run_cycle(&mut report).await {
            error!(error = %e, "cycle aborted");
            report.error = Some(e.to_string());
            if let Err(notice_error) = self.sink.send_notice(CYCLE_ERROR_NOTICE).await {
                warn!(error = %notice_error, "failed to send error notice");
            }
            return report;
        }

        info!(
            fetched = report.fetched,
            eligible = report.eligible,
            skipped = report.skipped_already_sent,
            delivered = report.delivered(),
            link_only = report.delivered_link_only,
            failed = report.failed,
            "cycle complete"
        );
        report
    }

    async fn try_run_cycle(&self, report: &mut CycleReport) -> Result<(), CycleError> {
        let mut sent = self.store.load().await?;
        // A save that failed last cycle is still in the live set.
        sent.merge(&self.live.borrow());
        self.live.send_replace(sent.clone());

        let download_dir = &self.settings.download_dir;
        tokio::fs::create_dir_all(download_dir)
            .await
            .map_err(|source| CycleError::DownloadDir {
                path: download_dir.clone(),
                source,
            })?;

        let candidates = self
            .source
            .fetch_top_items(
                &self.settings.collection,
                self.settings.window,
                self.settings.fetch_limit,
            )
            .await?;
        report.fetched = candidates.len();

        let eligible = filter_eligible(candidates);
        report.eligible = eligible.len();
        debug!(eligible = eligible.len(), "filtered candidates");

        let cap = self.settings.max_items_per_cycle;
        for item in &eligible {
            if report.delivered() >= cap {
                break;
            }
            let outcome = self.deliver_item(item, &mut sent).await;
            if let ItemOutcome::Failed { reason } = &outcome {
                warn!(locator = %item.locator, reason = %reason, "item delivery failed");
            }
            report.record(&outcome);
        }
        report.cap_reached = report.delivered() >= cap;

        if !report.cap_reached {
            let text = shortfall_notice(&self.settings.collection, report.delivered(), cap);
            match self.sink.send_notice(&text).await {
                Ok(()) => report.shortfall_notice_sent = true,
                Err(e) => warn!(error = %e, "failed to send shortfall notice"),
            }
        }
        Ok(())
    }

    /// Runs the single-item procedure: download, size branch, send, record.
    ///
    /// The temp payload is removed before this returns on every path.
    #[instrument(skip(self, item, sent), fields(locator = %item.locator))]
    pub async fn deliver_item(&self, item: &ContentItem, sent: &mut SentSet) -> ItemOutcome {
        if sent.contains(&item.locator) {
            debug!("already sent, skipping");
            return ItemOutcome::SkippedAlreadySent;
        }

        match self.send_item(item).await {
            Ok(path) => {
                info!(path = ?path, "item delivered");
                sent.insert(item.locator.clone());
                self.store.save_or_log(sent).await;
                self.live.send_modify(|live| {
                    live.insert(item.locator.clone());
                });
                ItemOutcome::Delivered(path)
            }
            Err(e) => ItemOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    async fn send_item(&self, item: &ContentItem) -> Result<DeliveryPath, ItemError> {
        let payload = self
            .payloads
            .fetch(
                &item.locator,
                &self.settings.download_dir,
                self.settings.inline_size_limit,
            )
            .await?;

        let (unit, path) = if payload.is_over_limit() {
            debug!(
                bytes = payload.reported_size(),
                "payload over inline limit, sending link only"
            );
            (
                PresentationUnit::link_only(item, payload.reported_size()),
                DeliveryPath::LinkOnly,
            )
        } else {
            let bytes = payload.read().await?;
            (
                PresentationUnit::inline(item, payload.file_name(), bytes),
                DeliveryPath::Inline,
            )
        };

        self.sink.send_presentation_unit(&unit).await?;
        Ok(path)
    }
}

impl std::fmt::Debug for DeliveryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryPipeline")
            .field("source", &self.source.name())
            .field("sink", &self.sink.name())
            .field("store", &self.store)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CycleRunner for DeliveryPipeline {
    async fn run_cycle(&self) -> CycleReport {
        DeliveryPipeline::run_cycle(self).await
    }
}
