//! Shared fakes for pipeline integration tests.
//!
//! Payload bytes are served by wiremock; the source and sink are in-memory
//! fakes so tests can inspect exactly what was delivered.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use relay_core::sink::{PresentationUnit, Sink, SinkError};
use relay_core::source::{ContentItem, ContentSource, SourceError, TimeWindow};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Source returning a fixed, already-ranked list of items.
pub struct StaticSource {
    items: Vec<ContentItem>,
    fail: bool,
}

impl StaticSource {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self { items, fail: false }
    }

    /// A source whose every fetch fails with an HTTP 503.
    pub fn failing() -> Self {
        Self {
            items: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl ContentSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_top_items(
        &self,
        _collection: &str,
        _window: TimeWindow,
        limit: u32,
    ) -> Result<Vec<ContentItem>, SourceError> {
        if self.fail {
            return Err(SourceError::http_status("https://static.test/top", 503));
        }
        Ok(self.items.iter().take(limit as usize).cloned().collect())
    }
}

/// Sink that records everything it is asked to send.
#[derive(Default)]
pub struct RecordingSink {
    units: Mutex<Vec<PresentationUnit>>,
    notices: Mutex<Vec<String>>,
    /// Links whose send is forced to fail.
    fail_links: HashSet<String>,
    /// Directory inspected at send time to prove the temp file existed.
    watch_dir: Option<PathBuf>,
    files_seen_at_send: Mutex<Vec<usize>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(links: impl IntoIterator<Item = String>) -> Self {
        Self {
            fail_links: links.into_iter().collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn watching(mut self, dir: impl Into<PathBuf>) -> Self {
        self.watch_dir = Some(dir.into());
        self
    }

    pub fn units(&self) -> Vec<PresentationUnit> {
        self.units.lock().unwrap().clone()
    }

    pub fn links(&self) -> Vec<String> {
        self.units().into_iter().map(|unit| unit.link).collect()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    pub fn files_seen_at_send(&self) -> Vec<usize> {
        self.files_seen_at_send.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn ready(&self) -> Result<String, SinkError> {
        Ok("recording-bot".to_string())
    }

    async fn send_presentation_unit(&self, unit: &PresentationUnit) -> Result<(), SinkError> {
        if let Some(dir) = &self.watch_dir {
            self.files_seen_at_send
                .lock()
                .unwrap()
                .push(count_files(dir));
        }
        if self.fail_links.contains(&unit.link) {
            return Err(SinkError::http_status(unit.link.clone(), 500, None));
        }
        self.units.lock().unwrap().push(unit.clone());
        Ok(())
    }

    async fn send_notice(&self, text: &str) -> Result<(), SinkError> {
        self.notices.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Number of entries in `dir` (0 if it does not exist).
pub fn count_files(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Starts a server answering every `/img/*` path with a small PNG-ish body.
pub async fn payload_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/img/.+"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x89PNG fake image".to_vec()))
        .mount(&server)
        .await;
    server
}

/// `count` ranked image items served by `server`.
pub fn image_items(server: &MockServer, count: usize) -> Vec<ContentItem> {
    (0..count)
        .map(|i| {
            ContentItem::link(
                format!("{}/img/{i}.png", server.uri()),
                format!("Post {i}"),
                format!("user{i}"),
            )
        })
        .collect()
}
