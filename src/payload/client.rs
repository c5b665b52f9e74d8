//! HTTP client that streams payloads into scoped temp files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::http_client::{HttpTimeouts, build_http_client};
use crate::user_agent;

use super::PayloadError;
use super::filename::{filename_from_locator, suffixed_filename};

/// Numbered alternatives tried when the preferred temp name is taken.
const MAX_NAME_SUFFIX: usize = 1000;

/// A downloaded payload on disk.
///
/// The file is removed when this value is dropped, whichever way the owning
/// scope exits: normal return, early `?` return, or task cancellation.
#[derive(Debug)]
pub struct TempPayload {
    path: PathBuf,
    file_name: String,
    size: u64,
    over_limit: bool,
    content_length: Option<u64>,
}

impl TempPayload {
    /// Temp file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name derived from the locator's final path segment.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Bytes written to the temp file.
    ///
    /// For a payload cut off at the fetch limit this is `limit + 1`.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// True when the body was larger than the fetch limit and reading
    /// stopped early. The temp file then holds a prefix only.
    #[must_use]
    pub fn is_over_limit(&self) -> bool {
        self.over_limit
    }

    /// Best known size of the full remote payload: the advertised
    /// `Content-Length` when present, otherwise the bytes written.
    #[must_use]
    pub fn reported_size(&self) -> u64 {
        self.content_length.map_or(self.size, |len| len.max(self.size))
    }

    /// Reads the whole payload into memory.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Io`] if the temp file cannot be read.
    pub async fn read(&self) -> Result<Vec<u8>, PayloadError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| PayloadError::io(self.path.clone(), e))
    }
}

impl Drop for TempPayload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed temp payload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove temp payload"),
        }
    }
}

/// Downloads item payloads into a temp directory.
///
/// Created once and reused across cycles for connection pooling.
#[derive(Debug, Clone)]
pub struct PayloadClient {
    client: Client,
}

impl PayloadClient {
    /// Creates a client with the default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Client`] if HTTP client construction fails.
    pub fn new() -> Result<Self, PayloadError> {
        Self::with_timeouts(HttpTimeouts::default())
    }

    /// Creates a client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Client`] if HTTP client construction fails.
    pub fn with_timeouts(timeouts: HttpTimeouts) -> Result<Self, PayloadError> {
        let client = build_http_client(
            "payload",
            &user_agent::default_payload_user_agent(),
            timeouts,
        )
        .map_err(PayloadError::Client)?;
        Ok(Self { client })
    }

    /// Streams the payload at `locator` into `dir`, reading at most
    /// `max_bytes + 1` bytes.
    ///
    /// The file is named after the locator's final path segment, with a
    /// numeric suffix if that name is already taken; existing files are never
    /// opened. A body longer than `max_bytes` is cut off and the payload is
    /// marked [over the limit](TempPayload::is_over_limit). On any error the
    /// partially written file is removed before returning.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] if the locator is invalid, the request fails,
    /// the server answers with a non-success status, or writing fails.
    #[instrument(skip(self, dir), fields(locator = %locator))]
    pub async fn fetch(
        &self,
        locator: &str,
        dir: &Path,
        max_bytes: u64,
    ) -> Result<TempPayload, PayloadError> {
        let parsed =
            Url::parse(locator).map_err(|_| PayloadError::invalid_url(locator.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PayloadError::invalid_url(locator.to_string()));
        }

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| PayloadError::network(locator, e))?;
        if !response.status().is_success() {
            return Err(PayloadError::http_status(locator, response.status().as_u16()));
        }

        let file_name = filename_from_locator(&parsed);
        let (path, file) = create_unique_file(dir, &file_name).await?;
        let mut payload = TempPayload {
            path,
            file_name,
            size: 0,
            over_limit: false,
            content_length: response.content_length(),
        };

        let (size, over_limit) =
            stream_to_file(file, response, locator, &payload.path, max_bytes).await?;
        payload.size = size;
        payload.over_limit = over_limit;
        info!(
            path = %payload.path.display(),
            bytes = payload.size,
            over_limit,
            "payload downloaded"
        );
        Ok(payload)
    }
}

/// Creates a new file for `file_name` in `dir` without touching existing files.
///
/// Tries `name.ext`, then `name_1.ext`, `name_2.ext`, and so on.
async fn create_unique_file(dir: &Path, file_name: &str) -> Result<(PathBuf, File), PayloadError> {
    let mut last_error = None;
    for suffix in 0..=MAX_NAME_SUFFIX {
        let candidate = if suffix == 0 {
            dir.join(file_name)
        } else {
            dir.join(suffixed_filename(file_name, suffix))
        };
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => {
                if suffix > 0 {
                    debug!(path = %candidate.display(), "preferred name taken, using suffixed name");
                }
                return Ok((candidate, file));
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => last_error = Some(e),
            Err(e) => return Err(PayloadError::io(candidate, e)),
        }
    }
    let source = last_error
        .unwrap_or_else(|| std::io::Error::new(ErrorKind::AlreadyExists, "no free file name"));
    Err(PayloadError::io(dir.join(file_name), source))
}

/// Streams response body to file, stopping once more than `max_bytes` have
/// been written. Returns bytes written and whether the limit was exceeded.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    max_bytes: u64,
) -> Result<(u64, bool), PayloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;
    let mut over_limit = false;
    let budget = max_bytes.saturating_add(1);

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| PayloadError::network(url, e))?;
        let room = usize::try_from(budget - bytes_written).unwrap_or(usize::MAX);
        let take = chunk.len().min(room);
        writer
            .write_all(&chunk[..take])
            .await
            .map_err(|e| PayloadError::io(file_path.to_path_buf(), e))?;
        bytes_written += take as u64;
        if bytes_written > max_bytes {
            debug!(max_bytes, "payload exceeds limit, stopped reading");
            over_limit = true;
            break;
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| PayloadError::io(file_path.to_path_buf(), e))?;

    Ok((bytes_written, over_limit))
}
