//! Flat-file persistence for the sent set.

use std::borrow::Cow;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, instrument, warn};

use super::DedupError;

/// Set of locators that have already been delivered to the sink.
///
/// Records are only ever added. Membership is the sole dedup signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentSet {
    locators: HashSet<String>,
}

impl SentSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `locator` has already been delivered.
    #[must_use]
    pub fn contains(&self, locator: &str) -> bool {
        self.locators.contains(locator)
    }

    /// Records a delivered locator. Returns false if it was already present.
    pub fn insert(&mut self, locator: impl Into<String>) -> bool {
        self.locators.insert(locator.into())
    }

    /// Adds every record from `other`.
    pub fn merge(&mut self, other: &SentSet) {
        self.locators.extend(other.locators.iter().cloned());
    }

    /// Number of recorded locators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locators.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }

    /// Locators in lexicographic order, as they are written to disk.
    #[must_use]
    pub fn sorted(&self) -> Vec<&str> {
        let mut lines: Vec<&str> = self.locators.iter().map(String::as_str).collect();
        lines.sort_unstable();
        lines
    }

    fn parse(raw: &str) -> Self {
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn render(&self) -> String {
        self.sorted().join("\n")
    }
}

impl FromIterator<String> for SentSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            locators: iter.into_iter().collect(),
        }
    }
}

/// Durable store backed by a newline-separated text file.
///
/// Every save overwrites the whole file, so the in-memory [`SentSet`] is
/// always the source of truth. Writes go through a sibling temp file and a
/// rename, which keeps the list intact if the process dies mid-write.
#[derive(Debug, Clone)]
pub struct DedupStore {
    path: PathBuf,
}

impl DedupStore {
    /// Creates a store for the given file path. Nothing is read until [`load`](Self::load).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the persisted list.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted set.
    ///
    /// An absent file is the normal fresh-start state and yields an empty
    /// set. Bytes that are not valid UTF-8 are replaced, so a damaged line
    /// costs that one record and never the rest of the file.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::Io`] if the file exists but cannot be read.
    /// Callers must not save over it in that case.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<SentSet, DedupError> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => {
                let text = String::from_utf8_lossy(&raw);
                if matches!(text, Cow::Owned(_)) {
                    warn!("sent list contains invalid UTF-8, damaged bytes were replaced");
                }
                let set = SentSet::parse(&text);
                info!(count = set.len(), "loaded sent locators");
                Ok(set)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("no previous sent list found, starting fresh");
                Ok(SentSet::new())
            }
            Err(e) => Err(DedupError::io(self.path.clone(), e)),
        }
    }

    /// Overwrites the persisted list with `set`.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::Io`] if the parent directory cannot be created or
    /// the temp file cannot be written or renamed into place.
    #[instrument(skip(self, set), fields(path = %self.path.display(), count = set.len()))]
    pub async fn save(&self, set: &SentSet) -> Result<(), DedupError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DedupError::io(parent, e))?;
        }

        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, set.render())
            .await
            .map_err(|e| DedupError::io(tmp_path.clone(), e))?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(DedupError::io(self.path.clone(), e));
        }

        debug!("saved sent locators");
        Ok(())
    }

    /// Saves `set`, logging and swallowing any failure.
    ///
    /// Returns whether the write succeeded. A failed save is retried
    /// implicitly by the next call, which writes the then-current set.
    pub async fn save_or_log(&self, set: &SentSet) -> bool {
        match self.save(set).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, count = set.len(), "failed to persist sent locators");
                false
            }
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_else(|| "sent".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_ignores_blank_lines_and_whitespace() {
        let set = SentSet::parse("https://a/1.png\n\n  https://a/2.jpg  \r\n\n");
        assert_eq!(set.len(), 2);
        assert!(set.contains("https://a/1.png"));
        assert!(set.contains("https://a/2.jpg"));
    }

    #[test]
    fn test_render_is_sorted_one_per_line() {
        let set: SentSet = ["https://b/2.png", "https://a/1.png"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(set.render(), "https://a/1.png\nhttps://b/2.png");
    }

    #[test]
    fn test_insert_reports_new_records_only() {
        let mut set = SentSet::new();
        assert!(set.insert("https://a/1.png"));
        assert!(!set.insert("https://a/1.png"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_merge_is_union() {
        let mut left: SentSet = ["x".to_string(), "y".to_string()].into_iter().collect();
        let right: SentSet = ["y".to_string(), "z".to_string()].into_iter().collect();
        left.merge(&right);
        assert_eq!(left.sorted(), vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_empty_set() {
        let dir = TempDir::new().unwrap();
        let store = DedupStore::new(dir.path().join("sent_images.txt"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_preserves_records() {
        let dir = TempDir::new().unwrap();
        let store = DedupStore::new(dir.path().join("sent_images.txt"));
        let mut set = SentSet::new();
        set.insert("https://i.redd.it/one.jpg");
        set.insert("https://i.redd.it/two.png");

        store.save(&set).await.unwrap();

        assert_eq!(store.load().await.unwrap(), set);
        assert!(!store.tmp_path().exists(), "temp file must be renamed away");
    }

    #[tokio::test]
    async fn test_save_overwrites_instead_of_appending() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sent_images.txt");
        std::fs::write(&path, "https://old/entry.png\n").unwrap();
        let store = DedupStore::new(&path);

        let mut set = SentSet::new();
        set.insert("https://new/entry.png");
        store.save(&set).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, "https://new/entry.png");
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = DedupStore::new(dir.path().join("state").join("nested").join("sent.txt"));
        let mut set = SentSet::new();
        set.insert("https://a/1.gif");
        store.save(&set).await.unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_save_or_log_swallows_failure() {
        let dir = TempDir::new().unwrap();
        // A directory at the target path makes the rename fail.
        let path = dir.path().join("sent_images.txt");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();
        let store = DedupStore::new(&path);

        let mut set = SentSet::new();
        set.insert("https://a/1.png");
        assert!(!store.save_or_log(&set).await);
        assert!(!store.tmp_path().exists());
    }

    #[tokio::test]
    async fn test_load_keeps_records_around_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sent_images.txt");
        std::fs::write(&path, b"https://a/a.png\nhttps://a/caf\xe9.png\nhttps://a/b.png\n").unwrap();
        let store = DedupStore::new(&path);

        let set = store.load().await.unwrap();

        assert_eq!(set.len(), 3);
        assert!(set.contains("https://a/a.png"));
        assert!(set.contains("https://a/b.png"));
        assert!(set.contains("https://a/caf\u{FFFD}.png"));
    }

    #[tokio::test]
    async fn test_load_unreadable_file_is_error() {
        let dir = TempDir::new().unwrap();
        // Reading a directory fails with something other than NotFound.
        let path = dir.path().join("sent_images.txt");
        std::fs::create_dir(&path).unwrap();
        let store = DedupStore::new(&path);

        let result = store.load().await;
        assert!(matches!(result, Err(DedupError::Io { .. })), "got {result:?}");
    }
}
