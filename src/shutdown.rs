//! Process shutdown: signal handling and the exit-time dedup flush.

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::dedup::{DedupStore, SentSet};

/// Completes when the process receives Ctrl-C (or SIGTERM on unix).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c"),
        () = terminate => info!("received SIGTERM"),
    }
}

/// Persists the union of the on-disk store and the live sent set.
///
/// Locators sent by another run since this one loaded are kept. Failure is
/// logged and reported as `false`; it never panics. An existing file that
/// cannot be read is left untouched.
pub async fn flush_on_exit(store: &DedupStore, live: &watch::Receiver<SentSet>) -> bool {
    let mut merged = match store.load().await {
        Ok(set) => set,
        Err(e) => {
            error!(error = %e, "sent list unreadable, skipping exit flush");
            return false;
        }
    };
    let snapshot = live.borrow().clone();
    merged.merge(&snapshot);
    let saved = store.save_or_log(&merged).await;
    if saved {
        info!(path = %store.path().display(), entries = merged.len(), "dedup store flushed");
    }
    saved
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_flush_writes_live_set() {
        let dir = TempDir::new().unwrap();
        let store = DedupStore::new(dir.path().join("sent.txt"));
        let live: SentSet = ["https://a/1.png".to_string()].into_iter().collect();
        let (_tx, rx) = watch::channel(live);

        assert!(flush_on_exit(&store, &rx).await);
        let loaded = store.load().await.unwrap();
        assert!(loaded.contains("https://a/1.png"));
    }

    #[tokio::test]
    async fn test_flush_keeps_entries_already_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = DedupStore::new(dir.path().join("sent.txt"));
        let on_disk: SentSet = ["https://a/old.png".to_string()].into_iter().collect();
        store.save(&on_disk).await.unwrap();

        let live: SentSet = ["https://a/new.png".to_string()].into_iter().collect();
        let (_tx, rx) = watch::channel(live);
        assert!(flush_on_exit(&store, &rx).await);

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains("https://a/old.png"));
        assert!(loaded.contains("https://a/new.png"));
    }

    #[tokio::test]
    async fn test_flush_failure_returns_false() {
        let dir = TempDir::new().unwrap();
        // Parent path is a regular file, so the save cannot create its directory.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let store = DedupStore::new(blocker.join("sent.txt"));
        let (_tx, rx) = watch::channel(SentSet::new());

        assert!(!flush_on_exit(&store, &rx).await);
    }

    #[tokio::test]
    async fn test_flush_leaves_unreadable_store_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sent.txt");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();
        let store = DedupStore::new(&path);
        let live: SentSet = ["https://a/new.png".to_string()].into_iter().collect();
        let (_tx, rx) = watch::channel(live);

        assert!(!flush_on_exit(&store, &rx).await);
        assert!(path.join("keep").exists());
        assert!(!dir.path().join("sent.txt.tmp").exists());
    }
}
