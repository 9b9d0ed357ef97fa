//! Keyed storage for rate windows.
//!
//! A store performs the whole prune, count, append, persist cycle for one key
//! as a single step, so concurrent requests on the same key cannot both read
//! a stale count.

use super::window::{RateDecision, RateRule, RateWindow};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use structureone_core::BoxFuture;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors from a rate-limit store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing a window failed.
    #[error("rate-limit store I/O error at {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A window could not be serialized.
    #[error("rate-limit window could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Persistence for sliding-log windows.
pub trait RateLimitStore: Send + Sync + std::fmt::Debug {
    /// Atomically checks `key` against `rule` at time `now`, recording the
    /// request when admitted.
    fn admit<'a>(
        &'a self,
        key: &'a str,
        now: i64,
        rule: RateRule,
    ) -> BoxFuture<'a, Result<RateDecision, StoreError>>;

    /// Drops windows with no timestamps left in them. Returns how many.
    fn purge(&self, _now: i64) -> usize {
        0
    }
}

/// In-process store.
///
/// Each key's window is updated while holding its map shard, which makes the
/// check-and-append atomic per key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    windows: DashMap<String, RateWindow>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl RateLimitStore for MemoryStore {
    fn admit<'a>(
        &'a self,
        key: &'a str,
        now: i64,
        rule: RateRule,
    ) -> BoxFuture<'a, Result<RateDecision, StoreError>> {
        let decision = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| RateWindow::new(key))
            .admit(now, rule);
        Box::pin(std::future::ready(Ok(decision)))
    }

    fn purge(&self, now: i64) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| !window.is_stale(now));
        before.saturating_sub(self.windows.len())
    }
}

/// One JSON file per key in a directory.
///
/// Updates to a key are serialized by a per-key async lock and written via a
/// temp file and rename, so readers never see a half-written window. The lock
/// is per process; separate processes sharing the directory are not
/// coordinated.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FileStore {
    /// Opens (creating if needed) a store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self {
            dir,
            locks: DashMap::new(),
        })
    }

    /// Directory holding the window files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    async fn read_window(&self, key: &str, path: &Path) -> Result<RateWindow, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "corrupt rate-limit window, starting empty");
                RateWindow::new(key)
            })),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(RateWindow::new(key)),
            Err(err) => Err(StoreError::io(path, err)),
        }
    }

    async fn write_window(&self, path: &Path, window: &RateWindow) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(window)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::io(path, e))
    }

    async fn admit_locked(
        &self,
        key: &str,
        now: i64,
        rule: RateRule,
    ) -> Result<RateDecision, StoreError> {
        let lock = Arc::clone(&*self.locks.entry(key.to_string()).or_default());
        let _guard = lock.lock().await;

        let path = self.path_for(key);
        let mut window = self.read_window(key, &path).await?;
        let decision = window.admit(now, rule);
        if decision.allowed {
            self.write_window(&path, &window).await?;
        }
        Ok(decision)
    }
}

impl RateLimitStore for FileStore {
    fn admit<'a>(
        &'a self,
        key: &'a str,
        now: i64,
        rule: RateRule,
    ) -> BoxFuture<'a, Result<RateDecision, StoreError>> {
        Box::pin(self.admit_locked(key, now, rule))
    }

    /// Deletes stale and corrupt window files, skipping keys that are being
    /// admitted, then forgets locks nobody holds. Blocking; the server runs it
    /// off the async workers.
    fn purge(&self, now: i64) -> usize {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "cannot scan rate-limit store");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let lock = Arc::clone(&*self.locks.entry(key.to_string()).or_default());
            let Ok(_guard) = lock.try_lock() else {
                continue;
            };
            let stale = std::fs::read(&path)
                .ok()
                .and_then(|bytes| serde_json::from_slice::<RateWindow>(&bytes).ok())
                .map_or(true, |window| window.is_stale(now));
            if !stale {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot delete stale rate-limit window");
                }
            }
        }

        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000;

    #[tokio::test]
    async fn test_memory_store_counts_per_key() {
        let store = MemoryStore::new();
        let rule = RateRule::new(1, 60);
        assert!(store.admit("a", T0, rule).await.unwrap().allowed);
        assert!(!store.admit("a", T0, rule).await.unwrap().allowed);
        assert!(store.admit("b", T0, rule).await.unwrap().allowed);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_memory_store_purge() {
        let store = MemoryStore::new();
        store.admit("a", T0, RateRule::new(5, 10)).await.unwrap();
        store.admit("b", T0 + 5, RateRule::new(5, 10)).await.unwrap();

        assert_eq!(store.purge(T0 + 10), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_memory_store_concurrent_admissions_respect_limit() {
        let store = Arc::new(MemoryStore::new());
        let rule = RateRule::new(10, 60);

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.admit("hot", T0, rule).await.unwrap().allowed })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }

    #[tokio::test]
    async fn test_file_store_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let rule = RateRule::new(2, 60);

        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.admit("k", T0, rule).await.unwrap().allowed);
        assert!(store.admit("k", T0 + 1, rule).await.unwrap().allowed);

        let reopened = FileStore::open(dir.path()).unwrap();
        let decision = reopened.admit("k", T0 + 2, rule).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after, Some(58));

        let saved: RateWindow =
            serde_json::from_slice(&std::fs::read(dir.path().join("k.json")).unwrap()).unwrap();
        assert_eq!(saved.timestamps, [T0, T0 + 1]);
        assert_eq!(saved.key, "k");
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("k.json"), b"not json").unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        let decision = store.admit("k", T0, RateRule::new(1, 60)).await.unwrap();
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn test_file_store_purge_deletes_stale_windows_and_locks() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.admit("old", T0, RateRule::new(5, 10)).await.unwrap();
        store.admit("fresh", T0 + 5, RateRule::new(5, 10)).await.unwrap();
        std::fs::write(dir.path().join("broken.json"), b"not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();
        assert_eq!(store.locks.len(), 2);

        assert_eq!(store.purge(T0 + 10), 2);
        assert!(!dir.path().join("old.json").exists());
        assert!(!dir.path().join("broken.json").exists());
        assert!(dir.path().join("fresh.json").exists());
        assert!(dir.path().join("notes.txt").exists());
        assert!(store.locks.is_empty());

        let decision = store.admit("fresh", T0 + 10, RateRule::new(2, 10)).await.unwrap();
        assert_eq!(decision.remaining, 0);
        assert_eq!(store.purge(T0 + 30), 1);
    }

    #[tokio::test]
    async fn test_file_store_purge_skips_locked_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.admit("busy", T0, RateRule::new(5, 10)).await.unwrap();

        let lock = Arc::clone(&*store.locks.entry("busy".to_string()).or_default());
        let guard = lock.lock().await;
        assert_eq!(store.purge(T0 + 60), 0);
        assert!(dir.path().join("busy.json").exists());

        drop(guard);
        drop(lock);
        assert_eq!(store.purge(T0 + 60), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_file_store_concurrent_admissions_respect_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        let rule = RateRule::new(5, 60);

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.admit("hot", T0, rule).await.unwrap().allowed })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }
}
