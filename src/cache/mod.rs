//! Durable TTL'd key/value cache
//!
//! A directory of entry files, one per key, with a fixed binary envelope:
//!
//! - magic: [u8; 8]
//! - version: u32
//! - expires_at: i64 (unix seconds)
//! - key_len: u32, key bytes (collision guard for the hashed file name)
//! - payload bytes
//!
//! Writes are synchronous and refresh the TTL; reads return an in-band
//! miss (`Ok(None)`) for absent, expired, or malformed entries. A
//! background compactor sweeps expired entries on an interval. Keys are
//! namespaced by repository root so one cache directory serves many repos.

use crate::core::error::Result;
use lru::LruCache;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Magic bytes identifying repoctx cache entry files
const MAGIC: [u8; 8] = *b"RCXCACHE";

/// Current entry format version
const VERSION: u32 = 1;

/// Default entry time-to-live
pub const DEFAULT_TTL: Duration = Duration::from_secs(72 * 3600);

/// Hot-layer capacity (entries)
const HOT_CAPACITY: usize = 1024;

// =============================================================================
// KEY SCHEME
// =============================================================================

/// `file_context:<repo-root>:<rel-path>`
pub fn file_context_key(root: &Path, rel_path: &str) -> String {
    format!("file_context:{}:{}", root.display(), rel_path)
}

/// `repo_context:<repo-root>`
pub fn repo_context_key(root: &Path) -> String {
    format!("repo_context:{}", root.display())
}

/// `context_graph:<repo-root>`
pub fn context_graph_key(root: &Path) -> String {
    format!("context_graph:{}", root.display())
}

// =============================================================================
// STORE
// =============================================================================

pub struct Store {
    dir: PathBuf,
    ttl: Duration,
    /// In-memory layer over the entry files; values carry their expiry
    hot: Mutex<LruCache<String, (i64, Vec<u8>)>>,
    compactor: Option<CompactorHandle>,
}

struct CompactorHandle {
    shutdown: crossbeam_channel::Sender<()>,
    thread: JoinHandle<()>,
}

impl Store {
    /// Open (or create) a store in `dir` with the default 72 h TTL
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_ttl(dir, DEFAULT_TTL, Duration::from_secs(3600))
    }

    /// Open with explicit TTL and compactor interval
    pub fn with_ttl(dir: impl Into<PathBuf>, ttl: Duration, compact_interval: Duration) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let (shutdown, rx) = crossbeam_channel::bounded::<()>(0);
        let sweep_dir = dir.clone();
        let thread = std::thread::spawn(move || loop {
            match rx.recv_timeout(compact_interval) {
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                    let removed = sweep_expired(&sweep_dir);
                    if removed > 0 {
                        debug!(removed, dir = %sweep_dir.display(), "Cache compaction");
                    }
                }
                _ => break,
            }
        });

        Ok(Self {
            dir,
            ttl,
            hot: Mutex::new(LruCache::new(
                NonZeroUsize::new(HOT_CAPACITY).expect("nonzero capacity"),
            )),
            compactor: Some(CompactorHandle { shutdown, thread }),
        })
    }

    /// Store bytes under a key, refreshing its TTL
    pub fn set(&self, key: &str, payload: &[u8]) -> Result<()> {
        let expires_at = chrono::Utc::now().timestamp() + self.ttl.as_secs() as i64;
        let path = self.entry_path(key);

        let file = std::fs::File::create(&path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&expires_at.to_le_bytes())?;
        writer.write_all(&(key.len() as u32).to_le_bytes())?;
        writer.write_all(key.as_bytes())?;
        writer.write_all(payload)?;
        writer.flush()?;

        self.hot
            .lock()
            .put(key.to_string(), (expires_at, payload.to_vec()));
        Ok(())
    }

    /// Fetch bytes for a key. `Ok(None)` is the distinguished miss signal;
    /// expired or malformed entries are removed and reported as misses.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = chrono::Utc::now().timestamp();

        {
            let mut hot = self.hot.lock();
            if let Some((expires_at, payload)) = hot.get(key) {
                if *expires_at > now {
                    return Ok(Some(payload.clone()));
                }
                hot.pop(key);
            }
        }

        let path = self.entry_path(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match parse_entry(&bytes, key, now) {
            Some(payload) => {
                self.hot.lock().put(
                    key.to_string(),
                    (read_expiry(&bytes).unwrap_or(now), payload.clone()),
                );
                Ok(Some(payload))
            }
            None => {
                let _ = std::fs::remove_file(&path);
                Ok(None)
            }
        }
    }

    /// Serialize a value as JSON and store it
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.set(key, &payload)
    }

    /// Fetch and deserialize a JSON value. A payload that no longer
    /// deserializes counts as a miss, not an error.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(payload) => match serde_json::from_slice(&payload) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!(key, error = %e, "Discarding undecodable cache entry");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Remove a key if present
    pub fn remove(&self, key: &str) -> Result<()> {
        self.hot.lock().pop(key);
        match std::fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let hash = xxhash_rust::xxh3::xxh3_64(key.as_bytes());
        self.dir.join(format!("{:016x}.bin", hash))
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Some(handle) = self.compactor.take() {
            drop(handle.shutdown);
            let _ = handle.thread.join();
        }
    }
}

// =============================================================================
// ENTRY FORMAT
// =============================================================================

const HEADER_LEN: usize = 8 + 4 + 8 + 4;

fn read_expiry(bytes: &[u8]) -> Option<i64> {
    let raw = bytes.get(12..20)?;
    Some(i64::from_le_bytes(raw.try_into().ok()?))
}

/// Validate the envelope and return the payload, or `None` for anything
/// expired, truncated, or belonging to a different key (hash collision).
fn parse_entry(bytes: &[u8], key: &str, now: i64) -> Option<Vec<u8>> {
    if bytes.len() < HEADER_LEN || bytes[..8] != MAGIC {
        return None;
    }
    let version = u32::from_le_bytes(bytes[8..12].try_into().ok()?);
    if version != VERSION {
        return None;
    }
    let expires_at = read_expiry(bytes)?;
    if expires_at <= now {
        return None;
    }
    let key_len = u32::from_le_bytes(bytes[20..24].try_into().ok()?) as usize;
    let key_end = HEADER_LEN.checked_add(key_len)?;
    if bytes.len() < key_end || &bytes[HEADER_LEN..key_end] != key.as_bytes() {
        return None;
    }
    Some(bytes[key_end..].to_vec())
}

/// Remove expired entry files under `dir`, returning how many were removed
pub fn sweep_expired(dir: &Path) -> usize {
    let now = chrono::Utc::now().timestamp();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("bin") {
            continue;
        }
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        let expired = bytes.len() < HEADER_LEN
            || bytes[..8] != MAGIC
            || read_expiry(&bytes).map(|t| t <= now).unwrap_or(true);
        if expired && std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    removed
}

/// Non-fatal cache write: failures are logged and swallowed so the run
/// continues; the next run simply re-analyzes.
pub fn set_json_logged<T: Serialize>(store: &Store, key: &str, value: &T) {
    if let Err(e) = store.set_json(key, value) {
        warn!(key, error = %e, "Cache write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(dir: &Path) -> Store {
        Store::with_ttl(dir, Duration::from_secs(3600), Duration::from_secs(3600)).unwrap()
    }

    #[test]
    fn test_set_get_roundtrip() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.set("k", b"payload").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"payload".to_vec()));
    }

    #[test]
    fn test_miss_is_in_band() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        assert_eq!(store.get("absent").unwrap(), None);
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_removed() {
        let dir = tempdir().unwrap();
        let store =
            Store::with_ttl(dir.path(), Duration::from_secs(0), Duration::from_secs(3600)).unwrap();
        store.set("k", b"v").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        // The disk entry is gone too
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_set_refreshes_ttl() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.set("k", b"v1").unwrap();
        store.set("k", b"v2").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn test_json_roundtrip_and_undecodable_miss() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.set_json("j", &vec![1u32, 2, 3]).unwrap();
        assert_eq!(store.get_json::<Vec<u32>>("j").unwrap(), Some(vec![1, 2, 3]));

        store.set("bad", b"not json").unwrap();
        assert_eq!(store.get_json::<Vec<u32>>("bad").unwrap(), None);
    }

    #[test]
    fn test_corrupted_entry_is_a_miss() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.set("k", b"v").unwrap();
        // Clobber the entry file
        let entry = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        std::fs::write(&entry, b"garbage").unwrap();
        // Drop the hot layer's copy by using a fresh store over the same dir
        drop(store);
        let store = store_reopen(dir.path());
        assert_eq!(store.get("k").unwrap(), None);
    }

    fn store_reopen(dir: &Path) -> Store {
        Store::with_ttl(dir, Duration::from_secs(3600), Duration::from_secs(3600)).unwrap()
    }

    #[test]
    fn test_keys_namespaced_by_repo_root() {
        let a = file_context_key(Path::new("/repo/a"), "src/main.rs");
        let b = file_context_key(Path::new("/repo/b"), "src/main.rs");
        assert_ne!(a, b);
        assert_eq!(a, "file_context:/repo/a:src/main.rs");
        assert_eq!(repo_context_key(Path::new("/r")), "repo_context:/r");
        assert_eq!(context_graph_key(Path::new("/r")), "context_graph:/r");
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let dir = tempdir().unwrap();
        {
            let expired =
                Store::with_ttl(dir.path(), Duration::from_secs(0), Duration::from_secs(3600))
                    .unwrap();
            expired.set("old", b"v").unwrap();
        }
        {
            let live = store_reopen(dir.path());
            live.set("new", b"v").unwrap();
        }
        assert_eq!(sweep_expired(dir.path()), 1);
        let live = store_reopen(dir.path());
        assert_eq!(live.get("new").unwrap(), Some(b"v".to_vec()));
    }
}
