//! Key-value cache for fetched manifests
//!
//! The resolver persists each successful fetch as a [`CachedManifest`] under a
//! key derived from the package slug. Entries carry an expiry; an expired
//! entry reads as absent.
//!
//! Two stores are provided: [`FileCacheStore`] keeps one JSON file per key on
//! disk and survives across runs; [`MemoryCacheStore`] lives for one process.

use crate::manifest::Manifest;
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Prefix shared by every cache key this crate writes
pub const CACHE_KEY_PREFIX: &str = "globalblocks_updater_";

/// Default time-to-live for a cached manifest (one day)
pub const DEFAULT_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Source of the current time
///
/// Injected so expiry can be tested without sleeping.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<RefCell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(RefCell::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.borrow_mut();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.borrow()
    }
}

/// Key-value store with per-entry time-to-live
pub trait CacheStore {
    /// Live value for `key`, or `None` if missing or expired
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;
}

impl<T: CacheStore + ?Sized> CacheStore for Rc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        (**self).set(key, value, ttl_seconds)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }
}

/// Derive the cache key for a package slug
pub fn cache_key(slug: &str) -> String {
    let digest = Sha256::digest(slug.as_bytes());
    let hex = hex::encode(digest);
    format!("{}{}", CACHE_KEY_PREFIX, &hex[..32])
}

/// A manifest together with the moment it was fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedManifest {
    pub fetched_at: DateTime<Utc>,
    pub manifest: Manifest,
}

impl CachedManifest {
    pub fn new(manifest: Manifest, fetched_at: DateTime<Utc>) -> Self {
        Self {
            fetched_at,
            manifest,
        }
    }

    /// Whether the entry is still within its time-to-live at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl_seconds: u64) -> bool {
        now < expiry(self.fetched_at, ttl_seconds)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    expires_at: DateTime<Utc>,
    value: String,
}

/// `from + ttl_seconds`, saturating at the far future
fn expiry(from: DateTime<Utc>, ttl_seconds: u64) -> DateTime<Utc> {
    i64::try_from(ttl_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| from.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Disk-backed store: `<dir>/<key>.json`
pub struct FileCacheStore {
    dir: PathBuf,
    clock: Rc<dyn Clock>,
}

impl FileCacheStore {
    pub fn new<P: AsRef<Path>>(dir: P, clock: Rc<dyn Clock>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, clock })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.entry_path(key);
        let content = fs::read_to_string(&path).ok()?;

        let entry: StoredEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "discarding unreadable cache entry");
                let _ = fs::remove_file(&path);
                return None;
            }
        };

        if self.clock.now() >= entry.expires_at {
            tracing::debug!(key, "cache entry expired");
            let _ = fs::remove_file(&path);
            return None;
        }

        Some(entry.value)
    }

    fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let entry = StoredEntry {
            expires_at: expiry(self.clock.now(), ttl_seconds),
            value: value.to_string(),
        };

        // Write-then-rename so a concurrent reader never sees a torn file
        let path = self.entry_path(key);
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        fs::write(&tmp, serde_json::to_vec(&entry)?)?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::Io(e)
        })
    }

    fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store with the same expiry semantics as [`FileCacheStore`]
pub struct MemoryCacheStore {
    entries: RefCell<HashMap<String, StoredEntry>>,
    clock: Rc<dyn Clock>,
}

impl MemoryCacheStore {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let mut entries = self.entries.borrow_mut();
        match entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let entry = StoredEntry {
            expires_at: expiry(self.clock.now(), ttl_seconds),
            value: value.to_string(),
        };
        self.entries.borrow_mut().insert(key.to_string(), entry);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}
