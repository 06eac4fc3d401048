//! Directory-backed key/value store for reference data and order snapshots.
//!
//! Every key maps to one JSON file holding `{cached_at, data}`. Entries live
//! until they outgrow the optional TTL or are invalidated explicitly.

use std::{
    fmt, fs, io,
    path::PathBuf,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{LocationId, RegionId, SystemId, TypeId};

const ENTRY_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("cache entry {key} is corrupted: {reason}")]
    Corrupted { key: String, reason: String },
    #[error("invalid cache key: {0:?}")]
    InvalidKey(String),
}

/// Key scheme shared by every cached payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Item(TypeId),
    System(SystemId),
    Station(LocationId),
    Region(RegionId),
    RegionList,
    Route(SystemId, SystemId),
    /// Full order book snapshot of a region.
    Market(RegionId),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item(id) => write!(f, "item-{id}"),
            Self::System(id) => write!(f, "system-{id}"),
            Self::Station(id) => write!(f, "station-{id}"),
            Self::Region(id) => write!(f, "region-{id}"),
            Self::RegionList => f.write_str("regions"),
            Self::Route(source, destination) => write!(f, "route-{source}-{destination}"),
            Self::Market(id) => write!(f, "market-{id}"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry<T> {
    /// Unix timestamp (seconds) of the write.
    cached_at: u64,
    data: T,
}

#[derive(Clone, Debug)]
pub struct DiskStore {
    root: PathBuf,
    ttl: Option<Duration>,
}

impl DiskStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, ttl: None })
    }

    /// Entries older than `ttl` read as missing.
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// `Ok(None)` for a missing or expired entry; `Corrupted` when the file
    /// exists but does not decode as `T`.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let path = self.entry_path(key)?;
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let entry: StoredEntry<T> =
            serde_json::from_slice(&raw).map_err(|err| StoreError::Corrupted {
                key: key.to_string(),
                reason: err.to_string(),
            })?;

        if let Some(ttl) = self.ttl {
            let age = Duration::from_secs(unix_now().saturating_sub(entry.cached_at));
            if age > ttl {
                debug!(key, age_secs = age.as_secs(), "cache entry expired");
                return Ok(None);
            }
        }

        Ok(Some(entry.data))
    }

    /// Write through a uniquely named temp file so concurrent writers of the
    /// same key never leave a half-written entry behind.
    pub fn write<T: Serialize>(&self, key: &str, data: &T) -> Result<(), StoreError> {
        let path = self.entry_path(key)?;
        let entry = StoredEntry {
            cached_at: unix_now(),
            data,
        };
        let content = serde_json::to_vec(&entry)?;

        let tmp = self.root.join(format!(".{key}.{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, content)?;
        if let Err(err) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }

    /// Drop one entry. Returns whether anything was removed.
    pub fn invalidate(&self, key: &str) -> Result<bool, StoreError> {
        match fs::remove_file(self.entry_path(key)?) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Drop every entry. Returns the number of entries removed.
    pub fn clear(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for dir_entry in fs::read_dir(&self.root)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) => warn!(path = %path.display(), error = %err, "failed to remove cache entry"),
            }
        }
        Ok(removed)
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.{ENTRY_EXTENSION}")))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
