//! Modification-time keyed fingerprint cache.
//!
//! Re-hashing an unchanged tree is the expensive part of indexing, so the
//! indexer may trust a cached fingerprint whenever a file's modification time
//! is byte-for-byte identical to the one recorded at the previous scan.
//! Known tradeoff: mtime granularity can be as coarse as a full second on
//! some filesystems, so two content changes landing inside one granularity
//! window keep the stale fingerprint until the next touch.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds and subsecond nanos since the Unix epoch.
pub type MtimeStamp = (u64, u32);

/// Converts a filesystem timestamp into the cache's stamp form. Pre-epoch
/// timestamps are treated as uncacheable.
pub fn mtime_stamp(time: SystemTime) -> Option<MtimeStamp> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|duration| (duration.as_secs(), duration.subsec_nanos()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    mtime: MtimeStamp,
    fingerprint: String,
}

/// Per-path fingerprint cache persisted between scans.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FingerprintCache {
    entries: FxHashMap<String, CacheEntry>,
}

impl FingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached fingerprint for `path` only when `mtime` matches
    /// the recorded stamp exactly.
    pub fn lookup(&self, path: &str, mtime: MtimeStamp) -> Option<&str> {
        self.entries
            .get(path)
            .filter(|entry| entry.mtime == mtime)
            .map(|entry| entry.fingerprint.as_str())
    }

    /// Records `fingerprint` for `path`, replacing any previous entry.
    pub fn record(&mut self, path: impl Into<String>, mtime: MtimeStamp, fingerprint: String) {
        self.entries
            .insert(path.into(), CacheEntry { mtime, fingerprint });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loads a cache from `path`; a missing file yields an empty cache.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(CacheError::Io {
                    source,
                    path: path.to_path_buf(),
                })
            }
        };
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(CacheError::Serialization)
    }

    pub fn store<P: AsRef<Path>>(&self, path: P) -> Result<(), CacheError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                    source,
                    path: parent.to_path_buf(),
                })?;
            }
        }
        let file = File::create(path).map_err(|source| CacheError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        let writer = BufWriter::new(file);
        serde_json::to_writer(writer, self).map_err(CacheError::Serialization)
    }
}

/// Default cache location under the platform data directory.
pub fn default_cache_path() -> Option<PathBuf> {
    let mut dir = dirs::data_local_dir()?;
    dir.push("driftscan");
    dir.push("cache");
    dir.push("fingerprints.json");
    Some(dir)
}

#[derive(Debug)]
pub enum CacheError {
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    Serialization(serde_json::Error),
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { source, path } => write!(f, "io error for {}: {}", path.display(), source),
            Self::Serialization(error) => write!(f, "serialization error: {}", error),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialization(error) => Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lookup_hits_only_on_matching_mtime() {
        let mut cache = FingerprintCache::new();
        cache.record("a.txt", (100, 5), String::from("h1"));
        assert_eq!(cache.lookup("a.txt", (100, 5)), Some("h1"));
        assert_eq!(cache.lookup("a.txt", (100, 6)), None);
        assert_eq!(cache.lookup("a.txt", (101, 5)), None);
        assert_eq!(cache.lookup("b.txt", (100, 5)), None);
    }

    #[test]
    fn record_replaces_previous_entry() {
        let mut cache = FingerprintCache::new();
        cache.record("a.txt", (100, 0), String::from("h1"));
        cache.record("a.txt", (200, 0), String::from("h2"));
        assert_eq!(cache.lookup("a.txt", (100, 0)), None);
        assert_eq!(cache.lookup("a.txt", (200, 0)), Some("h2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn stores_and_loads_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = FingerprintCache::new();
        cache.record("a.txt", (100, 1), String::from("h1"));
        cache.record("b.txt", (200, 2), String::from("h2"));
        cache.store(&path).unwrap();
        let loaded = FingerprintCache::load(&path).unwrap();
        assert_eq!(loaded.lookup("a.txt", (100, 1)), Some("h1"));
        assert_eq!(loaded.lookup("b.txt", (200, 2)), Some("h2"));
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn loading_missing_file_yields_empty_cache() {
        let dir = tempdir().unwrap();
        let cache = FingerprintCache::load(dir.path().join("absent.json")).unwrap();
        assert!(cache.is_empty());
    }
}
