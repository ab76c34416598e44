use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

const SNAPSHOT_VERSION: u32 = 1;

/// Default file name for a snapshot stored inside the indexed directory.
pub const DEFAULT_SNAPSHOT_NAME: &str = ".driftscan.json";

/// A fingerprint-to-paths mapping describing directory state at one point in
/// time.
///
/// Each path appears under exactly one fingerprint; a fingerprint with more
/// than one path marks duplicate content. Path lists keep insertion order,
/// which the move-detection stage relies on for its positional pairing. The
/// outer map is ordered only so persisted files and iteration are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: BTreeMap<String, Vec<String>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `path` to the path list of `fingerprint`.
    pub fn insert(&mut self, fingerprint: impl Into<String>, path: impl Into<String>) {
        self.entries
            .entry(fingerprint.into())
            .or_default()
            .push(path.into());
    }

    pub fn contains_fingerprint(&self, fingerprint: &str) -> bool {
        self.entries.contains_key(fingerprint)
    }

    pub fn paths(&self, fingerprint: &str) -> Option<&[String]> {
        self.entries.get(fingerprint).map(Vec::as_slice)
    }

    /// First path recorded for `fingerprint`, in insertion order.
    pub fn first_path(&self, fingerprint: &str) -> Option<&str> {
        self.entries
            .get(fingerprint)
            .and_then(|paths| paths.first())
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.entries.iter()
    }

    pub fn fingerprint_count(&self) -> usize {
        self.entries.len()
    }

    /// Total number of paths across all fingerprints.
    pub fn path_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds a path-to-fingerprint index over the current contents.
    pub fn reverse_index(&self) -> FxHashMap<&str, &str> {
        let mut index = FxHashMap::default();
        for (fingerprint, paths) in &self.entries {
            for path in paths {
                index.insert(path.as_str(), fingerprint.as_str());
            }
        }
        index
    }
}

/// Versioned on-disk envelope for a [`Snapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub version: u32,
    pub generated_at: String,
    pub root: PathBuf,
    pub entries: Snapshot,
}

impl IndexSnapshot {
    pub fn new(root: PathBuf, entries: Snapshot) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            generated_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| String::from("unknown")),
            root,
            entries,
        }
    }
}

pub fn write_snapshot<P: AsRef<Path>>(
    snapshot: &IndexSnapshot,
    path: P,
) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| SnapshotError::Io {
                source,
                path: parent.to_path_buf(),
            })?;
        }
    }
    let file = File::create(path).map_err(|source| SnapshotError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, snapshot).map_err(SnapshotError::Serialization)
}

pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<IndexSnapshot, SnapshotError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| SnapshotError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let reader = BufReader::new(file);
    let snapshot: IndexSnapshot =
        serde_json::from_reader(reader).map_err(SnapshotError::Serialization)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: snapshot.version,
            supported: SNAPSHOT_VERSION,
        });
    }
    Ok(snapshot)
}

/// Default snapshot location for `root`.
pub fn default_snapshot_path(root: &Path) -> PathBuf {
    root.join(DEFAULT_SNAPSHOT_NAME)
}

#[derive(Debug)]
pub enum SnapshotError {
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    Serialization(serde_json::Error),
    UnsupportedVersion {
        found: u32,
        supported: u32,
    },
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { source, path } => write!(f, "io error for {}: {}", path.display(), source),
            Self::Serialization(error) => write!(f, "serialization error: {}", error),
            Self::UnsupportedVersion { found, supported } => write!(
                f,
                "unsupported snapshot version {} (supported: {})",
                found, supported
            ),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialization(error) => Some(error),
            Self::UnsupportedVersion { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert("h1", "a.txt");
        snapshot.insert("h1", "b.txt");
        snapshot.insert("h2", "c.txt");
        snapshot
    }

    #[test]
    fn insert_preserves_path_order() {
        let snapshot = sample_snapshot();
        assert_eq!(
            snapshot.paths("h1").unwrap(),
            &[String::from("a.txt"), String::from("b.txt")]
        );
        assert_eq!(snapshot.first_path("h1"), Some("a.txt"));
        assert_eq!(snapshot.path_count(), 3);
        assert_eq!(snapshot.fingerprint_count(), 2);
    }

    #[test]
    fn reverse_index_maps_every_path() {
        let snapshot = sample_snapshot();
        let index = snapshot.reverse_index();
        assert_eq!(index.get("a.txt"), Some(&"h1"));
        assert_eq!(index.get("b.txt"), Some(&"h1"));
        assert_eq!(index.get("c.txt"), Some(&"h2"));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn writes_and_reads_snapshot() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("index.json");
        let snapshot = IndexSnapshot::new(PathBuf::from("/photos"), sample_snapshot());
        write_snapshot(&snapshot, &output).unwrap();
        let loaded = read_snapshot(&output).unwrap();
        assert_eq!(loaded.version, SNAPSHOT_VERSION);
        assert_eq!(loaded.root, PathBuf::from("/photos"));
        assert_eq!(loaded.entries, snapshot.entries);
    }

    #[test]
    fn rejects_unsupported_version() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("index.json");
        let mut snapshot = IndexSnapshot::new(PathBuf::from("/photos"), sample_snapshot());
        snapshot.version = 99;
        write_snapshot(&snapshot, &output).unwrap();
        let result = read_snapshot(&output);
        assert!(matches!(
            result,
            Err(SnapshotError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn read_reports_missing_file_path() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        match read_snapshot(&missing) {
            Err(SnapshotError::Io { path, .. }) => assert_eq!(path, missing),
            Err(other) => panic!("expected io error, got {}", other),
            Ok(_) => panic!("expected io error, got a snapshot"),
        }
    }
}
