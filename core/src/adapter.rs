//! Adapts foreign file listings into the canonical [`Snapshot`] shape.
//!
//! Supported input is the rclone `lsjson --hash` format: a JSON array of
//! objects carrying `Path`, `IsDir`, and a `Hashes` map. Only the SHA-1 hash
//! is consumed; directories are skipped; a file entry without a SHA-1 hash is
//! rejected so the reconciler never sees a half-fingerprinted snapshot.

use crate::snapshot::Snapshot;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

const SHA1_KEY: &str = "sha1";

#[derive(Debug, Deserialize)]
struct ListingEntry {
    #[serde(rename = "Path")]
    path: String,
    #[serde(rename = "IsDir", default)]
    is_dir: bool,
    #[serde(rename = "Hashes", default)]
    hashes: BTreeMap<String, String>,
}

/// Parses a listing document into a [`Snapshot`].
pub fn snapshot_from_listing(document: &str) -> Result<Snapshot, AdapterError> {
    let entries: Vec<ListingEntry> =
        serde_json::from_str(document).map_err(AdapterError::Schema)?;
    adapt_entries(entries)
}

fn adapt_entries(entries: Vec<ListingEntry>) -> Result<Snapshot, AdapterError> {
    let mut snapshot = Snapshot::new();
    for entry in entries {
        if entry.is_dir {
            continue;
        }
        let fingerprint = entry
            .hashes
            .get(SHA1_KEY)
            .ok_or_else(|| AdapterError::MissingHash {
                path: entry.path.clone(),
            })?;
        snapshot.insert(fingerprint.to_lowercase(), entry.path);
    }
    Ok(snapshot)
}

/// Reads and adapts a listing file from disk.
pub fn read_listing<P: AsRef<Path>>(path: P) -> Result<Snapshot, AdapterError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| AdapterError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let reader = BufReader::new(file);
    let entries: Vec<ListingEntry> =
        serde_json::from_reader(reader).map_err(AdapterError::Schema)?;
    adapt_entries(entries)
}

#[derive(Debug)]
pub enum AdapterError {
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    Schema(serde_json::Error),
    MissingHash {
        path: String,
    },
}

impl Display for AdapterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { source, path } => write!(f, "io error for {}: {}", path.display(), source),
            Self::Schema(error) => write!(f, "listing does not match the expected schema: {}", error),
            Self::MissingHash { path } => {
                write!(f, "listing entry {} carries no sha1 hash", path)
            }
        }
    }
}

impl Error for AdapterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Schema(error) => Some(error),
            Self::MissingHash { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapts_listing_with_duplicates() {
        let document = r#"[
            {"Path": "photos/a.jpg", "Size": 10, "IsDir": false,
             "Hashes": {"sha1": "AA11", "md5": "zz"}},
            {"Path": "photos", "IsDir": true},
            {"Path": "photos/b.jpg", "Size": 10, "IsDir": false,
             "Hashes": {"sha1": "aa11"}},
            {"Path": "notes.txt", "Size": 3, "IsDir": false,
             "Hashes": {"sha1": "bb22"}}
        ]"#;
        let snapshot = snapshot_from_listing(document).unwrap();
        assert_eq!(
            snapshot.paths("aa11").unwrap(),
            &[String::from("photos/a.jpg"), String::from("photos/b.jpg")]
        );
        assert_eq!(snapshot.paths("bb22").unwrap(), &[String::from("notes.txt")]);
        assert_eq!(snapshot.path_count(), 3);
    }

    #[test]
    fn rejects_file_without_sha1() {
        let document = r#"[
            {"Path": "a.jpg", "IsDir": false, "Hashes": {"md5": "zz"}}
        ]"#;
        match snapshot_from_listing(document) {
            Err(AdapterError::MissingHash { path }) => assert_eq!(path, "a.jpg"),
            other => panic!("expected missing hash error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_foreign_shape() {
        let document = r#"{"files": []}"#;
        assert!(matches!(
            snapshot_from_listing(document),
            Err(AdapterError::Schema(_))
        ));
    }

    #[test]
    fn empty_listing_yields_empty_snapshot() {
        let snapshot = snapshot_from_listing("[]").unwrap();
        assert!(snapshot.is_empty());
    }
}
