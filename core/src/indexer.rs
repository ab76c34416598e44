use crate::cache::{mtime_stamp, FingerprintCache};
use crate::fingerprint::sha1_fingerprint;
use crate::snapshot::Snapshot;
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadingMode {
    Parallel,
    Sequential,
}

/// Parameters that control how the indexing pipeline behaves.
#[derive(Clone, Debug)]
pub struct IndexConfig {
    pub threading: ThreadingMode,
    /// Paths skipped during traversal, e.g. the snapshot file that lives
    /// inside the indexed tree. Matching is by canonicalized path, so the
    /// spelling does not have to match the walked form.
    pub excluded: Vec<PathBuf>,
    /// When true, files matching `image_extensions` are fingerprinted with
    /// the rotation-invariant perceptual hash instead of SHA-1. Requires a
    /// build with the `phash` feature to take effect.
    pub perceptual_images: bool,
    pub image_extensions: Vec<String>,
}

impl IndexConfig {
    pub fn new(threading: ThreadingMode) -> Self {
        Self {
            threading,
            excluded: Vec::new(),
            perceptual_images: false,
            image_extensions: Vec::new(),
        }
    }

    pub fn with_excluded(mut self, path: PathBuf) -> Self {
        self.excluded.push(path);
        self
    }

    pub fn with_perceptual_images(mut self, extensions: Vec<String>) -> Self {
        self.perceptual_images = true;
        self.image_extensions = extensions;
        self
    }
}

/// Extensions treated as images when perceptual fingerprinting is enabled.
pub fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "gif".to_string(),
        "bmp".to_string(),
    ]
}

pub fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let lower = ext.to_lowercase();
            extensions.iter().any(|candidate| candidate == &lower)
        })
        .unwrap_or(false)
}

pub fn count_entries(root: &Path) -> u64 {
    WalkDir::new(root).into_iter().count() as u64
}

/// Walks `root` and fingerprints every regular file into a [`Snapshot`].
///
/// Unreadable files are skipped with a progress message rather than aborting
/// the scan. When a cache is supplied, files whose modification time matches
/// the cached stamp reuse the recorded fingerprint instead of re-hashing.
pub fn index(
    root: &Path,
    config: &IndexConfig,
    progress_bar: &Arc<ProgressBar>,
    cache: Option<&Mutex<FingerprintCache>>,
) -> Snapshot {
    let excluded: Vec<PathBuf> = config
        .excluded
        .iter()
        .map(|path| std::fs::canonicalize(path).unwrap_or_else(|_| path.clone()))
        .collect();

    let records = match config.threading {
        ThreadingMode::Parallel => WalkDir::new(root)
            .into_iter()
            .par_bridge()
            .filter_map(|entry| handle_entry(entry, config, &excluded, progress_bar, cache))
            .fold(Vec::new, |mut collection, record| {
                collection.push(record);
                collection
            })
            .reduce(Vec::new, |mut left, mut right| {
                left.append(&mut right);
                left
            }),
        ThreadingMode::Sequential => WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| handle_entry(entry, config, &excluded, progress_bar, cache))
            .collect(),
    };

    let mut snapshot = Snapshot::new();
    for FileRecord { fingerprint, path } in records {
        snapshot.insert(fingerprint, path);
    }
    snapshot
}

struct FileRecord {
    fingerprint: String,
    path: String,
}

fn handle_entry(
    entry: Result<walkdir::DirEntry, walkdir::Error>,
    config: &IndexConfig,
    excluded: &[PathBuf],
    progress_bar: &Arc<ProgressBar>,
    cache: Option<&Mutex<FingerprintCache>>,
) -> Option<FileRecord> {
    progress_bar.inc(1);
    let entry = match entry {
        Ok(entry) => entry,
        Err(error) => {
            progress_bar.set_message(format!("Error: {}", error));
            return None;
        }
    };
    let path = entry.path();
    if !path.is_file() || is_excluded(path, excluded) {
        return None;
    }
    progress_bar.set_message(format!("Indexing: {}", path.display()));

    let path_string = path.to_string_lossy().into_owned();
    let mtime = entry
        .metadata()
        .ok()
        .and_then(|metadata| metadata.modified().ok())
        .and_then(mtime_stamp);

    if let (Some(cache), Some(mtime)) = (cache, mtime) {
        if let Ok(guard) = cache.lock() {
            if let Some(fingerprint) = guard.lookup(&path_string, mtime) {
                return Some(FileRecord {
                    fingerprint: fingerprint.to_string(),
                    path: path_string,
                });
            }
        }
    }

    let fingerprint = match compute_fingerprint(path, config) {
        Ok(fingerprint) => fingerprint,
        Err(message) => {
            progress_bar.set_message(format!("Skipping {}: {}", path.display(), message));
            return None;
        }
    };

    if let (Some(cache), Some(mtime)) = (cache, mtime) {
        if let Ok(mut guard) = cache.lock() {
            guard.record(path_string.clone(), mtime, fingerprint.clone());
        }
    }

    Some(FileRecord {
        fingerprint,
        path: path_string,
    })
}

fn is_excluded(path: &Path, excluded: &[PathBuf]) -> bool {
    if excluded.is_empty() {
        return false;
    }
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    excluded.iter().any(|entry| *entry == canonical)
}

/// Selects the fingerprint provider for `path`: the perceptual hash for
/// image files when enabled, the SHA-1 content hash otherwise.
#[cfg(feature = "phash")]
fn compute_fingerprint(path: &Path, config: &IndexConfig) -> Result<String, String> {
    if config.perceptual_images && has_image_extension(path, &config.image_extensions) {
        return crate::phash::perceptual_fingerprint(path).map_err(|error| error.to_string());
    }
    sha1_fingerprint(path).map_err(|error| error.to_string())
}

#[cfg(not(feature = "phash"))]
fn compute_fingerprint(path: &Path, _config: &IndexConfig) -> Result<String, String> {
    sha1_fingerprint(path).map_err(|error| error.to_string())
}

#[cfg(all(test, feature = "phash"))]
mod phash_tests {
    use super::*;
    use crate::fingerprint::sha1_of_bytes;
    use indicatif::ProgressBar;
    use opencv::core::{self, Rect, Scalar};
    use opencv::imgcodecs;
    use opencv::imgproc;
    use opencv::prelude::*;
    use opencv::types::VectorOfi32;
    use std::fs;
    use tempfile::tempdir;

    fn write_portrait_pattern(path: &Path) {
        let mut image =
            core::Mat::new_rows_cols_with_default(128, 96, core::CV_8UC1, Scalar::from(0.0))
                .unwrap();
        let color = Scalar::from(255.0);
        let rect = Rect::new(8, 8, 40, 56);
        imgproc::rectangle(&mut image, rect, color, imgproc::FILLED, imgproc::LINE_8, 0).unwrap();
        let params = VectorOfi32::new();
        imgcodecs::imwrite(path.to_string_lossy().as_ref(), &image, &params).unwrap();
    }

    fn write_quarter_turned_copy(source: &Path, target: &Path) {
        let image = imgcodecs::imread(
            source.to_string_lossy().as_ref(),
            imgcodecs::IMREAD_GRAYSCALE,
        )
        .unwrap();
        let mut rotated = core::Mat::default();
        core::rotate(&image, &mut rotated, core::ROTATE_90_CLOCKWISE).unwrap();
        let params = VectorOfi32::new();
        imgcodecs::imwrite(target.to_string_lossy().as_ref(), &rotated, &params).unwrap();
    }

    #[test]
    fn perceptual_provider_unifies_rotated_images() {
        let dir = tempdir().unwrap();
        let upright = dir.path().join("upright.png");
        let turned = dir.path().join("turned.png");
        write_portrait_pattern(&upright);
        write_quarter_turned_copy(&upright, &turned);
        fs::write(dir.path().join("notes.txt"), b"plain text").unwrap();

        let config = IndexConfig::new(ThreadingMode::Sequential)
            .with_perceptual_images(default_image_extensions());
        let snapshot = index(dir.path(), &config, &Arc::new(ProgressBar::hidden()), None);

        // Both image spellings collapse to one perceptual fingerprint,
        // while the text file keeps its SHA-1.
        assert_eq!(snapshot.path_count(), 3);
        assert_eq!(snapshot.fingerprint_count(), 2);
        assert!(snapshot.contains_fingerprint(&sha1_of_bytes(b"plain text")));
    }

    #[test]
    fn images_keep_sha1_when_perceptual_is_disabled() {
        let dir = tempdir().unwrap();
        let upright = dir.path().join("upright.png");
        let turned = dir.path().join("turned.png");
        write_portrait_pattern(&upright);
        write_quarter_turned_copy(&upright, &turned);

        let config = IndexConfig::new(ThreadingMode::Sequential);
        let snapshot = index(dir.path(), &config, &Arc::new(ProgressBar::hidden()), None);

        assert_eq!(snapshot.fingerprint_count(), 2);
        let upright_bytes = fs::read(&upright).unwrap();
        assert!(snapshot.contains_fingerprint(&sha1_of_bytes(&upright_bytes)));
    }
}
