//! Core snapshot reconciliation engine for driftscan.
//!
//! This crate indexes a directory tree into a fingerprint-to-paths
//! [`Snapshot`], reconciles two snapshots into a disjoint [`ChangeReport`]
//! (content changes, moves, removals, copies, new files), and renders that
//! report as human-readable statements. Traversal, hashing, the mtime cache,
//! JSON persistence, and foreign-listing adaptation live here too; the CLI in
//! the root crate is a thin shell over these functions.

pub mod adapter;
pub mod cache;
pub mod fingerprint;
pub mod indexer;
#[cfg(feature = "phash")]
pub mod phash;
pub mod progress;
pub mod reconcile;
pub mod reporting;
pub mod snapshot;

pub use adapter::{read_listing, snapshot_from_listing, AdapterError};
pub use cache::{default_cache_path, mtime_stamp, CacheError, FingerprintCache, MtimeStamp};
pub use fingerprint::{sha1_fingerprint, sha1_of_bytes, FingerprintError};
pub use indexer::{
    count_entries, default_image_extensions, has_image_extension, index, IndexConfig,
    ThreadingMode,
};
#[cfg(feature = "phash")]
pub use phash::{perceptual_fingerprint, PhashError};
pub use reconcile::{reconcile, ChangeReport, ReconciliationAnomaly};
pub use reporting::{print_report, report_lines};
pub use snapshot::{
    default_snapshot_path, read_snapshot, write_snapshot, IndexSnapshot, Snapshot, SnapshotError,
    DEFAULT_SNAPSHOT_NAME,
};
