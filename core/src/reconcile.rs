//! Snapshot reconciliation pipeline.
//!
//! Five ordered stages each strip one category of resolved change from a pair
//! of working snapshots, leaving ever-smaller residuals: exact matches first,
//! then in-place content changes, moves, removals, and finally copies or new
//! files. The stages thread an explicit `(residual_current, residual_baseline)`
//! pair; the untouched baseline is kept aside because the copy/new stage must
//! ask whether content existed before any stripping happened.

use crate::snapshot::Snapshot;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Classified outcome of one reconciliation run.
///
/// Every path present in either input snapshot lands in exactly one category
/// (or in none, when it is unchanged). Category maps are ordered so rendering
/// is deterministic; path lists and move pairs keep pipeline order. Both
/// residuals are retained for inspection and are empty for well-formed input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeReport {
    /// path -> (old fingerprint, new fingerprint)
    pub content_changes: BTreeMap<String, (String, String)>,
    /// fingerprint -> (old path, new path) pairs in pairing order
    pub moves: BTreeMap<String, Vec<(String, String)>>,
    /// fingerprint -> paths present only in the baseline
    pub removals: BTreeMap<String, Vec<String>>,
    /// For removed fingerprints whose content still exists in the current
    /// snapshot: the surviving paths. Absent keys mean the content is gone.
    pub survivors: BTreeMap<String, Vec<String>>,
    /// fingerprint -> (source path, destination paths)
    pub copies: BTreeMap<String, (String, Vec<String>)>,
    /// fingerprint -> paths with no trace in the original baseline
    pub new_files: BTreeMap<String, Vec<String>>,
    pub residual_current: Snapshot,
    pub residual_baseline: Snapshot,
}

impl ChangeReport {
    /// True when the run classified no changes at all.
    pub fn is_empty(&self) -> bool {
        self.content_changes.is_empty()
            && self.moves.is_empty()
            && self.removals.is_empty()
            && self.copies.is_empty()
            && self.new_files.is_empty()
            && self.residual_current.is_empty()
            && self.residual_baseline.is_empty()
    }

    /// Number of classified change entries across all categories.
    pub fn change_count(&self) -> usize {
        self.content_changes.len()
            + self.moves.values().map(Vec::len).sum::<usize>()
            + self.removals.values().map(Vec::len).sum::<usize>()
            + self.copies.values().map(|(_, paths)| paths.len()).sum::<usize>()
            + self.new_files.values().map(Vec::len).sum::<usize>()
    }
}

/// A fingerprint that survived into both residuals after every stage ran.
///
/// The earlier stages guarantee this cannot happen for well-formed input, so
/// hitting it means either a pipeline defect or an input snapshot that maps
/// one path under two fingerprints. Callers decide whether to log and
/// continue or abort; the pipeline itself never panics on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationAnomaly {
    pub fingerprint: String,
    pub current_paths: Vec<String>,
    pub baseline_paths: Vec<String>,
}

impl Display for ReconciliationAnomaly {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fingerprint {} is present in both residual snapshots after classification \
             (current paths: [{}], baseline paths: [{}])",
            self.fingerprint,
            self.current_paths.join(", "),
            self.baseline_paths.join(", ")
        )
    }
}

impl Error for ReconciliationAnomaly {}

/// Runs the full pipeline over `current` and `baseline`.
///
/// Inputs are not mutated; the stages work on stripped copies. Returns the
/// assembled [`ChangeReport`], or a [`ReconciliationAnomaly`] when the final
/// stage finds a fingerprint in both residuals.
pub fn reconcile(
    current: &Snapshot,
    baseline: &Snapshot,
) -> Result<ChangeReport, ReconciliationAnomaly> {
    let (residual_current, residual_baseline) = strip_unchanged(current, baseline);
    let (residual_current, residual_baseline, content_changes) =
        strip_content_changes(&residual_current, &residual_baseline);
    let (residual_current, residual_baseline, moves) =
        strip_moves(&residual_current, &residual_baseline);
    let (residual_current, residual_baseline, removals) =
        strip_removals(&residual_current, &residual_baseline);
    let (residual_current, residual_baseline, copies, new_files) =
        strip_copy_or_new(&residual_current, &residual_baseline, baseline)?;

    // Removal classification happens here, against the original current
    // snapshot: the surviving duplicates were already stripped from the
    // residual as unchanged, so only the un-stripped snapshot can tell a
    // duplicate removal from a true one.
    let mut survivors = BTreeMap::new();
    for fingerprint in removals.keys() {
        if let Some(paths) = current.paths(fingerprint) {
            survivors.insert(fingerprint.clone(), paths.to_vec());
        }
    }

    Ok(ChangeReport {
        content_changes,
        moves,
        removals,
        survivors,
        copies,
        new_files,
        residual_current,
        residual_baseline,
    })
}

/// Stage 1: drops every path that sits under the same fingerprint in both
/// snapshots. Per-path, not per-fingerprint: surviving duplicates stay.
pub(crate) fn strip_unchanged(current: &Snapshot, baseline: &Snapshot) -> (Snapshot, Snapshot) {
    let keep = |residual: &Snapshot, other: &Snapshot| {
        let mut stripped = Snapshot::new();
        for (fingerprint, paths) in residual.iter() {
            for path in paths {
                let matched = other
                    .paths(fingerprint)
                    .map(|other_paths| other_paths.contains(path))
                    .unwrap_or(false);
                if !matched {
                    stripped.insert(fingerprint.clone(), path.clone());
                }
            }
        }
        stripped
    };
    (keep(current, baseline), keep(baseline, current))
}

/// Stage 2: a baseline path that reappears in the current residual under a
/// different fingerprint changed its contents in place. The path leaves both
/// residuals; exact path-string equality is required on both sides.
pub(crate) fn strip_content_changes(
    current: &Snapshot,
    baseline: &Snapshot,
) -> (Snapshot, Snapshot, BTreeMap<String, (String, String)>) {
    let current_index = current.reverse_index();
    let mut content_changes = BTreeMap::new();
    for (fingerprint, paths) in baseline.iter() {
        for path in paths {
            if let Some(&new_fingerprint) = current_index.get(path.as_str()) {
                if new_fingerprint != fingerprint.as_str() {
                    content_changes.insert(
                        path.clone(),
                        (fingerprint.clone(), new_fingerprint.to_string()),
                    );
                }
            }
        }
    }

    let without_changed = |residual: &Snapshot| {
        let mut stripped = Snapshot::new();
        for (fingerprint, paths) in residual.iter() {
            for path in paths {
                if !content_changes.contains_key(path) {
                    stripped.insert(fingerprint.clone(), path.clone());
                }
            }
        }
        stripped
    };
    (
        without_changed(current),
        without_changed(baseline),
        content_changes,
    )
}

/// Stage 3: for a fingerprint alive in both residuals, pair baseline and
/// current paths positionally up to the shorter list length.
///
/// This is a heuristic over the traversal insertion order, not an optimal
/// matching: with duplicates on both sides any permutation would be equally
/// valid, and the excess of the longer list is left for the removal and
/// copy/new stages.
pub(crate) fn strip_moves(
    current: &Snapshot,
    baseline: &Snapshot,
) -> (Snapshot, Snapshot, BTreeMap<String, Vec<(String, String)>>) {
    let mut moves: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for (fingerprint, old_paths) in baseline.iter() {
        if let Some(new_paths) = current.paths(fingerprint) {
            let paired = old_paths.len().min(new_paths.len());
            for i in 0..paired {
                moves
                    .entry(fingerprint.clone())
                    .or_default()
                    .push((old_paths[i].clone(), new_paths[i].clone()));
            }
        }
    }

    let mut stripped_baseline = Snapshot::new();
    for (fingerprint, paths) in baseline.iter() {
        let paired = moves.get(fingerprint).map(Vec::len).unwrap_or(0);
        for path in paths.iter().skip(paired) {
            stripped_baseline.insert(fingerprint.clone(), path.clone());
        }
    }
    let mut stripped_current = Snapshot::new();
    for (fingerprint, paths) in current.iter() {
        let paired = moves.get(fingerprint).map(Vec::len).unwrap_or(0);
        for path in paths.iter().skip(paired) {
            stripped_current.insert(fingerprint.clone(), path.clone());
        }
    }
    (stripped_current, stripped_baseline, moves)
}

/// Stage 4: fingerprints left only in the baseline residual are removals.
/// Whether the content survives elsewhere is decided at report assembly,
/// against the original current snapshot.
pub(crate) fn strip_removals(
    current: &Snapshot,
    baseline: &Snapshot,
) -> (Snapshot, Snapshot, BTreeMap<String, Vec<String>>) {
    let mut removals = BTreeMap::new();
    let mut stripped_baseline = Snapshot::new();
    for (fingerprint, paths) in baseline.iter() {
        if current.contains_fingerprint(fingerprint) {
            for path in paths {
                stripped_baseline.insert(fingerprint.clone(), path.clone());
            }
        } else {
            removals.insert(fingerprint.clone(), paths.clone());
        }
    }
    (current.clone(), stripped_baseline, removals)
}

type CopyOrNew = (
    Snapshot,
    Snapshot,
    BTreeMap<String, (String, Vec<String>)>,
    BTreeMap<String, Vec<String>>,
);

/// Stage 5: fingerprints left only in the current residual are copies when
/// the content existed in the original baseline, otherwise new files.
///
/// A fingerprint still present in both residuals is unreachable for
/// well-formed input and is surfaced as an anomaly instead of a panic.
pub(crate) fn strip_copy_or_new(
    current: &Snapshot,
    baseline: &Snapshot,
    original_baseline: &Snapshot,
) -> Result<CopyOrNew, ReconciliationAnomaly> {
    let mut copies = BTreeMap::new();
    let mut new_files = BTreeMap::new();
    for (fingerprint, paths) in current.iter() {
        if let Some(baseline_paths) = baseline.paths(fingerprint) {
            return Err(ReconciliationAnomaly {
                fingerprint: fingerprint.clone(),
                current_paths: paths.clone(),
                baseline_paths: baseline_paths.to_vec(),
            });
        }
        match original_baseline.first_path(fingerprint) {
            Some(source) => {
                copies.insert(fingerprint.clone(), (source.to_string(), paths.clone()));
            }
            None => {
                new_files.insert(fingerprint.clone(), paths.clone());
            }
        }
    }

    // Every current entry was classified, so the current residual empties out;
    // the baseline residual passes through untouched.
    let mut stripped_current = Snapshot::new();
    for (fingerprint, paths) in current.iter() {
        if !copies.contains_key(fingerprint) && !new_files.contains_key(fingerprint) {
            for path in paths {
                stripped_current.insert(fingerprint.clone(), path.clone());
            }
        }
    }
    Ok((stripped_current, baseline.clone(), copies, new_files))
}
