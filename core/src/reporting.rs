//! Human-readable rendering of a [`ChangeReport`].
//!
//! The category order and the per-line wording are a stable contract:
//! downstream tests match on substrings of this output. Categories render
//! as moves, content changes, removals, new files, copies; fingerprints
//! within a category render in sorted order and path lists in stored order.

use crate::reconcile::ChangeReport;

/// Renders `report` as one statement per affected path.
pub fn report_lines(report: &ChangeReport) -> Vec<String> {
    let mut lines = Vec::new();
    for pairs in report.moves.values() {
        for (old_path, new_path) in pairs {
            lines.push(format!("File {} moved to {}.", old_path, new_path));
        }
    }
    for (path, _fingerprints) in &report.content_changes {
        lines.push(format!("File {} changed its contents.", path));
    }
    for (fingerprint, paths) in &report.removals {
        match report.survivors.get(fingerprint) {
            Some(survivors) => {
                for path in paths {
                    lines.push(format!(
                        "File {} was removed, but its content survives at {}.",
                        path,
                        survivors.join(", ")
                    ));
                }
            }
            None => {
                for path in paths {
                    lines.push(format!("File {} was in the index, but is now missing.", path));
                }
            }
        }
    }
    for paths in report.new_files.values() {
        for path in paths {
            lines.push(format!("File {} is new.", path));
        }
    }
    for (source, destinations) in report.copies.values() {
        for destination in destinations {
            lines.push(format!("File {} was copied to {}.", source, destination));
        }
    }
    lines
}

/// Prints the rendered report to stdout.
pub fn print_report(report: &ChangeReport) {
    for line in report_lines(report) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile;
    use crate::snapshot::Snapshot;

    fn snapshot(entries: &[(&str, &[&str])]) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for (fingerprint, paths) in entries {
            for path in *paths {
                snapshot.insert(*fingerprint, *path);
            }
        }
        snapshot
    }

    #[test]
    fn empty_report_renders_no_lines() {
        let state = snapshot(&[("h1", &["a"])]);
        let report = reconcile(&state, &state).unwrap();
        assert!(report_lines(&report).is_empty());
    }

    #[test]
    fn renders_one_line_per_affected_path() {
        let baseline = snapshot(&[
            ("h1", &["renamed_from"]),
            ("h2", &["edited"]),
            ("h3", &["gone"]),
            ("h4", &["src"]),
        ]);
        let current = snapshot(&[
            ("h1", &["renamed_to"]),
            ("h9", &["edited"]),
            ("h4", &["src", "dst1", "dst2"]),
            ("h5", &["fresh"]),
        ]);
        let report = reconcile(&current, &baseline).unwrap();
        let lines = report_lines(&report);
        assert_eq!(lines.len(), 6);
        assert!(lines.contains(&String::from("File renamed_from moved to renamed_to.")));
        assert!(lines.contains(&String::from("File edited changed its contents.")));
        assert!(lines.contains(&String::from("File gone was in the index, but is now missing.")));
        assert!(lines.contains(&String::from("File fresh is new.")));
        assert!(lines.contains(&String::from("File src was copied to dst1.")));
        assert!(lines.contains(&String::from("File src was copied to dst2.")));
    }

    #[test]
    fn categories_render_in_fixed_order() {
        let baseline = snapshot(&[("h1", &["old_name"]), ("h2", &["lost"])]);
        let current = snapshot(&[("h1", &["new_name"]), ("h3", &["fresh"])]);
        let report = reconcile(&current, &baseline).unwrap();
        let lines = report_lines(&report);
        assert_eq!(
            lines,
            vec![
                String::from("File old_name moved to new_name."),
                String::from("File lost was in the index, but is now missing."),
                String::from("File fresh is new."),
            ]
        );
    }

    #[test]
    fn duplicate_removal_names_surviving_copies() {
        let baseline = snapshot(&[("h1", &["a", "b"])]);
        let current = snapshot(&[("h1", &["a"])]);
        let report = reconcile(&current, &baseline).unwrap();
        let lines = report_lines(&report);
        assert_eq!(
            lines,
            vec![String::from(
                "File b was removed, but its content survives at a."
            )]
        );
    }

    #[test]
    fn true_removal_renders_unqualified() {
        let baseline = snapshot(&[("h1", &["only"])]);
        let current = Snapshot::new();
        let report = reconcile(&current, &baseline).unwrap();
        assert_eq!(
            report_lines(&report),
            vec![String::from(
                "File only was in the index, but is now missing."
            )]
        );
    }
}
