mod cli;

use cli::{Command, IndexArgs, ValidateArgs};
use driftscan_core::{
    count_entries, default_cache_path, default_snapshot_path, index, print_report, progress,
    read_listing, read_snapshot, reconcile, write_snapshot, FingerprintCache, IndexConfig,
    IndexSnapshot, Snapshot, ThreadingMode,
};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

fn main() {
    let command = Command::from_env().unwrap_or_else(|err| match err {
        cli::CliError::Help | cli::CliError::Version => {
            println!("{}", err);
            std::process::exit(0);
        }
        _ => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    });

    match command {
        Command::Index(args) => run_index(args),
        Command::Validate(args) => run_validate(args),
    }
}

fn run_index(args: IndexArgs) {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_snapshot_path(&args.root));
    let cache = open_cache(args.use_cache);

    let config = index_config(args.threading, &output, args.perceptual_images);
    let snapshot = scan_directory(&args.root, config, cache.as_ref().map(|(_, mutex)| mutex));

    let envelope = IndexSnapshot::new(args.root.clone(), snapshot);
    match write_snapshot(&envelope, &output) {
        Ok(_) => println!("Index written to {}", output.display()),
        Err(error) => {
            eprintln!("Error writing index to {}: {}", output.display(), error);
            std::process::exit(1);
        }
    }

    persist_cache(cache);
}

fn run_validate(args: ValidateArgs) {
    let baseline_path = args
        .baseline
        .clone()
        .unwrap_or_else(|| default_snapshot_path(&args.root));

    let baseline = if let Some(listing) = args.baseline_listing.as_ref() {
        match read_listing(listing) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                eprintln!("Error reading listing {}: {}", listing.display(), error);
                std::process::exit(1);
            }
        }
    } else {
        match read_snapshot(&baseline_path) {
            Ok(envelope) => envelope.entries,
            Err(error) => {
                eprintln!(
                    "Error reading baseline {}: {}",
                    baseline_path.display(),
                    error
                );
                std::process::exit(1);
            }
        }
    };

    let current = if let Some(path) = args.current.as_ref() {
        match read_snapshot(path) {
            Ok(envelope) => envelope.entries,
            Err(error) => {
                eprintln!("Error reading snapshot {}: {}", path.display(), error);
                std::process::exit(1);
            }
        }
    } else {
        let cache = open_cache(args.use_cache);
        let config = index_config(args.threading, &baseline_path, args.perceptual_images);
        let snapshot = scan_directory(&args.root, config, cache.as_ref().map(|(_, mutex)| mutex));
        persist_cache(cache);
        snapshot
    };

    match reconcile(&current, &baseline) {
        Ok(report) => {
            if report.is_empty() {
                println!("No changes detected.");
            } else {
                print_report(&report);
            }
        }
        Err(anomaly) => {
            eprintln!("Reconciliation failed: {}", anomaly);
            std::process::exit(2);
        }
    }
}

#[cfg(feature = "phash")]
fn index_config(threading: ThreadingMode, snapshot_path: &Path, perceptual: bool) -> IndexConfig {
    let config = IndexConfig::new(threading).with_excluded(snapshot_path.to_path_buf());
    if perceptual {
        config.with_perceptual_images(driftscan_core::default_image_extensions())
    } else {
        config
    }
}

#[cfg(not(feature = "phash"))]
fn index_config(threading: ThreadingMode, snapshot_path: &Path, perceptual: bool) -> IndexConfig {
    if perceptual {
        eprintln!("--phash requires a driftscan build with the phash feature enabled");
        std::process::exit(1);
    }
    IndexConfig::new(threading).with_excluded(snapshot_path.to_path_buf())
}

fn scan_directory(
    root: &Path,
    config: IndexConfig,
    cache: Option<&Mutex<FingerprintCache>>,
) -> Snapshot {
    let total_files = count_entries(root);
    let progress_bar = Arc::new(ProgressBar::new(total_files));
    progress_bar.set_style(progress::default_style());

    let snapshot = index(root, &config, &progress_bar, cache);
    progress_bar.finish_with_message("Scan complete");
    snapshot
}

fn open_cache(use_cache: bool) -> Option<(PathBuf, Mutex<FingerprintCache>)> {
    if !use_cache {
        return None;
    }
    let path = default_cache_path()?;
    match FingerprintCache::load(&path) {
        Ok(cache) => Some((path, Mutex::new(cache))),
        Err(error) => {
            eprintln!("Ignoring unreadable cache {}: {}", path.display(), error);
            None
        }
    }
}

fn persist_cache(cache: Option<(PathBuf, Mutex<FingerprintCache>)>) {
    if let Some((path, cache)) = cache {
        if let Ok(cache) = cache.into_inner() {
            if let Err(error) = cache.store(&path) {
                eprintln!("Error writing cache {}: {}", path.display(), error);
            }
        }
    }
}
