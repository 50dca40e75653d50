//! Scanner module for discovering video files under the input root.
//!
//! Walks the input tree for the configured extensions, drops excluded paths,
//! deduplicates by canonical path and builds one [`Candidate`] per file with the
//! cheap "destination already exists" check already applied.

use crate::candidate::Candidate;
use crate::config::{RunConfig, SortKey};
use crate::decision::precheck;
use crate::probe::MediaProbe;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Error type for scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The input root does not exist or is not a directory.
    #[error("input directory not found: {}", .0.display())]
    RootMissing(PathBuf),

    /// An exclude pattern is not a valid glob.
    #[error("invalid exclude pattern: {0}")]
    Pattern(#[from] globset::Error),
}

/// Checks if a file has one of the given extensions (case-insensitive, no dot).
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Compile exclude patterns into a case-insensitive glob set.
pub fn build_excludes(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).case_insensitive(true).build()?);
    }
    builder.build()
}

fn is_excluded(path: &Path, root: &Path, excludes: &GlobSet) -> bool {
    if excludes.is_empty() {
        return false;
    }
    if let Some(name) = path.file_name() {
        if excludes.is_match(Path::new(name)) {
            return true;
        }
    }
    path.strip_prefix(root)
        .map(|relative| excludes.is_match(relative))
        .unwrap_or(false)
}

/// Recursively finds files under `root` with a matching extension.
///
/// Symlinks are not followed. Results are canonical absolute paths, deduplicated,
/// in walk order.
pub fn discover_files(root: &Path, extensions: &[String], excludes: &GlobSet) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under '{}': {}", root.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() || !has_extension(entry.path(), extensions) {
            continue;
        }

        if is_excluded(entry.path(), root, excludes) {
            debug!("Excluded: '{}'", entry.path().display());
            continue;
        }

        let resolved = entry
            .path()
            .canonicalize()
            .unwrap_or_else(|_| entry.path().to_path_buf());
        if seen.insert(resolved.clone()) {
            files.push(resolved);
        }
    }

    files
}

/// Scans the configured input root and builds candidates.
///
/// Each candidate gets `AlreadyExists` when its destination is present and force
/// is off, or the informational `WillOverwrite` note when force is on.
pub fn scan_candidates(config: &RunConfig) -> Result<Vec<Candidate>, ScanError> {
    let root = config
        .paths
        .input
        .canonicalize()
        .map_err(|_| ScanError::RootMissing(config.paths.input.clone()))?;
    if !root.is_dir() {
        return Err(ScanError::RootMissing(root));
    }

    let excludes = build_excludes(&config.scan.exclude)?;
    let files = discover_files(&root, &config.scan.extensions, &excludes);

    let candidates = files
        .into_iter()
        .map(|path| {
            let (size_bytes, modified) = match std::fs::metadata(&path) {
                Ok(meta) => (
                    meta.len(),
                    meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                ),
                Err(_) => (0, SystemTime::UNIX_EPOCH),
            };

            let mut candidate = Candidate::new(
                path,
                config.paths.output.as_deref(),
                &config.encode.container,
                size_bytes,
                modified,
            );

            if let Some(reason) = precheck(candidate.dest_path().exists(), config.encode.force) {
                candidate.set_skip_reason(reason);
            }

            candidate
        })
        .collect();

    Ok(candidates)
}

/// Orders candidates for processing.
///
/// Ordering by duration probes every candidate first and caches the result on
/// it, so nothing can start until all files have been inspected.
pub fn order_candidates(
    candidates: &mut [Candidate],
    key: SortKey,
    descending: bool,
    probe: &dyn MediaProbe,
) {
    if key == SortKey::Duration {
        for candidate in candidates.iter_mut() {
            let outcome = probe.probe(&candidate.source_path);
            candidate.cache_probe(outcome);
        }
    }

    candidates.sort_by(|a, b| {
        let ordering = compare(a, b, key);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

fn compare(a: &Candidate, b: &Candidate, key: SortKey) -> Ordering {
    let primary = match key {
        SortKey::Name => Ordering::Equal,
        SortKey::Duration => a.duration_secs.total_cmp(&b.duration_secs),
        SortKey::Size => a.size_bytes.cmp(&b.size_bytes),
        SortKey::Modified => a.modified.cmp(&b.modified),
    };
    primary.then_with(|| a.source_path.cmp(&b.source_path))
}
