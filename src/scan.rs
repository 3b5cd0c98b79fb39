//! Source discovery and classification.
//!
//! Stage 1 of the build pipeline. Walks the configured source directories and
//! the repository root to find every file the pipeline knows how to document.
//!
//! ## What Gets Picked Up
//!
//! ```text
//! repo/
//! ├── README.md                  # not classified (becomes the root index)
//! ├── Makefile                   # root level, non-recursive
//! ├── run.sh                     # root level, non-recursive
//! ├── setup.py                   # root level, only shell scripts and Makefiles
//! ├── src-local/                 # configured source dir, recursive
//! │   ├── params.h
//! │   └── utils/helpers.py
//! ├── simulationCases/
//! │   ├── drop.c
//! │   ├── notes.md               # markdown is never discovered
//! │   ├── analysis.ipynb
//! │   └── results.dat            # reserved data suffix, never classified
//! └── docs/                      # output, never scanned
//! ```
//!
//! Recognized kinds are decided by [`SourceKind::from_path`]. Markdown is a
//! kind the transformer handles but the scan never returns: narrative
//! documents reach the site through the root index.
//!
//! ## Failure Tolerance
//!
//! An unreadable directory or entry is logged and skipped. It never aborts
//! classification of its siblings. A missing source directory is not an error.

use crate::types::{SourceFile, SourceKind};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Files ending in this suffix are simulation output, not source.
const RESERVED_DATA_SUFFIX: &str = ".dat";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Repository root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Classify every eligible file under `root`.
///
/// `source_dirs` are searched recursively; `root` itself only one level deep.
/// The result is sorted by path and free of duplicates.
pub fn scan(root: &Path, source_dirs: &[String]) -> Result<Vec<SourceFile>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let mut found = BTreeSet::new();

    for dir_name in source_dirs {
        let dir = root.join(dir_name);
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "Source directory not present");
            continue;
        }
        scan_recursive(root, &dir, &mut found);
    }

    scan_root_level(root, &mut found);

    Ok(found.into_iter().collect())
}

fn scan_recursive(root: &Path, dir: &Path, found: &mut BTreeSet<SourceFile>) {
    let walker = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(source) = classify(root, entry.path()) {
            found.insert(source);
        }
    }
}

fn scan_root_level(root: &Path, found: &mut BTreeSet<SourceFile>) {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %root.display(), error = %e, "Cannot read repository root");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match classify(root, &path) {
            Some(source) if matches!(source.kind, SourceKind::Shell | SourceKind::BuildFile) => {
                found.insert(source);
            }
            _ => {}
        }
    }
}

fn classify(root: &Path, path: &Path) -> Option<SourceFile> {
    let name = path.file_name()?.to_str()?;
    if name.ends_with(RESERVED_DATA_SUFFIX) {
        return None;
    }
    SourceFile::new(root, path).filter(|s| s.kind != SourceKind::Markdown)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}
