//! Shared test utilities.
//!
//! `setup_repo()` copies `fixtures/repo/` into a temp directory: a small
//! repository with one source of every kind, a README with a directory tree,
//! the page template, and stand-ins for the helper scripts.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_repo();
//! let files = scan(tmp.path(), &["simulationCases".into()]).unwrap();
//! let drop = find_source(&files, "simulationCases/drop.c");
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::types::SourceFile;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/repo/` to a temp directory and return it.
pub fn setup_repo() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/repo");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).map_err(std::io::Error::other)?;
        let dst_path = dst.join(rel);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dst_path)?;
        } else {
            std::fs::copy(entry.path(), &dst_path)?;
        }
    }
    Ok(())
}

/// Write `content` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

// =========================================================================
// Lookups, panics with a clear message on miss
// =========================================================================

/// Find a scanned source by its `/`-separated relative path.
pub fn find_source<'a>(files: &'a [SourceFile], rel: &str) -> &'a SourceFile {
    files
        .iter()
        .find(|f| f.relative_display() == rel)
        .unwrap_or_else(|| {
            let available: Vec<String> = files.iter().map(|f| f.relative_display()).collect();
            panic!("source '{rel}' not found. Available: {available:?}")
        })
}
