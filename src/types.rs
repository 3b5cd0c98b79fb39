//! Shared types used across pipeline stages.
//!
//! A [`SourceFile`] is discovered by [`scan`](crate::scan), turned into a
//! [`ConversionUnit`] by [`transform`](crate::transform) and
//! [`metadata`](crate::metadata), and ends up as a [`GeneratedPage`] in the
//! [`GenerationRegistry`] once typesetting and post-processing succeed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension appended to every source path to form its rendered page.
pub const PAGE_EXTENSION: &str = "html";

/// Exact file name recognized as a build file.
pub const BUILD_FILE_NAME: &str = "Makefile";

/// The closed set of source kinds the pipeline knows how to document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    Markdown,
    Script,
    Shell,
    Notebook,
    BuildFile,
    Compiled,
}

impl SourceKind {
    /// Classify a path by exact name first, then by extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name == BUILD_FILE_NAME {
            return Some(Self::BuildFile);
        }
        match path.extension()?.to_str()? {
            "md" => Some(Self::Markdown),
            "py" => Some(Self::Script),
            "sh" => Some(Self::Shell),
            "ipynb" => Some(Self::Notebook),
            "c" | "h" => Some(Self::Compiled),
            _ => None,
        }
    }

    /// CSS class used for the file icon in directory indexes.
    pub fn icon_class(self) -> &'static str {
        match self {
            Self::Compiled => "file-c",
            Self::Script => "file-python",
            Self::Notebook => "file-jupyter",
            _ => "file-other",
        }
    }

    /// Whether the compiled-language post-processing branch applies.
    pub fn is_compiled(self) -> bool {
        matches!(self, Self::Compiled)
    }

    /// Pages whose content would collide with the engine's math templating.
    pub fn disables_mathjax(self) -> bool {
        matches!(self, Self::Shell | Self::BuildFile | Self::Notebook)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Script => "python",
            Self::Shell => "shell",
            Self::Notebook => "notebook",
            Self::BuildFile => "makefile",
            Self::Compiled => "c",
        }
    }
}

/// A discovered source file. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the repository root.
    pub relative: PathBuf,
    pub kind: SourceKind,
}

impl SourceFile {
    /// Build a source file from an absolute path under `root`.
    ///
    /// Returns `None` when the path is outside `root` or its kind is unknown.
    pub fn new(root: &Path, path: &Path) -> Option<Self> {
        let kind = SourceKind::from_path(path)?;
        let relative = path.strip_prefix(root).ok()?.to_path_buf();
        Some(Self {
            path: path.to_path_buf(),
            relative,
            kind,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Relative path with `/` separators, as shown to readers.
    pub fn relative_display(&self) -> String {
        to_slash(&self.relative)
    }

    /// Output path relative to the docs root: the source path plus `.html`.
    pub fn output_relative(&self) -> PathBuf {
        let mut name = self.relative.as_os_str().to_os_string();
        name.push(".");
        name.push(PAGE_EXTENSION);
        PathBuf::from(name)
    }

    /// First path component when the file lives in a subdirectory.
    pub fn top_dir(&self) -> Option<String> {
        let mut components = self.relative.components();
        let first = components.next()?;
        components
            .next()
            .map(|_| first.as_os_str().to_string_lossy().into_owned())
    }
}

/// Search-engine metadata attached to a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeoMetadata {
    /// Attribute-safe description, at most 160 characters.
    pub description: String,
    /// Comma-joined keyword list.
    pub keywords: String,
    pub title: Option<String>,
}

/// Intermediate markup ready for the typesetting engine.
#[derive(Debug, Clone)]
pub struct ConversionUnit {
    pub markup: String,
    pub seo: SeoMetadata,
}

/// A successfully rendered page.
#[derive(Debug, Clone)]
pub struct GeneratedPage {
    pub source: SourceFile,
    pub output_path: PathBuf,
    pub page_title: String,
    pub page_url: String,
    pub asset_prefix: String,
}

impl GeneratedPage {
    /// Output path relative to the docs root, `/`-separated.
    pub fn url_path(&self, docs_root: &Path) -> String {
        self.output_path
            .strip_prefix(docs_root)
            .map(to_slash)
            .unwrap_or_else(|_| to_slash(&self.output_path))
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Output path lies outside the docs root: {0}")]
    OutsideDocsRoot(PathBuf),
    #[error("Output path already registered: {0}")]
    Duplicate(PathBuf),
}

/// Run-scoped mapping of generated pages, unique by output path.
///
/// Filled single-threaded after the per-file phase and then handed to the
/// assembler by reference.
#[derive(Debug)]
pub struct GenerationRegistry {
    docs_root: PathBuf,
    pages: BTreeMap<PathBuf, GeneratedPage>,
}

impl GenerationRegistry {
    pub fn new(docs_root: impl Into<PathBuf>) -> Self {
        Self {
            docs_root: docs_root.into(),
            pages: BTreeMap::new(),
        }
    }

    pub fn docs_root(&self) -> &Path {
        &self.docs_root
    }

    pub fn register(&mut self, page: GeneratedPage) -> Result<(), RegistryError> {
        if !page.output_path.starts_with(&self.docs_root) {
            return Err(RegistryError::OutsideDocsRoot(page.output_path));
        }
        if self.pages.contains_key(&page.output_path) {
            return Err(RegistryError::Duplicate(page.output_path));
        }
        self.pages.insert(page.output_path.clone(), page);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Pages ordered by output path.
    pub fn pages(&self) -> impl Iterator<Item = &GeneratedPage> {
        self.pages.values()
    }

    /// Pages whose output lives directly in `dir` (not in a subdirectory).
    pub fn pages_in(&self, dir: &Path) -> Vec<&GeneratedPage> {
        self.pages
            .values()
            .filter(|p| p.output_path.parent() == Some(dir))
            .collect()
    }
}

/// Render a path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(
            SourceKind::from_path(Path::new("a/b.py")),
            Some(SourceKind::Script)
        );
        assert_eq!(
            SourceKind::from_path(Path::new("x.h")),
            Some(SourceKind::Compiled)
        );
        assert_eq!(
            SourceKind::from_path(Path::new("nb.ipynb")),
            Some(SourceKind::Notebook)
        );
        assert_eq!(SourceKind::from_path(Path::new("data.txt")), None);
    }

    #[test]
    fn makefile_is_build_file() {
        assert_eq!(
            SourceKind::from_path(Path::new("src/Makefile")),
            Some(SourceKind::BuildFile)
        );
    }

    #[test]
    fn output_relative_appends_extension() {
        let src = SourceFile::new(Path::new("/repo"), Path::new("/repo/src/drop.c")).unwrap();
        assert_eq!(src.output_relative(), PathBuf::from("src/drop.c.html"));
        assert_eq!(src.top_dir().as_deref(), Some("src"));
    }

    #[test]
    fn root_level_file_has_no_top_dir() {
        let src = SourceFile::new(Path::new("/repo"), Path::new("/repo/run.sh")).unwrap();
        assert_eq!(src.top_dir(), None);
    }

    fn page(root: &str, out: &str) -> GeneratedPage {
        GeneratedPage {
            source: SourceFile::new(Path::new("/repo"), Path::new("/repo/src/a.c")).unwrap(),
            output_path: PathBuf::from(root).join(out),
            page_title: "src/a.c".into(),
            page_url: "/src/a.c.html".into(),
            asset_prefix: "..".into(),
        }
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = GenerationRegistry::new("/repo/docs");
        registry.register(page("/repo/docs", "src/a.c.html")).unwrap();
        let err = registry
            .register(page("/repo/docs", "src/a.c.html"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_rejects_outside_docs_root() {
        let mut registry = GenerationRegistry::new("/repo/docs");
        let err = registry.register(page("/tmp", "a.c.html")).unwrap_err();
        assert!(matches!(err, RegistryError::OutsideDocsRoot(_)));
    }

    #[test]
    fn pages_in_is_direct_children_only() {
        let mut registry = GenerationRegistry::new("/repo/docs");
        registry.register(page("/repo/docs", "src/a.c.html")).unwrap();
        registry
            .register(page("/repo/docs", "src/nested/b.c.html"))
            .unwrap();
        let direct = registry.pages_in(Path::new("/repo/docs/src"));
        assert_eq!(direct.len(), 1);
    }
}
