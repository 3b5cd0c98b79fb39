//! Per-file pipeline and the whole build.
//!
//! Each source goes through transform → metadata → typeset → post-process on a
//! rayon worker and comes back as a [`FileOutcome`]. Nothing a single file
//! does can stop the batch: tool failures, timeouts, and I/O errors become
//! [`FileOutcome::Failed`]. Only missing prerequisites abort a run, and they
//! are checked before any file is touched.
//!
//! ```text
//! check_prerequisites ─► scan ─► par_iter(process_file) ─► registry ─► assemble
//!                                       │
//!                                       └─► ProcessEvent (mpsc) ─► printer
//! ```
//!
//! The registry is filled on the calling thread after the parallel phase, so
//! workers share no mutable state.
//!
//! ## Incremental builds
//!
//! Without `force_rebuild`, a source whose page already exists is skipped:
//! the page keeps its bytes and is still registered, so indexes and the
//! sitemap stay complete. With `force_rebuild`, every `.html` under the docs
//! root is deleted first.

use crate::assemble::{AssembleError, AssemblyReport, assemble};
use crate::config::Project;
use crate::metadata;
use crate::postprocess::{
    IncludeLink, inject_copy_button, inject_css_link, process_compiled_html, process_script_html,
    relative_href, stylesheet_href,
};
use crate::scan::{ScanError, scan};
use crate::tools::{DocTools, ToolError};
use crate::transform::transform;
use crate::typeset::{TypesetError, plan_page, typeset_page};
use crate::types::{GeneratedPage, GenerationRegistry, SourceFile, SourceKind};
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

/// Failure of a single file. Never aborts the batch.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Typeset(#[from] TypesetError),
    #[error("Declaration anchoring failed: {0}")]
    Annotate(#[source] ToolError),
}

/// Failure of the whole run.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Assembly failed: {0}")]
    Assemble(#[from] AssembleError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    pub force_rebuild: bool,
}

/// Result of processing one source.
#[derive(Debug)]
pub enum FileOutcome {
    Generated(GeneratedPage),
    /// Output already existed and was left untouched.
    Skipped(GeneratedPage),
    Failed { source: SourceFile, error: String },
}

impl FileOutcome {
    pub fn source(&self) -> &SourceFile {
        match self {
            Self::Generated(page) | Self::Skipped(page) => &page.source,
            Self::Failed { source, .. } => source,
        }
    }

    pub fn page(&self) -> Option<&GeneratedPage> {
        match self {
            Self::Generated(page) | Self::Skipped(page) => Some(page),
            Self::Failed { .. } => None,
        }
    }

    fn status(&self) -> FileStatus {
        match self {
            Self::Generated(_) => FileStatus::Generated,
            Self::Skipped(_) => FileStatus::Skipped,
            Self::Failed { error, .. } => FileStatus::Failed(error.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Generated,
    Skipped,
    Failed(String),
}

/// Progress reported while a build runs.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Started { total: usize },
    FileFinished {
        relative: String,
        kind: SourceKind,
        status: FileStatus,
    },
    Assembling { pages: usize },
}

/// Everything a finished build produced.
#[derive(Debug)]
pub struct BuildSummary {
    pub outcomes: Vec<FileOutcome>,
    pub assembly: AssemblyReport,
}

impl BuildSummary {
    pub fn generated(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Generated(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped(_)))
    }

    pub fn failures(&self) -> Vec<(&SourceFile, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                FileOutcome::Failed { source, error } => Some((source, error.as_str())),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

// =============================================================================
// Build
// =============================================================================

/// Files the run cannot start without.
pub fn check_prerequisites(project: &Project) -> Result<(), BuildError> {
    for (what, path) in [
        ("template", project.template_path()),
        ("literate converter", project.literate_c_path()),
        ("declaration anchor script", project.decl_anchors_path()),
    ] {
        if !path.is_file() {
            return Err(BuildError::MissingPrerequisite(format!(
                "{what} not found at {}",
                path.display()
            )));
        }
    }
    Ok(())
}

/// Delete every generated page under `docs_dir`. Returns how many went.
pub fn clean_html(docs_dir: &Path) -> usize {
    let mut removed = 0;
    for entry in WalkDir::new(docs_dir).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|e| e != "html") {
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not remove page"),
        }
    }
    removed
}

/// Run the full pipeline for `project`.
pub fn build(
    project: &Project,
    tools: &dyn DocTools,
    options: BuildOptions,
    events: Option<Sender<ProcessEvent>>,
) -> Result<BuildSummary, BuildError> {
    check_prerequisites(project)?;

    let docs_dir = project.docs_dir();
    fs::create_dir_all(&docs_dir)?;
    if options.force_rebuild {
        let removed = clean_html(&docs_dir);
        tracing::info!(removed, "Force rebuild: cleaned generated pages");
    }

    let sources = scan(&project.root, &project.config.source_dirs)?;
    if sources.is_empty() {
        tracing::warn!("No source files found");
    }
    send(&events, ProcessEvent::Started { total: sources.len() });

    let outcomes: Vec<FileOutcome> = sources
        .par_iter()
        .map(|source| {
            let outcome = process_file(source, project, tools, options);
            send(
                &events,
                ProcessEvent::FileFinished {
                    relative: source.relative_display(),
                    kind: source.kind,
                    status: outcome.status(),
                },
            );
            outcome
        })
        .collect();

    let mut registry = GenerationRegistry::new(&docs_dir);
    for page in outcomes.iter().filter_map(FileOutcome::page) {
        if let Err(e) = registry.register(page.clone()) {
            tracing::warn!(source = %page.source.relative_display(), error = %e, "Page not registered");
        }
    }

    send(&events, ProcessEvent::Assembling { pages: registry.len() });
    let assembly = assemble(&registry, project, tools)?;

    Ok(BuildSummary { outcomes, assembly })
}

fn send(events: &Option<Sender<ProcessEvent>>, event: ProcessEvent) {
    if let Some(tx) = events {
        tx.send(event).ok();
    }
}

// =============================================================================
// Single file
// =============================================================================

/// Process one source into its page.
pub fn process_file(
    source: &SourceFile,
    project: &Project,
    tools: &dyn DocTools,
    options: BuildOptions,
) -> FileOutcome {
    let page = plan_page(source, project);

    if !options.force_rebuild && page.output_path.exists() {
        tracing::debug!(path = %page.output_path.display(), "Keeping existing page");
        return FileOutcome::Skipped(page);
    }

    match render(&page, project, tools) {
        Ok(()) => FileOutcome::Generated(page),
        Err(e) => {
            tracing::warn!(source = %source.relative_display(), error = %e, "Failed to generate page");
            // A partial page would be kept by the next incremental build.
            discard_partial(&page.output_path);
            FileOutcome::Failed {
                source: source.clone(),
                error: e.to_string(),
            }
        }
    }
}

fn discard_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial page"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not remove partial page")
        }
    }
}

fn render(
    page: &GeneratedPage,
    project: &Project,
    tools: &dyn DocTools,
) -> Result<(), ProcessError> {
    let source = &page.source;
    let page_dir = page
        .output_path
        .parent()
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(page_dir)?;

    if source.kind == SourceKind::Notebook {
        // The rendered page links to this copy for download.
        if let Err(e) = fs::copy(&source.path, page_dir.join(source.file_name())) {
            tracing::warn!(path = %source.path.display(), error = %e, "Could not copy notebook");
        }
    }

    let markup = transform(source, tools, project)?;
    let unit = metadata::attach(source, markup, &project.config);
    let html = typeset_page(&unit, page, project, tools)?;

    let html = if source.kind.is_compiled() {
        let tags = format!("{}.tags", source.relative_display());
        let annotated = tools.annotate(&html, &tags).map_err(ProcessError::Annotate)?;
        process_compiled_html(&annotated, &project.repo_name, |name| {
            include_link(name, project, page_dir)
        })
    } else {
        process_script_html(&html, &project.repo_name)
    };

    let mut html = inject_copy_button(&html);
    if let Some(css) = &project.config.stylesheet {
        html = inject_css_link(&html, &stylesheet_href(&page.asset_prefix, css));
    }
    fs::write(&page.output_path, html)?;
    Ok(())
}

/// Local page when the header lives in the local sources directory,
/// upstream source otherwise.
pub fn include_link(name: &str, project: &Project, page_dir: &Path) -> IncludeLink {
    let base = name.rsplit('/').next().unwrap_or(name);
    if project.local_sources_dir().join(base).is_file() {
        let target = project
            .docs_dir()
            .join(&project.config.links.local_sources_dir)
            .join(format!("{base}.html"));
        IncludeLink {
            href: relative_href(page_dir, &target),
            title: format!("Link to local documentation for {name}"),
        }
    } else {
        IncludeLink {
            href: format!("{}{name}", project.config.links.external_source_url),
            title: format!("Link to upstream source for {name}"),
        }
    }
}
