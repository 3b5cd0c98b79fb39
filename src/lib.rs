//! # srcdoc
//!
//! A documentation site generator for research code repositories. A
//! repository of C simulation cases, Python helpers, shell drivers, Makefiles,
//! notebooks and markdown notes becomes a static HTML site under `docs/`, one
//! page per source file, plus directory indexes, a home page built from the
//! README, a sitemap and robots.txt.
//!
//! # Architecture: Per-File Pipeline, Then Assembly
//!
//! ```text
//! scan        repo/     →  Vec<SourceFile>       (classify by name and extension)
//! transform   source    →  markdown              (literate-c, python, notebook, shell)
//! metadata    markdown  →  ConversionUnit        (title, description, keywords)
//! typeset     unit      →  docs/<path>.html      (pandoc + site template)
//! postprocess html      →  html                  (code blocks, links, copy button)
//! assemble    registry  →  indexes, sitemap      (after every page is known)
//! ```
//!
//! Every file runs the first five stages independently on a rayon pool; a
//! failure is recorded and the batch continues. Assembly waits for the whole
//! batch, because indexes and the sitemap need the final set of pages.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Walks the repository and classifies sources |
//! | [`transform`] | Turns each kind of source into markdown |
//! | [`metadata`] | Derives SEO metadata and embeds it in the markdown |
//! | [`typeset`] | Drives the typesetting engine and repairs its output |
//! | [`postprocess`] | HTML rewrites: code containers, links, copy button, stylesheet |
//! | [`tree`] | README directory trees to linked site maps |
//! | [`assemble`] | Directory indexes, home page, sitemap, robots.txt |
//! | [`process`] | The per-file pipeline and the whole build |
//! | [`tools`] | External tool seam: literate converter, pandoc, awk |
//! | [`config`] | `srcdoc.toml` loading, validation, and derived project values |
//! | [`types`] | Shared types: sources, pages, the generation registry |
//! | [`naming`] | Filename stems to words, keywords and element ids |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## External Tools Behind a Trait
//!
//! Conversion of C sources and typesetting are delegated to existing tools
//! (`literate-c`, `pandoc`, an awk anchoring script). All three sit behind
//! [`tools::DocTools`], so the pipeline runs in tests against a recording
//! mock without any of them installed.
//!
//! ## Incremental by Presence
//!
//! A page that already exists is not regenerated unless `--force-rebuild` is
//! given. Skipped pages are still registered, so the indexes and the sitemap
//! always describe the whole site.

pub mod assemble;
pub mod config;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod postprocess;
pub mod process;
pub mod scan;
pub mod tools;
pub mod transform;
pub mod tree;
pub mod typeset;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
