//! Site assembly: the pages that depend on the whole registry.
//!
//! Runs once, after every source has been processed:
//!
//! 1. **Directory indexes**: one `index.html` per configured source directory,
//!    a table of the pages directly inside it, rendered into the shared
//!    template by placeholder substitution (the engine is not involved).
//! 2. **Root index**: the README with its directory tree expanded and a
//!    generated list of every page, typeset like a regular page.
//! 3. **`sitemap.xml`** and **`robots.txt`**.
//!
//! Table, listing, sitemap, and robots rendering are pure functions; the
//! `write_*` functions do the I/O around them.

use crate::config::Project;
use crate::postprocess::{
    inject_copy_button, inject_css_link, process_script_html, strip_dynamic_path_scripts,
    stylesheet_href,
};
use crate::tools::{DocTools, INDEX_FORMAT, ToolError, TypesetParams};
use crate::tree::convert_directory_tree;
use crate::types::{GenerationRegistry, to_slash};
use crate::typeset::asset_prefix;
use maud::{PreEscaped, html};
use regex::{NoExpand, Regex};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

pub const INDEX_FILE: &str = "index.html";
const MAX_LISTING_DESCRIPTION: usize = 120;

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not read template {}: {source}", path.display())]
    Template {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Root index: {0}")]
    Tool(#[from] ToolError),
}

/// Files written by [`assemble`].
#[derive(Debug, Default)]
pub struct AssemblyReport {
    pub directory_indexes: Vec<PathBuf>,
    pub root_index: PathBuf,
    pub sitemap: PathBuf,
    pub robots: PathBuf,
}

/// Write every site-level page.
pub fn assemble(
    registry: &GenerationRegistry,
    project: &Project,
    tools: &dyn DocTools,
) -> Result<AssemblyReport, AssembleError> {
    let docs_root = registry.docs_root();
    let template_path = project.template_path();
    let template = fs::read_to_string(&template_path).map_err(|source| AssembleError::Template {
        path: template_path.clone(),
        source,
    })?;

    let mut report = AssemblyReport::default();
    for dir in &project.config.source_dirs {
        let dir_path = docs_root.join(dir);
        if !dir_path.is_dir() {
            tracing::debug!(dir = %dir, "No generated pages, skipping directory index");
            continue;
        }
        match write_directory_index(dir, registry, project, &template) {
            Ok(path) => report.directory_indexes.push(path),
            Err(e) => tracing::warn!(dir = %dir, error = %e, "Failed to write directory index"),
        }
    }

    report.root_index = write_root_index(registry, project, tools)?;

    let mut urls: Vec<String> = registry.pages().map(|p| p.url_path(docs_root)).collect();
    urls.extend(
        report
            .directory_indexes
            .iter()
            .filter_map(|p| p.strip_prefix(docs_root).ok())
            .map(to_slash),
    );
    report.sitemap = docs_root.join("sitemap.xml");
    fs::write(
        &report.sitemap,
        sitemap_xml(&project.domain, urls, &project.config.links.priority_dir),
    )?;

    report.robots = docs_root.join("robots.txt");
    fs::write(&report.robots, robots_txt(&project.domain))?;

    Ok(report)
}

// =============================================================================
// Directory indexes
// =============================================================================

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub href: String,
    pub icon: &'static str,
    /// Taken from the page's description meta, so already HTML-escaped.
    pub description: String,
}

static META_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<meta\s+name="description"\s+content="([^"]+)""#).unwrap());

/// Description for a listing row, read back from a rendered page.
pub fn listing_description(html: &str) -> String {
    let Some(caps) = META_DESCRIPTION.captures(html) else {
        return String::new();
    };
    let desc = caps[1].trim();
    if desc.chars().count() > MAX_LISTING_DESCRIPTION {
        let cut: String = desc.chars().take(MAX_LISTING_DESCRIPTION - 3).collect();
        format!("{cut}...")
    } else {
        desc.to_string()
    }
}

/// Heading plus file table, sorted case-insensitively by name.
pub fn render_listing(title: &str, entries: &[ListingEntry]) -> String {
    let mut sorted: Vec<&ListingEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.name.to_lowercase());

    html! {
        h1 { (title) }
        @if sorted.is_empty() {
            p { "No documentation files found in this directory." }
        } @else {
            div.documentation-section {
                table.documentation-files {
                    @for entry in sorted {
                        tr {
                            td.file-icon { span class=(entry.icon) {} }
                            td.file-link style="padding-right: 2em;" {
                                a href=(entry.href) class="doc-link-button" { (entry.name) }
                            }
                            td.file-desc { (PreEscaped(&entry.description)) }
                        }
                    }
                }
            }
        }
    }
    .into_string()
}

/// Values substituted into the shared template for an index page.
#[derive(Debug, Clone)]
pub struct TemplateValues<'a> {
    pub page_title: String,
    pub description: String,
    pub keywords: String,
    pub repo_name: &'a str,
    pub asset_prefix: String,
    pub body: String,
}

static DESCRIPTION_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\$if\(description\)\$.*?\$endif\$").unwrap());
static KEYWORDS_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\$if\(keywords\)\$.*?\$endif\$").unwrap());
static TABS_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\$if\(tabs\)\$.*?\$endif\$").unwrap());
static PAGE_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div class="page-content">\s*.*?\$body\$.*?</div>"#).unwrap()
});
static CONDITIONAL_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\$if\([^)]+\)\$.*?\$endif\$").unwrap());
static VARIABLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$[a-zA-Z0-9_]+\$").unwrap());

const BODY_SLOT: &str = "<!--srcdoc:body-->";

/// Fill the engine template without running the engine.
///
/// The body goes in last so that `$...$` inside it survives the removal of
/// unused placeholders.
pub fn render_template(template: &str, values: &TemplateValues) -> String {
    let html = template.replace(
        "$if(pagetitle)$$pagetitle$$endif$$if(wikititle)$ | $wikititle$$endif$",
        &values.page_title,
    );
    let html = DESCRIPTION_BLOCK.replace_all(&html, NoExpand(&values.description));
    let html = KEYWORDS_BLOCK.replace_all(&html, NoExpand(&values.keywords));
    let html = html.replace(
        "$if(reponame)$$reponame$$else$Documentation$endif$",
        values.repo_name,
    );
    let html = html.replace("$asset_path_prefix$", &values.asset_prefix);
    let html = TABS_BLOCK.replace_all(&html, "");

    let slot = format!("<div class=\"page-content\">\n{BODY_SLOT}\n</div>");
    let html = if PAGE_CONTENT.is_match(&html) {
        PAGE_CONTENT.replace(&html, NoExpand(&slot)).into_owned()
    } else {
        html.replace("$body$", BODY_SLOT)
    };

    let html = CONDITIONAL_BLOCK.replace_all(&html, "");
    let html = VARIABLE.replace_all(&html, "");
    let html = strip_dynamic_path_scripts(&html);
    html.replacen(BODY_SLOT, &values.body, 1)
}

/// Write `<docs>/<dir>/index.html` and return its path.
pub fn write_directory_index(
    dir: &str,
    registry: &GenerationRegistry,
    project: &Project,
    template: &str,
) -> Result<PathBuf, AssembleError> {
    let dir_path = registry.docs_root().join(dir);
    let index_path = dir_path.join(INDEX_FILE);

    let entries: Vec<ListingEntry> = registry
        .pages_in(&dir_path)
        .into_iter()
        .map(|page| {
            let description = match fs::read_to_string(&page.output_path) {
                Ok(html) => listing_description(&html),
                Err(e) => {
                    tracing::warn!(path = %page.output_path.display(), error = %e, "Could not read page for its description");
                    String::new()
                }
            };
            ListingEntry {
                name: page.source.file_name(),
                href: page
                    .output_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                icon: page.source.kind.icon_class(),
                description,
            }
        })
        .collect();

    let title = project.directory_title(dir);
    let prefix = asset_prefix(&index_path, registry.docs_root());
    let values = TemplateValues {
        page_title: format!("{title} | Documentation"),
        description: format!("Documentation for the {} framework.", project.config.project_name),
        keywords: format!("{}, {dir}, documentation", project.config.default_keywords),
        repo_name: &project.repo_name,
        asset_prefix: prefix.clone(),
        body: render_listing(&title, &entries),
    };

    let mut html = render_template(template, &values);
    if let Some(css) = &project.config.stylesheet {
        html = inject_css_link(&html, &stylesheet_href(&prefix, css));
    }
    fs::write(&index_path, html)?;
    tracing::info!(dir = %dir, pages = entries.len(), "Wrote directory index");
    Ok(index_path)
}

// =============================================================================
// Root index
// =============================================================================

/// README content plus the generated page list.
pub fn root_markdown(readme: &str, registry: &GenerationRegistry, project: &Project) -> String {
    let docs_root = registry.docs_root();
    let mut groups: BTreeMap<Option<String>, Vec<String>> = BTreeMap::new();
    for page in registry.pages() {
        let group = page.source.top_dir();
        if let Some(dir) = &group {
            if !project.config.source_dirs.contains(dir) {
                continue;
            }
        }
        groups.entry(group).or_default().push(format!(
            "- [{}]({})",
            page.source.relative_display(),
            page.url_path(docs_root)
        ));
    }

    let mut out = convert_directory_tree(readme);
    out.push_str("\n\n## Generated Documentation\n\n");
    // `None` sorts first, so the root directory leads.
    for (group, mut links) in groups {
        links.sort();
        let heading = group.as_deref().unwrap_or("Root Directory");
        out.push_str(&format!("### {heading}\n\n"));
        out.push_str(&links.join("\n"));
        out.push_str("\n\n");
    }
    out
}

/// Typeset the root index and return its path.
pub fn write_root_index(
    registry: &GenerationRegistry,
    project: &Project,
    tools: &dyn DocTools,
) -> Result<PathBuf, AssembleError> {
    let readme_path = project.readme_path();
    let readme = match fs::read_to_string(&readme_path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %readme_path.display(), error = %e, "README not readable, using a default heading");
            "# Project Documentation\n".to_string()
        }
    };

    let index_path = registry.docs_root().join(INDEX_FILE);
    let params = TypesetParams::new(INDEX_FORMAT, project.template_path(), index_path.clone())
        .with_var("wikititle", &project.site_title)
        .with_var("reponame", &project.repo_name)
        .with_var("base", &project.config.base_url)
        .with_var("notitle", "true")
        .with_var("pagetitle", &project.site_title)
        .with_var("asset_path_prefix", ".");
    tools.typeset(&root_markdown(&readme, registry, project), &params)?;

    let html = fs::read_to_string(&index_path)?;
    let mut html = inject_copy_button(&process_script_html(&html, &project.repo_name));
    if let Some(css) = &project.config.stylesheet {
        html = inject_css_link(&html, &stylesheet_href(".", css));
    }
    fs::write(&index_path, html)?;
    tracing::info!(path = %index_path.display(), "Wrote root index");
    Ok(index_path)
}

// =============================================================================
// Sitemap and robots
// =============================================================================

/// Sitemap with the homepage first and the given page URLs sorted.
pub fn sitemap_xml(domain: &str, mut urls: Vec<String>, priority_dir: &str) -> String {
    urls.sort();
    urls.dedup();
    let priority_prefix = format!("{priority_dir}/");

    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");
    push_url(&mut out, &format!("{domain}/"), "weekly", "1.0");
    for url in &urls {
        let priority = if url.contains("index") || url.starts_with(&priority_prefix) {
            "0.8"
        } else {
            "0.6"
        };
        push_url(&mut out, &format!("{domain}/{url}"), "monthly", priority);
    }
    out.push_str("</urlset>\n");
    out
}

fn push_url(out: &mut String, loc: &str, changefreq: &str, priority: &str) {
    out.push_str("  <url>\n");
    out.push_str(&format!("    <loc>{}</loc>\n", html_escape::encode_text(loc)));
    out.push_str(&format!("    <changefreq>{changefreq}</changefreq>\n"));
    out.push_str(&format!("    <priority>{priority}</priority>\n"));
    out.push_str("  </url>\n");
}

pub fn robots_txt(domain: &str) -> String {
    format!("User-agent: *\nAllow: /\n\nSitemap: {domain}/sitemap.xml\n")
}
