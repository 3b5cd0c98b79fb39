//! Jupyter notebooks to an embedded preview page.
//!
//! Notebooks are not rendered cell by cell. The page instead carries a widget
//! with download and external-viewer links and an nbviewer preview, plus an
//! introduction taken from the notebook's first markdown cell:
//!
//! - **Title**: first `# ` heading (default: the file name)
//! - **Description**: the paragraph right after that heading
//! - **Key features**: up to three bullet items
//!
//! Every extracted string is sanitized in three stages: tags are stripped,
//! attribute-breaking characters are removed, and a strict allowlist pass
//! produces the meta description carried in the embedded metadata comment.

use crate::config::Project;
use crate::metadata::{self, EmbeddedMetadata};
use crate::naming;
use crate::types::SourceFile;
use maud::{Markup, PreEscaped, html};
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::sync::LazyLock;

const MAX_FEATURES: usize = 3;

const DEFAULT_FEATURES: [&str; MAX_FEATURES] = [
    "Visualization of data and results",
    "Analysis of simulation outputs",
    "Interactive exploration of parameters",
];

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static ATTRIBUTE_BREAKING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"["'>]"#).unwrap());
static NOT_META_SAFE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.,;:!?()-]").unwrap());

#[derive(Debug, Deserialize)]
struct Notebook {
    #[serde(default)]
    cells: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    cell_type: String,
    #[serde(default)]
    source: CellSource,
}

/// nbformat allows either a list of lines or one string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CellSource {
    Lines(Vec<String>),
    Text(String),
}

impl Default for CellSource {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl CellSource {
    fn text(&self) -> String {
        match self {
            Self::Lines(lines) => lines.concat(),
            Self::Text(text) => text.clone(),
        }
    }
}

/// What the first titled markdown cell says about the notebook.
#[derive(Debug, Default, PartialEq)]
struct Intro {
    title: Option<String>,
    description: Option<String>,
    features: Vec<String>,
}

pub fn to_markdown(source: &SourceFile, project: &Project) -> String {
    let file_name = source.file_name();
    let content = match fs::read_to_string(&source.path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %source.path.display(), error = %e, "Cannot read notebook");
            return format!("# {file_name}\n\nError processing notebook: {e}\n");
        }
    };

    let intro = match serde_json::from_str::<Notebook>(&content) {
        Ok(notebook) => intro_from_cells(&notebook.cells),
        Err(e) => {
            tracing::debug!(path = %source.path.display(), error = %e, "Notebook JSON not parseable, using defaults");
            Intro::default()
        }
    };

    let title = intro.title.unwrap_or_else(|| file_name.clone());
    let description = intro
        .description
        .map(|d| strip_attribute_breaking(&d))
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| {
            let stem = file_name.split('.').next().unwrap_or_default();
            format!(
                "This notebook provides visualization and analysis related to {}.",
                naming::stem_words(stem)
            )
        });
    let features = if intro.features.is_empty() {
        DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect()
    } else {
        intro.features
    };
    let meta_description = meta_safe(&description);

    let embedded = EmbeddedMetadata {
        title: Some(strip_attribute_breaking(&title)),
        meta_tags: Some(format!(
            "<meta name=\"description\" content=\"{meta_description}\">\n"
        )),
        description: meta_description,
        keywords: None,
    };

    let links = ViewerLinks::new(source, project);
    let widget = widget(&file_name, &title, &description, &features, &links);

    format!(
        "{}# {}\n\n```{{=html}}\n{}\n```\n",
        embedded.to_comment(),
        html_escape::encode_text(&title),
        widget.into_string()
    )
}

/// Scan markdown cells for the first level-one heading and read around it.
fn intro_from_cells(cells: &[Cell]) -> Intro {
    cells
        .iter()
        .filter(|c| c.cell_type == "markdown")
        .map(|c| intro_from_markdown(&c.source.text()))
        .find(|intro| intro.title.is_some())
        .unwrap_or_default()
}

fn intro_from_markdown(markdown: &str) -> Intro {
    let mut intro = Intro::default();
    let mut buf = String::new();
    let mut in_title = false;
    let mut in_paragraph = false;
    let mut item_depth = 0usize;
    let mut after_title = false;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) if intro.title.is_none() => {
                in_title = true;
                buf.clear();
            }
            Event::End(TagEnd::Heading(HeadingLevel::H1)) if in_title => {
                in_title = false;
                after_title = true;
                intro.title = Some(buf.trim().to_string()).filter(|t| !t.is_empty());
                buf.clear();
            }
            Event::Start(Tag::Item) if intro.title.is_some() => {
                item_depth += 1;
                if item_depth == 1 {
                    buf.clear();
                }
                after_title = false;
            }
            Event::End(TagEnd::Item) if item_depth > 0 => {
                item_depth -= 1;
                if item_depth == 0 && intro.features.len() < MAX_FEATURES {
                    let item = buf.trim().to_string();
                    if !item.is_empty() {
                        intro.features.push(item);
                    }
                    buf.clear();
                }
            }
            Event::Start(Tag::Paragraph) if after_title && item_depth == 0 => {
                in_paragraph = true;
                buf.clear();
            }
            Event::End(TagEnd::Paragraph) if in_paragraph => {
                in_paragraph = false;
                after_title = false;
                intro.description = Some(buf.trim().to_string()).filter(|d| !d.is_empty());
                buf.clear();
            }
            // Only the block directly after the title can be the description
            Event::Start(_) if after_title && !in_paragraph && item_depth == 0 => {
                after_title = false;
            }
            Event::Text(text) | Event::Code(text)
                if in_title || in_paragraph || item_depth > 0 =>
            {
                buf.push_str(&text);
            }
            Event::SoftBreak | Event::HardBreak if in_paragraph || item_depth > 0 => {
                buf.push(' ');
            }
            _ => {}
        }
    }
    intro
}

/// Stages one and two: no tags, no characters that end an attribute.
fn strip_attribute_breaking(text: &str) -> String {
    let text = TAG.replace_all(text, "");
    ATTRIBUTE_BREAKING.replace_all(&text, "").into_owned()
}

/// Stage three: allowlist for meta tag content.
fn meta_safe(text: &str) -> String {
    let text = NOT_META_SAFE.replace_all(text, "");
    metadata::truncate(text.trim(), metadata::MAX_DESCRIPTION)
}

struct ViewerLinks {
    download: String,
    nbviewer: String,
    colab: String,
}

impl ViewerLinks {
    fn new(source: &SourceFile, project: &Project) -> Self {
        let links = &project.config.links;
        let repo_path = format!(
            "{}/{}/blob/{}/{}",
            links.github_org,
            project.repo_name,
            links.branch,
            source.relative_display()
        );
        Self {
            download: source.file_name(),
            nbviewer: format!("https://nbviewer.org/github/{repo_path}"),
            colab: format!("https://colab.research.google.com/github/{repo_path}"),
        }
    }
}

fn widget(
    file_name: &str,
    title: &str,
    description: &str,
    features: &[String],
    links: &ViewerLinks,
) -> Markup {
    let id = naming::element_id(file_name);
    html! {
        div.jupyter-notebook-embed {
            h2 { "Jupyter Notebook: " (title) }
            div.notebook-action-buttons {
                a.notebook-btn.download-btn href=(links.download) download {
                    i.fa-solid.fa-download {} " Download Notebook"
                }
                a.notebook-btn.view-btn href=(links.nbviewer) target="_blank" {
                    i.fa-solid.fa-eye {} " View in nbviewer"
                }
                a.notebook-btn.colab-btn href=(links.colab) target="_blank" {
                    i.fa-solid.fa-play {} " Open in Colab"
                }
            }
            div.notebook-preview {
                h3 { "About this notebook" }
                p { (description) }
                h3 { "Key Features:" }
                ul {
                    @for feature in features {
                        li { (feature) }
                    }
                }
            }
            div.notebook-tip {
                p {
                    strong { "Tip:" }
                    " For the best interactive experience, download the notebook or open it in Google Colab."
                }
            }
            div.embedded-notebook {
                h3 { "Notebook Preview" }
                div id=(format!("notebook-container-{id}")) {
                    iframe id=(format!("notebook-iframe-{id}"))
                        src=(links.nbviewer)
                        width="100%" height="800px" frameborder="0"
                        onload=(format!("checkIframeLoaded('{id}')"))
                        onerror=(format!("handleIframeError('{id}')")) {}
                    div.notebook-error-message id=(format!("notebook-error-{id}")) style="display: none;" {
                        div.error-container {
                            i.fa-solid.fa-exclamation-triangle {}
                            h4 { "Notebook Preview Unavailable" }
                            p { "The notebook preview could not be loaded. This may be because:" }
                            ul {
                                li { "The notebook file is not yet available in the repository" }
                                li { "The nbviewer service is temporarily unavailable" }
                                li { "The repository is private or has access restrictions" }
                            }
                            p { "You can still download the notebook using the button above or view it directly through one of the external services." }
                        }
                    }
                }
            }
        }
        script { (PreEscaped(PREVIEW_SCRIPT)) }
    }
}

const PREVIEW_SCRIPT: &str = r#"
    function checkIframeLoaded(id) {
        try {
            const iframe = document.getElementById('notebook-iframe-' + id);
            const iframeContent = iframe.contentWindow || iframe.contentDocument;
            try {
                if (iframeContent.document.title.includes('404') ||
                    iframeContent.document.body.textContent.includes('404 Not Found')) {
                    handleIframeError(id);
                }
            } catch (e) {}
        } catch (e) {
            handleIframeError(id);
        }
    }

    function handleIframeError(id) {
        const iframe = document.getElementById('notebook-iframe-' + id);
        const errorDiv = document.getElementById('notebook-error-' + id);
        if (iframe && errorDiv) {
            iframe.style.display = 'none';
            errorDiv.style.display = 'block';
        }
    }

    document.addEventListener('DOMContentLoaded', function() {
        const iframes = document.querySelectorAll('iframe[id^="notebook-iframe-"]');
        iframes.forEach(iframe => {
            iframe.addEventListener('load', function() {
                const id = iframe.id.replace('notebook-iframe-', '');
                setTimeout(function() { checkIframeLoaded(id); }, 1000);
            });
        });
    });
"#;
