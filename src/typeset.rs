//! Typesetting stage: markup plus metadata to a standalone HTML page.
//!
//! [`plan_page`] fixes where a page goes and how it is titled before any work
//! runs. [`typeset_page`] sanitizes the markup, hands it to the engine with
//! the page variables, and repairs the written document.

use crate::config::Project;
use crate::tools::{DocTools, PAGE_FORMAT, ToolError, TypesetParams};
use crate::types::{ConversionUnit, GeneratedPage, SeoMetadata, SourceFile, to_slash};
use maud::{DOCTYPE, PreEscaped, html};
use regex::{Captures, Regex};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TypesetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Typesetting failed: {0}")]
    Tool(#[from] ToolError),
}

/// Relative prefix from a page back to the docs root: `.`, `..`, `../..`.
pub fn asset_prefix(output: &Path, docs_root: &Path) -> String {
    let depth = output
        .strip_prefix(docs_root)
        .ok()
        .and_then(Path::parent)
        .map(|p| p.components().count())
        .unwrap_or(0);
    if depth == 0 {
        ".".to_string()
    } else {
        vec![".."; depth].join("/")
    }
}

/// Output location, URL and title for a source.
pub fn plan_page(source: &SourceFile, project: &Project) -> GeneratedPage {
    let output_path = project.output_path(source);
    let docs_root = project.docs_dir();
    let relative_output = to_slash(&source.output_relative());
    let page_url = format!("{}{}", project.config.base_url, relative_output).replace("//", "/");
    let page_title = source
        .relative_display()
        .trim_matches(|c| c == '-' || c == ' ' || c == '\t')
        .to_string();

    GeneratedPage {
        asset_prefix: asset_prefix(&output_path, &docs_root),
        source: source.clone(),
        output_path,
        page_title,
        page_url,
    }
}

/// Engine invocation for one page.
pub fn page_params(seo: &SeoMetadata, page: &GeneratedPage, project: &Project) -> TypesetParams {
    let params = TypesetParams::new(
        PAGE_FORMAT,
        project.template_path(),
        page.output_path.clone(),
    )
    .with_var("base", &project.config.base_url)
    .with_var("wikititle", &project.site_title)
    .with_var("pageUrl", &page.page_url)
    .with_var("pagetitle", &page.page_title)
    .with_var("reponame", &project.repo_name)
    .with_var("description", &seo.description)
    .with_var("keywords", &seo.keywords)
    .with_var("image", "")
    .with_var("asset_path_prefix", &page.asset_prefix)
    .with_var("repo_name", &project.repo_name)
    .with_var("source_path", page.source.relative_display());

    if page.source.kind.disables_mathjax() {
        params.with_var("mathjax", "null")
    } else {
        params
    }
}

/// Render one page and return the repaired HTML, which is also on disk.
pub fn typeset_page(
    unit: &ConversionUnit,
    page: &GeneratedPage,
    project: &Project,
    tools: &dyn DocTools,
) -> Result<String, TypesetError> {
    let markup = sanitize_input(&unit.markup);
    let params = page_params(&unit.seo, page, project);
    tools.typeset(&markup, &params)?;

    let html = fs::read_to_string(&page.output_path)?;
    let repaired = repair_document(&html, &unit.seo, &project.site_title, &page.page_title);
    if repaired != html {
        fs::write(&page.output_path, &repaired)?;
    }
    Ok(repaired)
}

// =============================================================================
// Input sanitization
// =============================================================================

static SELF_CLOSING_ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<a(\s[^>]*)?/>").unwrap());
static HTML_EXAMPLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```html(.*?)```").unwrap());
static EMPTY_ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<a\s+[^>]*>\s*</a>").unwrap());

/// Fix markup the engine would otherwise turn into broken HTML.
pub fn sanitize_input(markup: &str) -> String {
    let markup = SELF_CLOSING_ANCHOR.replace_all(markup, |caps: &Captures| {
        let attrs = caps.get(1).map_or("", |m| m.as_str().trim_end());
        format!("<a{attrs}></a>")
    });
    HTML_EXAMPLE
        .replace_all(&markup, |caps: &Captures| {
            let body = EMPTY_ANCHOR.replace_all(&caps[1], "/* anchor tag removed */");
            format!("```html{body}```")
        })
        .into_owned()
}

// =============================================================================
// Output repair
// =============================================================================

static MALFORMED_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<meta\s+name="description"\s+content="([^"]*(?:target|href|class|style|onclick)[^"]*)"[^>]*>"#,
    )
    .unwrap()
});

/// Replace description metas polluted by markup and ensure a full document.
pub fn repair_document(
    html: &str,
    seo: &SeoMetadata,
    site_title: &str,
    page_title: &str,
) -> String {
    let mut content = html.to_string();

    if MALFORMED_DESCRIPTION.is_match(&content) {
        tracing::debug!(page = page_title, "Replacing malformed description meta tag");
        content = MALFORMED_DESCRIPTION.replace_all(&content, "").into_owned();
        if !seo.description.is_empty() {
            if let Some(pos) = content.find("</head>") {
                // Already escaped for attribute context by metadata extraction.
                let tag = format!(
                    "  <meta name=\"description\" content=\"{}\">\n  ",
                    seo.description
                );
                content.insert_str(pos, &tag);
            }
        }
    }

    if !content.contains("<!DOCTYPE") || !content.contains("<html") {
        tracing::warn!(page = page_title, "Typeset output lacks a document shell, wrapping it");
        content = html! {
            (DOCTYPE)
            html xmlns="http://www.w3.org/1999/xhtml" {
                head {
                    meta http-equiv="Content-Type" content="text/html; charset=UTF-8";
                    title { (site_title) " - " (page_title) }
                    meta name="description" content=(PreEscaped(&seo.description));
                    meta name="keywords" content=(seo.keywords);
                }
                body {
                    (PreEscaped(&content))
                }
            }
        }
        .into_string();
    }

    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::test_helpers::write_file;
    use crate::tools::backend::tests::{MockTools, RecordedOp};
    use tempfile::TempDir;

    fn project(root: &Path) -> Project {
        Project::from_config(
            root.to_path_buf(),
            SiteConfig {
                repo_name: Some("bubbles".into()),
                site_title: Some("Bubbles".into()),
                ..SiteConfig::default()
            },
        )
    }

    fn seo() -> SeoMetadata {
        SeoMetadata {
            description: "Drop impact setup.".into(),
            keywords: "drop, impact".into(),
            title: None,
        }
    }

    fn var<'a>(vars: &'a [(String, String)], name: &str) -> Option<&'a str> {
        vars.iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    // =========================================================================
    // Asset prefix
    // =========================================================================

    #[test]
    fn asset_prefix_by_depth() {
        let docs = Path::new("/r/docs");
        assert_eq!(asset_prefix(Path::new("/r/docs/run.sh.html"), docs), ".");
        assert_eq!(
            asset_prefix(Path::new("/r/docs/src-local/a.h.html"), docs),
            ".."
        );
        assert_eq!(
            asset_prefix(Path::new("/r/docs/a/b/c/x.py.html"), docs),
            "../../.."
        );
    }

    // =========================================================================
    // Planning
    // =========================================================================

    #[test]
    fn plan_page_paths_and_title() {
        let tmp = TempDir::new().unwrap();
        let project = project(tmp.path());
        let path = write_file(tmp.path(), "simulationCases/utils/get_eta.py", "");
        let source = SourceFile::new(tmp.path(), &path).unwrap();

        let page = plan_page(&source, &project);
        assert_eq!(
            page.output_path,
            tmp.path().join("docs/simulationCases/utils/get_eta.py.html")
        );
        assert_eq!(page.page_url, "/simulationCases/utils/get_eta.py.html");
        assert_eq!(page.page_title, "simulationCases/utils/get_eta.py");
        assert_eq!(page.asset_prefix, "../..");
    }

    #[test]
    fn params_carry_every_variable() {
        let tmp = TempDir::new().unwrap();
        let project = project(tmp.path());
        let path = write_file(tmp.path(), "src-local/params.h", "");
        let page = plan_page(&SourceFile::new(tmp.path(), &path).unwrap(), &project);

        let params = page_params(&seo(), &page, &project);
        let vars = &params.variables;
        assert_eq!(var(vars, "base"), Some("/"));
        assert_eq!(var(vars, "wikititle"), Some("Bubbles"));
        assert_eq!(var(vars, "pageUrl"), Some("/src-local/params.h.html"));
        assert_eq!(var(vars, "reponame"), Some("bubbles"));
        assert_eq!(var(vars, "repo_name"), Some("bubbles"));
        assert_eq!(var(vars, "description"), Some("Drop impact setup."));
        assert_eq!(var(vars, "image"), Some(""));
        assert_eq!(var(vars, "asset_path_prefix"), Some(".."));
        assert_eq!(var(vars, "source_path"), Some("src-local/params.h"));
        assert_eq!(var(vars, "mathjax"), None);
    }

    #[test]
    fn shell_pages_disable_mathjax() {
        let tmp = TempDir::new().unwrap();
        let project = project(tmp.path());
        for rel in ["run.sh", "Makefile", "simulationCases/a.ipynb"] {
            let path = write_file(tmp.path(), rel, "");
            let page = plan_page(&SourceFile::new(tmp.path(), &path).unwrap(), &project);
            let params = page_params(&seo(), &page, &project);
            assert_eq!(var(&params.variables, "mathjax"), Some("null"), "{rel}");
        }
    }

    // =========================================================================
    // Sanitization
    // =========================================================================

    #[test]
    fn self_closing_anchor_is_expanded() {
        assert_eq!(
            sanitize_input(r#"see <a id="top"/> here"#),
            r#"see <a id="top"></a> here"#
        );
        assert_eq!(sanitize_input("<a/>"), "<a></a>");
    }

    #[test]
    fn empty_anchor_in_html_example_is_replaced() {
        let md = "text <a href=\"x\"></a>\n```html\n<a href=\"#\"> </a>\n```\n";
        let out = sanitize_input(md);
        assert!(out.starts_with("text <a href=\"x\"></a>"));
        assert!(out.contains("```html\n/* anchor tag removed */\n```"));
    }

    // =========================================================================
    // Repair
    // =========================================================================

    #[test]
    fn malformed_description_replaced_before_head_end() {
        let html = "<!DOCTYPE html>\n<html>\n<head>\n<meta name=\"description\" content=\"see target=_blank\">\n</head>\n<body></body>\n</html>";
        let out = repair_document(html, &seo(), "Bubbles", "a.py");
        assert!(!out.contains("target=_blank"));
        assert!(
            out.contains("  <meta name=\"description\" content=\"Drop impact setup.\">\n  </head>")
        );
    }

    #[test]
    fn repaired_description_is_escaped_once() {
        let seo = SeoMetadata {
            description: crate::metadata::attribute_safe("Sets the style & layout."),
            ..seo()
        };
        let expected = "content=\"Sets the style &amp; layout.\"";

        let html = "<!DOCTYPE html>\n<html>\n<head>\n<meta name=\"description\" content=\"style\">\n</head>\n<body></body>\n</html>";
        let repaired = repair_document(html, &seo, "Bubbles", "a.py");
        assert!(repaired.contains(expected), "{repaired}");
        assert!(!repaired.contains("&amp;amp;"));

        let wrapped = repair_document("<p>body</p>", &seo, "Bubbles", "a.py");
        assert!(wrapped.contains(expected), "{wrapped}");
        assert!(!wrapped.contains("&amp;amp;"));
    }

    #[test]
    fn clean_document_is_unchanged() {
        let html = "<!DOCTYPE html>\n<html>\n<head>\n<meta name=\"description\" content=\"ok\">\n</head>\n<body></body>\n</html>";
        assert_eq!(repair_document(html, &seo(), "Bubbles", "a.py"), html);
    }

    #[test]
    fn fragment_is_wrapped_in_shell() {
        let out = repair_document("<p>body</p>", &seo(), "Bubbles", "a.py");
        assert!(out.starts_with("<!DOCTYPE html>"));
        assert!(out.contains("<title>Bubbles - a.py</title>"));
        assert!(out.contains("<meta name=\"keywords\" content=\"drop, impact\">"));
        assert!(out.contains("<p>body</p>"));
    }

    // =========================================================================
    // Whole stage
    // =========================================================================

    #[test]
    fn typeset_page_writes_and_returns_html() {
        let tmp = TempDir::new().unwrap();
        let project = project(tmp.path());
        let path = write_file(tmp.path(), "simulationCases/drop.py", "");
        let page = plan_page(&SourceFile::new(tmp.path(), &path).unwrap(), &project);
        fs::create_dir_all(page.output_path.parent().unwrap()).unwrap();
        let tools = MockTools::new();
        let unit = ConversionUnit {
            markup: "<a name=\"x\"/>hello".into(),
            seo: seo(),
        };

        let html = typeset_page(&unit, &page, &project, &tools).unwrap();

        assert!(html.contains("<title>simulationCases/drop.py</title>"));
        assert_eq!(fs::read_to_string(&page.output_path).unwrap(), html);
        match &tools.get_operations()[0] {
            RecordedOp::Typeset { markup, .. } => assert!(markup.contains("<a name=\"x\"></a>")),
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn typeset_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        let project = project(tmp.path());
        let path = write_file(tmp.path(), "simulationCases/drop.py", "");
        let page = plan_page(&SourceFile::new(tmp.path(), &path).unwrap(), &project);
        let tools = MockTools {
            fail_typeset: vec!["drop.py".into()],
            ..MockTools::default()
        };
        let unit = ConversionUnit {
            markup: "x".into(),
            seo: seo(),
        };

        let err = typeset_page(&unit, &page, &project, &tools).unwrap_err();
        assert!(matches!(err, TypesetError::Tool(_)));
    }
}
