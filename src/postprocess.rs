//! HTML rewriting after typesetting.
//!
//! All passes are pure `&str -> String` functions over precompiled regexes so
//! they can be tested without files or subprocesses. Two branch entry points
//! combine them:
//!
//! - [`process_script_html`] for markdown, scripts, shell, build files,
//!   notebooks and the root index
//! - [`process_compiled_html`] for C sources and headers, after the
//!   declaration-anchor tool has run
//!
//! [`inject_copy_button`] and [`inject_css_link`] detect earlier injections
//! and leave such documents unchanged.

use crate::types::to_slash;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;

const CONTAINER_OPEN: &str = "<div class=\"code-block-container\">";

static PRE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<pre[^>]*><code[^>]*>.*?</code></pre>").unwrap());
static SOURCE_CODE_DIV: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div class="sourceCode" id="cb\d+"[^>]*>(.*?)</div>"#).unwrap()
});
static ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a[^>]+href="([^"]+)"[^>]*>[^<]+</a>"#).unwrap());
static SOURCE_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(c|h|py|sh|md)$").unwrap());
static DYNAMIC_PATH_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<script[^>]*>\s*(?:// Dynamic base path resolution|// Helper function to create dynamic asset paths|window\.basePath\s*=|function\s+assetPath).*?</script>",
    )
    .unwrap()
});
static BODY_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<body[^>]*>").unwrap());
static LINE_NUMBERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\s*(?:<span class="[^"]*">\s*\d+\s*</span>|\s+\d+)\s*)+(\s*</span>)"#).unwrap()
});
static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)(<span class="pp">#include\s*</span>)(<span class="im">)(?:"|&quot;)(.*?)(?:"|&quot;)(</span>)"#,
    )
    .unwrap()
});

// =============================================================================
// Branch pipelines
// =============================================================================

/// Post-processing for everything except compiled-language sources.
pub fn process_script_html(html: &str, repo_name: &str) -> String {
    let html = wrap_code_blocks(html);
    let html = fix_doc_links(&html);
    let html = strip_dynamic_path_scripts(&html);
    inject_repo_name(&html, repo_name)
}

/// Post-processing for compiled-language sources.
///
/// `resolve` maps an include name to its link target.
pub fn process_compiled_html(
    html: &str,
    repo_name: &str,
    resolve: impl Fn(&str) -> IncludeLink,
) -> String {
    let html = strip_line_numbers(html);
    let html = wrap_code_blocks(&html);
    let html = link_includes(&html, resolve);
    let html = strip_dynamic_path_scripts(&html);
    inject_repo_name(&html, repo_name)
}

// =============================================================================
// Individual passes
// =============================================================================

/// Wrap engine code containers and bare `<pre><code>` blocks in a styling div.
pub fn wrap_code_blocks(html: &str) -> String {
    let html = SOURCE_CODE_DIV.replace_all(html, |caps: &Captures| {
        format!("{CONTAINER_OPEN}{}</div>", &caps[1])
    });

    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for m in PRE_CODE.find_iter(&html) {
        out.push_str(&html[last..m.start()]);
        if out.ends_with(CONTAINER_OPEN) {
            out.push_str(m.as_str());
        } else {
            out.push_str(CONTAINER_OPEN);
            out.push_str(m.as_str());
            out.push_str("</div>");
        }
        last = m.end();
    }
    out.push_str(&html[last..]);
    out
}

/// Point links at rendered pages: `utils.h` → `utils.h.html`.
///
/// External, fragment-only, and already rendered links are left alone.
pub fn fix_doc_links(html: &str) -> String {
    ANCHOR
        .replace_all(html, |caps: &Captures| {
            let tag = &caps[0];
            let href = &caps[1];
            if href.starts_with("http")
                || href.starts_with('#')
                || href.ends_with(".html")
                || !SOURCE_EXTENSION.is_match(href)
            {
                return tag.to_string();
            }
            tag.replacen(
                &format!("href=\"{href}\""),
                &format!("href=\"{href}.html\""),
                1,
            )
        })
        .into_owned()
}

/// Remove client-side path resolution scripts left over from older templates.
pub fn strip_dynamic_path_scripts(html: &str) -> String {
    DYNAMIC_PATH_SCRIPT.replace_all(html, "").into_owned()
}

/// Declare `window.repoName` right after `<body>`.
pub fn inject_repo_name(html: &str, repo_name: &str) -> String {
    if html.contains("window.repoName =") {
        return html.to_string();
    }
    let literal = serde_json::to_string(repo_name).unwrap_or_else(|_| "\"\"".to_string());
    BODY_OPEN
        .replacen(html, 1, |caps: &Captures| {
            format!("{}\n<script>window.repoName = {literal};</script>\n", &caps[0])
        })
        .into_owned()
}

/// Drop the per-line number spans the engine leaves before closing spans.
pub fn strip_line_numbers(html: &str) -> String {
    LINE_NUMBERS.replace_all(html, "$2").into_owned()
}

/// Where an `#include` should point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeLink {
    pub href: String,
    pub title: String,
}

/// Wrap each `#include "name"` span in a link chosen by `resolve`.
pub fn link_includes(html: &str, resolve: impl Fn(&str) -> IncludeLink) -> String {
    INCLUDE
        .replace_all(html, |caps: &Captures| {
            let name = &caps[3];
            let link = resolve(name);
            format!(
                "{}<a href=\"{}\" title=\"{}\">{}\"{}\"{}</a>",
                &caps[1],
                html_escape::encode_double_quoted_attribute(&link.href),
                html_escape::encode_double_quoted_attribute(&link.title),
                &caps[2],
                name,
                &caps[4]
            )
        })
        .into_owned()
}

/// Relative URL from `from_dir` to `target`, both absolute.
pub fn relative_href(from_dir: &Path, target: &Path) -> String {
    match pathdiff::diff_paths(target, from_dir) {
        Some(rel) => to_slash(&rel),
        None => to_slash(target),
    }
}

// =============================================================================
// Idempotent injections
// =============================================================================

const COPY_BUTTON_MARKER: &str = "class=\"copy-button\"";
const COPY_SCRIPT_ID: &str = "copy-button-script";

/// Add the copy-to-clipboard script before `</body>`.
pub fn inject_copy_button(html: &str) -> String {
    if html.contains(COPY_BUTTON_MARKER) || html.contains(COPY_SCRIPT_ID) {
        return html.to_string();
    }
    let script = format!(
        "\n<script type=\"text/javascript\" id=\"{COPY_SCRIPT_ID}\">{COPY_BUTTON_SCRIPT}</script>\n"
    );
    if let Some(pos) = html.find("</body>") {
        let mut out = html.to_string();
        out.insert_str(pos, &script);
        return out;
    }
    if html.contains("<body") {
        return format!("{html}{script}");
    }
    document_shell(html! {}, &format!("{html}\n{script}"))
}

/// Stylesheet href for a page with the given asset prefix.
pub fn stylesheet_href(asset_prefix: &str, stylesheet: &str) -> String {
    if asset_prefix == "." {
        stylesheet.to_string()
    } else {
        format!("{asset_prefix}/{stylesheet}")
    }
}

/// Add a stylesheet link inside `<head>`.
pub fn inject_css_link(html: &str, href: &str) -> String {
    if html.contains(&format!("link href=\"{href}\"")) {
        return html.to_string();
    }
    let link = format!("<link href=\"{href}\" rel=\"stylesheet\" type=\"text/css\" />");
    if let Some(pos) = html.find("</head>") {
        let mut out = html.to_string();
        out.insert_str(pos, &format!("    {link}\n    "));
        return out;
    }
    if let Some(pos) = html.find("<head>") {
        let mut out = html.to_string();
        out.insert_str(pos + "<head>".len(), &format!("\n    {link}"));
        return out;
    }
    document_shell(html! { (PreEscaped(link)) }, html)
}

/// A minimal valid document around an HTML fragment.
pub fn document_shell(head: Markup, body: &str) -> String {
    html! {
        (DOCTYPE)
        html xmlns="http://www.w3.org/1999/xhtml" {
            head {
                meta http-equiv="Content-Type" content="text/html; charset=UTF-8";
                (head)
            }
            body {
                (PreEscaped(body))
            }
        }
    }
    .into_string()
}

const COPY_BUTTON_SCRIPT: &str = r#"
document.addEventListener('DOMContentLoaded', function() {
    const codeBlocks = document.querySelectorAll('.code-block-container pre');
    codeBlocks.forEach(function(codeBlock) {
        const button = document.createElement('button');
        button.className = 'copy-button';
        button.textContent = 'Copy';
        button.setAttribute('aria-label', 'Copy code to clipboard');
        button.setAttribute('data-copy-state', 'copy');

        const container = codeBlock.parentNode;
        container.appendChild(button);

        button.addEventListener('click', async function() {
            const codeText = codeBlock.textContent;
            try {
                if (navigator.clipboard && navigator.clipboard.writeText) {
                    await navigator.clipboard.writeText(codeText);
                    updateButtonState(button, 'success');
                } else {
                    const textarea = document.createElement('textarea');
                    textarea.value = codeText;
                    textarea.style.position = 'fixed';
                    document.body.appendChild(textarea);
                    textarea.select();
                    const successful = document.execCommand('copy');
                    document.body.removeChild(textarea);
                    updateButtonState(button, successful ? 'success' : 'error');
                }
            } catch (err) {
                console.error('Copy failed:', err);
                updateButtonState(button, 'error');
            }
        });
    });

    function updateButtonState(button, state) {
        if (state === 'success') {
            button.textContent = 'Copied!';
            button.classList.add('copied');
        } else if (state === 'error') {
            button.textContent = 'Error!';
            button.classList.add('error');
        }
        setTimeout(function() {
            button.textContent = 'Copy';
            button.classList.remove('copied', 'error');
        }, 2000);
    }
});
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = "<!DOCTYPE html>\n<html>\n<head>\n<title>t</title>\n</head>\n<body class=\"doc\">\n<p>x</p>\n</body>\n</html>\n";

    // =========================================================================
    // Code blocks
    // =========================================================================

    #[test]
    fn wraps_bare_pre_code() {
        let out = wrap_code_blocks("<pre><code>x = 1</code></pre>");
        assert_eq!(
            out,
            "<div class=\"code-block-container\"><pre><code>x = 1</code></pre></div>"
        );
    }

    #[test]
    fn source_code_div_becomes_single_container() {
        let html = "<div class=\"sourceCode\" id=\"cb1\"><pre class=\"sourceCode python\"><code class=\"sourceCode python\">a</code></pre></div>";
        let out = wrap_code_blocks(html);
        assert_eq!(out.matches(CONTAINER_OPEN).count(), 1);
        assert!(out.starts_with(CONTAINER_OPEN));
        assert!(!out.contains("sourceCode\" id=\"cb1\""));
    }

    #[test]
    fn multiline_code_is_wrapped() {
        let out = wrap_code_blocks("<PRE class=\"x\"><code>a\nb</code></PRE>");
        assert!(out.starts_with(CONTAINER_OPEN));
    }

    // =========================================================================
    // Links
    // =========================================================================

    #[test]
    fn source_links_get_html_extension() {
        let out = fix_doc_links(r#"<a href="utils/helpers.py">helpers</a>"#);
        assert_eq!(out, r#"<a href="utils/helpers.py.html">helpers</a>"#);
    }

    #[test]
    fn external_anchor_and_rendered_links_untouched() {
        for html in [
            r#"<a href="https://x.org/a.c">a</a>"#,
            r##"<a href="#sec.c">a</a>"##,
            r#"<a href="a.c.html">a</a>"#,
            r#"<a href="data.csv">a</a>"#,
        ] {
            assert_eq!(fix_doc_links(html), html);
        }
    }

    #[test]
    fn link_with_extra_attributes_is_rewritten() {
        let out = fix_doc_links(r#"<a class="ref" href="../src-local/params.h" title="p">params</a>"#);
        assert!(out.contains(r#"href="../src-local/params.h.html""#));
    }

    // =========================================================================
    // Scripts
    // =========================================================================

    #[test]
    fn strips_dynamic_path_scripts() {
        let html = "<head><script>\n// Dynamic base path resolution\nvar a;</script><script>window.basePath = '/';</script><script>function assetPath(p) {}</script><script>keep()</script></head>";
        assert_eq!(
            strip_dynamic_path_scripts(html),
            "<head><script>keep()</script></head>"
        );
    }

    #[test]
    fn repo_name_injected_once_after_body() {
        let once = inject_repo_name(PAGE, "bubbles");
        assert!(once.contains(
            "<body class=\"doc\">\n<script>window.repoName = \"bubbles\";</script>\n"
        ));
        assert_eq!(inject_repo_name(&once, "bubbles"), once);
    }

    #[test]
    fn repo_name_is_js_escaped() {
        let out = inject_repo_name("<body>", "a\"b");
        assert!(out.contains(r#"window.repoName = "a\"b";"#));
    }

    // =========================================================================
    // Compiled branch
    // =========================================================================

    #[test]
    fn strips_trailing_line_numbers() {
        let html = r#"<span class="co">// c</span><span class="ln"> 12 </span></span>"#;
        assert_eq!(
            strip_line_numbers(html),
            r#"<span class="co">// c</span></span>"#
        );
    }

    fn include_html(name: &str) -> String {
        format!(
            "<span class=\"pp\">#include </span><span class=\"im\">&quot;{name}&quot;</span>"
        )
    }

    #[test]
    fn include_wrapped_in_resolved_link() {
        let out = link_includes(&include_html("params.h"), |name| IncludeLink {
            href: format!("../src-local/{name}.html"),
            title: format!("Link to local documentation for {name}"),
        });
        assert_eq!(
            out,
            "<span class=\"pp\">#include </span><a href=\"../src-local/params.h.html\" \
             title=\"Link to local documentation for params.h\"><span class=\"im\">\"params.h\"</span></a>"
        );
    }

    #[test]
    fn angle_bracket_includes_untouched() {
        let html = "<span class=\"pp\">#include </span><span class=\"im\">&lt;stdio.h&gt;</span>";
        let out = link_includes(html, |_| panic!("should not resolve"));
        assert_eq!(out, html);
    }

    #[test]
    fn compiled_branch_runs_all_passes() {
        let html = format!(
            "<body><pre><code>{}</code></pre></body>",
            include_html("navier-stokes/centered.h")
        );
        let out = process_compiled_html(&html, "bubbles", |name| IncludeLink {
            href: format!("http://basilisk.fr/src/{name}"),
            title: String::new(),
        });
        assert!(out.contains("href=\"http://basilisk.fr/src/navier-stokes/centered.h\""));
        assert!(out.contains(CONTAINER_OPEN));
        assert!(out.contains("window.repoName"));
    }

    #[test]
    fn relative_href_between_docs_dirs() {
        assert_eq!(
            relative_href(
                Path::new("/r/docs/simulationCases"),
                Path::new("/r/docs/src-local/params.h.html")
            ),
            "../src-local/params.h.html"
        );
        assert_eq!(
            relative_href(Path::new("/r/docs"), Path::new("/r/docs/src-local/a.h.html")),
            "src-local/a.h.html"
        );
        assert_eq!(
            relative_href(
                Path::new("/r/docs/a/b"),
                Path::new("/r/docs/src-local/params.h.html")
            ),
            "../../src-local/params.h.html"
        );
    }

    // =========================================================================
    // Idempotent injections
    // =========================================================================

    #[test]
    fn copy_button_injected_before_body_end() {
        let out = inject_copy_button(PAGE);
        let script = out.find(COPY_SCRIPT_ID).unwrap();
        assert!(script < out.find("</body>").unwrap());
    }

    #[test]
    fn copy_button_injection_is_idempotent() {
        let once = inject_copy_button(PAGE);
        assert_eq!(inject_copy_button(&once), once);
    }

    #[test]
    fn copy_button_respects_existing_marker() {
        let html = "<body><button class=\"copy-button\">Copy</button></body>";
        assert_eq!(inject_copy_button(html), html);
    }

    #[test]
    fn copy_button_appended_without_body_end() {
        let out = inject_copy_button("<body><p>x</p>");
        assert!(out.starts_with("<body><p>x</p>"));
        assert!(out.contains(COPY_SCRIPT_ID));
    }

    #[test]
    fn copy_button_fragment_gets_shell() {
        let out = inject_copy_button("<p>x</p>");
        assert!(out.starts_with("<!DOCTYPE html>"));
        assert!(out.contains("<p>x</p>"));
        assert!(out.contains(COPY_SCRIPT_ID));
    }

    #[test]
    fn stylesheet_href_follows_prefix() {
        assert_eq!(stylesheet_href(".", "custom_styles.css"), "custom_styles.css");
        assert_eq!(stylesheet_href("../..", "custom_styles.css"), "../../custom_styles.css");
    }

    #[test]
    fn css_link_injection_is_idempotent() {
        let once = inject_css_link(PAGE, "../custom_styles.css");
        assert!(once.contains(
            "<link href=\"../custom_styles.css\" rel=\"stylesheet\" type=\"text/css\" />"
        ));
        assert!(once.find("custom_styles").unwrap() < once.find("</head>").unwrap());
        assert_eq!(inject_css_link(&once, "../custom_styles.css"), once);
    }

    #[test]
    fn css_and_copy_button_together_are_idempotent() {
        let once = inject_copy_button(&inject_css_link(PAGE, "s.css"));
        let twice = inject_copy_button(&inject_css_link(&once, "s.css"));
        assert_eq!(twice, once);
    }

    #[test]
    fn css_link_after_head_open_without_head_end() {
        let out = inject_css_link("<head><title>t</title>", "s.css");
        assert!(out.starts_with("<head>\n    <link href=\"s.css\""));
    }

    #[test]
    fn css_link_fragment_gets_shell() {
        let out = inject_css_link("<p>x</p>", "s.css");
        assert!(out.starts_with("<!DOCTYPE html>"));
        assert!(out.contains("<link href=\"s.css\""));
    }
}
