//! Search-engine metadata for generated pages.
//!
//! Every page gets a description (at most 160 characters, safe inside a
//! double-quoted attribute) and a comma-joined keyword list.
//!
//! ## Resolution Order
//!
//! 1. **Embedded comment**: a transformer may prepend
//!    `<!--SEO_METADATA:{json}-->` to its markup. When present it always wins,
//!    and the comment is removed before typesetting.
//! 2. **Heuristic**: the paragraph after the first heading, or the heading
//!    itself when that paragraph is missing or looks like code.
//! 3. **Default**: "Documentation for <file words> in the <project> framework."
//!
//! Keywords come from filename tokens and declaration names found in the
//! markup (`def x`, `class x`, `function x`, `#include "x"`), at most ten,
//! sorted. When nothing qualifies, the configured default set is used.

use crate::config::SiteConfig;
use crate::naming;
use crate::types::{ConversionUnit, SeoMetadata, SourceFile};
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Maximum description length in characters.
pub const MAX_DESCRIPTION: usize = 160;
const MAX_KEYWORDS: usize = 10;

static SEO_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--SEO_METADATA:(.*?)-->\n?").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static EMBEDDED_UNSAFE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["'\\<>]"#).unwrap());
static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[#`*_]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:function|class|def)\s+([a-zA-Z_][a-zA-Z0-9_]*)|#include\s+["<]([^">]+)[">]"#)
        .unwrap()
});

/// Metadata a transformer embeds in its markup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
}

impl EmbeddedMetadata {
    /// Render as the single-line comment understood by [`take_embedded`].
    pub fn to_comment(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("<!--SEO_METADATA:{json}-->\n")
    }
}

/// Remove the embedded comment from `markup` and parse it.
///
/// A comment with invalid JSON is still removed; the page then falls back to
/// heuristic extraction.
pub fn take_embedded(markup: &str) -> (Option<EmbeddedMetadata>, String) {
    let Some(caps) = SEO_COMMENT.captures(markup) else {
        return (None, markup.to_string());
    };
    let parsed = match serde_json::from_str::<EmbeddedMetadata>(&caps[1]) {
        Ok(meta) => Some(meta),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed embedded metadata");
            None
        }
    };
    (parsed, SEO_COMMENT.replace(markup, "").into_owned())
}

/// Derive page metadata and return the markup ready for typesetting.
pub fn attach(source: &SourceFile, markup: String, config: &SiteConfig) -> ConversionUnit {
    let (embedded, markup) = take_embedded(&markup);

    let seo = match embedded {
        Some(meta) => SeoMetadata {
            description: attribute_safe(&EMBEDDED_UNSAFE.replace_all(
                &TAG.replace_all(&meta.description, ""),
                "",
            )),
            keywords: meta
                .keywords
                .unwrap_or_else(|| config.default_keywords.clone()),
            title: meta.title,
        },
        None => SeoMetadata {
            description: attribute_safe(
                &heading_description(&markup)
                    .map(|d| clean_description(&d))
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| default_description(source, config)),
            ),
            keywords: keywords(source, &markup)
                .unwrap_or_else(|| config.default_keywords.clone()),
            title: None,
        },
    };

    ConversionUnit { markup, seo }
}

/// Text of the first heading's following paragraph, or the heading itself.
fn heading_description(markup: &str) -> Option<String> {
    let mut heading: Option<String> = None;
    let mut in_heading = false;
    let mut in_paragraph = false;
    let mut starts_with_code = false;
    let mut buf = String::new();

    for event in Parser::new(markup) {
        match event {
            Event::Start(Tag::Heading { .. }) if heading.is_none() => {
                in_heading = true;
                buf.clear();
            }
            Event::End(TagEnd::Heading(_)) if in_heading => {
                in_heading = false;
                heading = Some(buf.trim().to_string());
                buf.clear();
            }
            // Anything but prose right after the heading: use the heading
            Event::Start(Tag::Heading { .. } | Tag::CodeBlock(_)) | Event::Html(_)
                if heading.is_some() && !in_paragraph =>
            {
                return heading;
            }
            Event::Start(Tag::Paragraph) if heading.is_some() => {
                in_paragraph = true;
            }
            Event::End(TagEnd::Paragraph) if in_paragraph => {
                let text = buf.trim();
                let prose = !starts_with_code
                    && !text.starts_with("//")
                    && text.chars().next().is_some_and(char::is_alphabetic);
                return if prose { Some(text.to_string()) } else { heading };
            }
            Event::Code(code) if in_paragraph || in_heading => {
                if in_paragraph && buf.is_empty() {
                    starts_with_code = true;
                }
                buf.push_str(&code);
            }
            Event::Text(text) if in_paragraph || in_heading => buf.push_str(&text),
            Event::SoftBreak | Event::HardBreak if in_paragraph => buf.push(' '),
            _ => {}
        }
    }
    heading
}

/// Strip emphasis characters, collapse whitespace, truncate.
fn clean_description(text: &str) -> String {
    let text = EMPHASIS.replace_all(text, "");
    let text = WHITESPACE.replace_all(&text, " ");
    truncate(text.trim(), MAX_DESCRIPTION)
}

fn default_description(source: &SourceFile, config: &SiteConfig) -> String {
    let text = format!(
        "Documentation for {} in the {} framework.",
        naming::stem_words(&source.stem()),
        config.project_name
    );
    text.chars().take(MAX_DESCRIPTION).collect()
}

/// Filename tokens plus declared identifiers, or `None` when there are none.
fn keywords(source: &SourceFile, markup: &str) -> Option<String> {
    let mut found: BTreeSet<String> = source
        .stem()
        .split(' ')
        .flat_map(naming::keyword_tokens)
        .collect();

    for caps in DECLARATION.captures_iter(markup) {
        if let Some(name) = caps.get(1).or_else(|| caps.get(2)) {
            if name.as_str().chars().count() > 3 {
                found.insert(name.as_str().to_lowercase());
            }
        }
    }

    if found.is_empty() {
        return None;
    }
    Some(
        found
            .into_iter()
            .take(MAX_KEYWORDS)
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Shorten to `max` characters, ending in `...` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Make `text` safe inside a double-quoted attribute, within the length cap.
///
/// Tags are removed, `"` becomes `'`, stray angle brackets are dropped and the
/// rest is HTML-escaped. Escaping may lengthen the text, so the cut point
/// moves back until the escaped form fits.
pub fn attribute_safe(text: &str) -> String {
    let plain: String = TAG
        .replace_all(text, "")
        .replace('"', "'")
        .chars()
        .filter(|c| !matches!(c, '<' | '>'))
        .collect();

    let mut limit = MAX_DESCRIPTION;
    loop {
        let escaped = html_escape::encode_text(&truncate(&plain, limit)).into_owned();
        if escaped.chars().count() <= MAX_DESCRIPTION || limit <= 3 {
            return escaped;
        }
        let excess = escaped.chars().count() - MAX_DESCRIPTION;
        limit = limit.saturating_sub(excess).max(3);
    }
}
