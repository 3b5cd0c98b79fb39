//! Name handling for source files and directories.
//!
//! Research repositories name files with underscores and dashes
//! (`bubble_burst-axi.c`, `get_eta.py`). These helpers turn such names into
//! readable words and keyword tokens:
//! - `bubble_burst-axi.c` → "bubble burst axi" (display words)
//! - `bubble_burst-axi.c` → `["bubble", "burst"]` (keyword tokens, length > 3)
//! - `postProcess` → "PostProcess" (directory fallback title)

/// Words of a file stem with `_` and `-` replaced by spaces.
///
/// `get_eta-axi` → "get eta axi".
pub fn stem_words(stem: &str) -> String {
    stem.replace(['_', '-'], " ")
}

/// Lowercased filename tokens longer than three characters.
///
/// Used as keyword candidates: `drop_impact-3D` → `["drop", "impact"]`.
pub fn keyword_tokens(stem: &str) -> Vec<String> {
    stem.split(['_', '-'])
        .filter(|part| part.chars().count() > 3)
        .map(str::to_lowercase)
        .collect()
}

/// Uppercase the first character, leave the rest alone.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The `id` suffix for a notebook's embedded viewer: dots become dashes.
pub fn element_id(file_name: &str) -> String {
    file_name.replace('.', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_words_replaces_separators() {
        assert_eq!(stem_words("bubble_burst-axi"), "bubble burst axi");
        assert_eq!(stem_words("plain"), "plain");
    }

    #[test]
    fn keyword_tokens_skip_short_parts() {
        assert_eq!(keyword_tokens("get_eta-Interface"), vec!["interface"]);
        assert_eq!(keyword_tokens("drop_impact-3D"), vec!["drop", "impact"]);
    }

    #[test]
    fn keyword_tokens_of_short_name_is_empty() {
        assert!(keyword_tokens("a_b").is_empty());
    }

    #[test]
    fn capitalize_first_char_only() {
        assert_eq!(capitalize("postProcess"), "PostProcess");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("élan"), "Élan");
    }

    #[test]
    fn element_id_replaces_dots() {
        assert_eq!(element_id("flow.v2.ipynb"), "flow-v2-ipynb");
    }
}
