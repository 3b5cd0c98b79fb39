//! Python scripts to literate markdown.
//!
//! Triple-quoted docstrings become prose; every run of code between them
//! becomes one fenced `python` block. Blank lines inside a run stay in the
//! block. A file that ends inside a run or a docstring is closed normally.

const QUOTES: [&str; 2] = ["\"\"\"", "'''"];

pub fn to_markdown(content: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut code: Vec<&str> = Vec::new();
    // Open docstring: closing quote and collected lines
    let mut docstring: Option<(&str, Vec<String>)> = None;

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some((quote, lines)) = docstring.as_mut() {
            if trimmed.starts_with(*quote) || trimmed.ends_with(*quote) {
                let text = trimmed.trim_start_matches(*quote).trim_end_matches(*quote);
                if !text.trim().is_empty() {
                    lines.push(text.trim().to_string());
                }
                let (_, lines) = docstring.take().unwrap_or_default();
                push_prose(&mut out, lines);
            } else {
                lines.push(trimmed.to_string());
            }
            continue;
        }

        if let Some(quote) = QUOTES.iter().find(|q| trimmed.starts_with(**q)) {
            flush_code(&mut out, &mut code);
            let rest = &trimmed[quote.len()..];
            match rest.strip_suffix(*quote) {
                // One-line docstring
                Some(text) => push_prose(&mut out, vec![text.trim().to_string()]),
                None => {
                    let first = rest.trim();
                    let lines = if first.is_empty() {
                        Vec::new()
                    } else {
                        vec![first.to_string()]
                    };
                    docstring = Some((*quote, lines));
                }
            }
            continue;
        }

        if !code.is_empty() || !trimmed.is_empty() {
            code.push(line);
        } else {
            out.push(String::new());
        }
    }

    flush_code(&mut out, &mut code);
    if let Some((_, lines)) = docstring {
        push_prose(&mut out, lines);
    }

    out.join("\n")
}

fn push_prose(out: &mut Vec<String>, lines: Vec<String>) {
    if lines.is_empty() {
        return;
    }
    out.push(String::new());
    out.extend(lines);
    out.push(String::new());
}

fn flush_code(out: &mut Vec<String>, code: &mut Vec<&str>) {
    while code.last().is_some_and(|l| l.trim().is_empty()) {
        code.pop();
    }
    if code.is_empty() {
        return;
    }
    let fence = fence_for(code);
    out.push(format!("{fence}python"));
    out.extend(code.drain(..).map(str::to_string));
    out.push(fence);
}

/// A backtick fence longer than any backtick run inside the block.
pub(crate) fn fence_for(lines: &[&str]) -> String {
    let longest = lines
        .iter()
        .flat_map(|l| l.split(|c| c != '`'))
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fence_lines(md: &str) -> usize {
        md.lines().filter(|l| l.trim_start().starts_with("```")).count()
    }

    #[test]
    fn docstring_becomes_prose_and_code_is_fenced() {
        let src = "\"\"\"\n# Interface tools\n\nHelpers for the interface.\n\"\"\"\nimport os\n\nx = 1\n";
        let md = to_markdown(src);

        assert!(md.contains("# Interface tools"));
        assert!(md.contains("Helpers for the interface."));
        assert!(md.contains("```python\nimport os\n\nx = 1\n```"));
    }

    #[test]
    fn eof_inside_code_block_closes_fence() {
        let md = to_markdown("\"\"\"Doc.\"\"\"\ndef f():\n    return 1");
        assert!(md.trim_end().ends_with("```"));
        assert_eq!(fence_lines(&md), 2);
    }

    #[test]
    fn eof_inside_docstring_keeps_prose_and_balanced_fences() {
        let md = to_markdown("x = 1\n\"\"\"\nUnclosed prose\nstill going");
        assert!(md.contains("```python\nx = 1\n```"));
        assert!(md.contains("Unclosed prose\nstill going"));
        assert_eq!(fence_lines(&md) % 2, 0);
    }

    #[test]
    fn one_line_docstring_does_not_swallow_code() {
        let md = to_markdown("def f():\n    '''Return one.'''\n    return 1\n");
        assert!(md.contains("Return one."));
        assert!(md.contains("```python\n    return 1\n```"));
    }

    #[test]
    fn text_on_opening_and_closing_lines_is_kept() {
        let md = to_markdown("\"\"\"Summary line\nmore detail.\"\"\"\n");
        assert!(md.contains("Summary line\nmore detail."));
        assert_eq!(fence_lines(&md), 0);
    }

    #[test]
    fn code_containing_backticks_gets_longer_fence() {
        let md = to_markdown("s = \"```\"\n");
        assert!(md.contains("````python\ns = \"```\"\n````"));
    }

    #[test]
    fn separate_runs_get_separate_blocks() {
        let md = to_markdown("a = 1\n\"\"\"Between.\"\"\"\nb = 2\n");
        assert_eq!(fence_lines(&md), 4);
    }
}
