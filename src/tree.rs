//! README directory trees to linked site maps.
//!
//! The first fenced block without an info string is read as a directory
//! listing, either drawn with box characters or indented with spaces:
//!
//! ```text
//! ├── src-local/          Shared headers
//! │   └── params.h        Parameters
//! └── run.sh              - Driver script
//! ```
//!
//! Each entry becomes a markdown list item linking to its generated page.
//! Directories link to their index, files to `<parent>/<name>.html`.
//! Malformed indentation never fails; it only flattens the result.

const BOX_CHARS: [char; 4] = ['│', '├', '└', '─'];
const TAB_WIDTH: usize = 4;
const GROUP_WIDTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTreeNode {
    /// Entry as written, directories keep their trailing `/`.
    pub name: String,
    pub is_directory: bool,
    pub description: String,
    pub depth: usize,
    /// Link target, `None` for entries that have no page here.
    pub link: Option<String>,
}

/// Replace the first plain fenced block of `readme` with a rendered tree.
///
/// Content without such a block is returned unchanged.
pub fn convert_directory_tree(readme: &str) -> String {
    let Some(block) = find_tree_block(readme) else {
        return readme.to_string();
    };
    let nodes = parse_tree(&readme[block.body.clone()]);
    if nodes.is_empty() {
        return readme.to_string();
    }
    format!(
        "{}{}{}",
        &readme[..block.start],
        render_tree(&nodes),
        &readme[block.end..]
    )
}

struct FencedBlock {
    start: usize,
    end: usize,
    body: std::ops::Range<usize>,
}

/// First fence with an empty info string holding at least two lines.
fn find_tree_block(content: &str) -> Option<FencedBlock> {
    let mut offset = 0;
    // (start offset, body start, untagged)
    let mut open: Option<(usize, usize, bool)> = None;

    for line in content.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim();
        if !trimmed.starts_with("```") {
            continue;
        }

        match open {
            None => {
                let untagged = trimmed.trim_start_matches('`').trim().is_empty();
                open = Some((line_start, offset, untagged));
            }
            Some((start, body_start, untagged)) if trimmed.trim_end_matches('`').is_empty() => {
                open = None;
                if !untagged {
                    continue;
                }
                let body_end = line_start.saturating_sub(1).max(body_start);
                let body = body_start..body_end;
                if content[body.clone()].lines().count() >= 2 {
                    let end = line_start + line.trim_end_matches(['\n', '\r']).len();
                    return Some(FencedBlock { start, end, body });
                }
            }
            Some(_) => {}
        }
    }
    None
}

/// Parse a listing into nodes with resolved links.
pub fn parse_tree(text: &str) -> Vec<DirectoryTreeNode> {
    let space_unit = text
        .lines()
        .filter(|l| !l.contains(BOX_CHARS))
        .map(leading_width)
        .filter(|w| *w > 0)
        .min()
        .unwrap_or(GROUP_WIDTH);

    let mut nodes = Vec::new();
    let mut stack: Vec<String> = Vec::new();

    for line in text.lines() {
        let (depth, rest) = split_prefix(line, space_unit);
        let rest = rest.trim();
        if rest.is_empty() || rest == "." || rest == "./" {
            continue;
        }

        let (name, description) = match rest.split_once(char::is_whitespace) {
            Some((name, desc)) => (name, clean_description(desc)),
            None => (rest, String::new()),
        };

        // Deeper than the known parents: attach to the deepest one.
        stack.truncate(depth);
        let is_directory = name.ends_with('/');
        let bare = name.trim_end_matches('/');

        let link = if is_directory {
            let mut path = stack.clone();
            path.push(bare.to_string());
            let target = path.join("/");
            stack.push(bare.to_string());
            // Multi-segment names point outside the repository's own tree.
            (!bare.contains('/')).then_some(target)
        } else {
            let mut path = stack.clone();
            path.push(bare.to_string());
            Some(format!("{}.html", path.join("/")))
        };

        nodes.push(DirectoryTreeNode {
            name: name.to_string(),
            is_directory,
            description,
            depth,
            link,
        });
    }
    nodes
}

/// Render nodes as an indented markdown list inside a styling div.
pub fn render_tree(nodes: &[DirectoryTreeNode]) -> String {
    let mut lines = vec!["<div class=\"repository-structure\">".to_string()];
    for node in nodes {
        let mut item = format!("{}* ", "  ".repeat(node.depth));
        match &node.link {
            Some(target) => item.push_str(&format!("**[{}]({})**", node.name, target)),
            None => item.push_str(&format!("**{}**", node.name)),
        }
        if !node.description.is_empty() {
            item.push_str(" - ");
            item.push_str(&node.description);
        }
        lines.push(item);
    }
    lines.push("</div>".to_string());
    lines.join("\n")
}

fn leading_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

/// Depth and the text after the indentation.
fn split_prefix(line: &str, space_unit: usize) -> (usize, &str) {
    let prefix_len = line
        .char_indices()
        .find(|(_, c)| !(c.is_whitespace() || BOX_CHARS.contains(c)))
        .map_or(line.len(), |(i, _)| i);
    let (prefix, rest) = line.split_at(prefix_len);

    if prefix.contains(BOX_CHARS) {
        let width: usize = prefix
            .chars()
            .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
            .sum();
        let has_connector = prefix.contains(['├', '└']);
        let groups = width / GROUP_WIDTH;
        let depth = if has_connector {
            groups.saturating_sub(1)
        } else {
            groups
        };
        (depth, rest)
    } else {
        (leading_width(line) / space_unit.max(1), rest)
    }
}

fn clean_description(desc: &str) -> String {
    let desc = desc.trim();
    desc.strip_prefix("- ")
        .or_else(|| desc.strip_prefix("# "))
        .unwrap_or(desc)
        .trim()
        .to_string()
}
