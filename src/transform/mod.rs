//! Source files to intermediate markup.
//!
//! One conversion per [`SourceKind`]:
//!
//! | Kind | Markup |
//! |---|---|
//! | Markdown | raw content |
//! | Script (`.py`) | docstrings as prose, code runs fenced ([`python`]) |
//! | Shell / build file | one escaped `bash` block |
//! | Notebook | preview widget + embedded metadata ([`notebook`]) |
//! | Compiled (`.c`, `.h`) | literate conversion, plain `c` block on failure |
//!
//! The output is never empty. Only reading the source can fail; a failing
//! literate converter is absorbed by the fallback.

pub mod notebook;
pub mod python;

use crate::config::Project;
use crate::tools::DocTools;
use crate::types::{SourceFile, SourceKind};
use std::fs;

pub fn transform(
    source: &SourceFile,
    tools: &dyn DocTools,
    project: &Project,
) -> Result<String, std::io::Error> {
    let markup = match source.kind {
        SourceKind::Markdown => fs::read_to_string(&source.path)?,
        SourceKind::Script => python::to_markdown(&fs::read_to_string(&source.path)?),
        SourceKind::Shell | SourceKind::BuildFile => {
            shell_block(&source.file_name(), &fs::read_to_string(&source.path)?)
        }
        SourceKind::Notebook => notebook::to_markdown(source, project),
        SourceKind::Compiled => compiled(source, tools)?,
    };

    if markup.trim().is_empty() {
        return Ok(format!("# {}\n", source.file_name()));
    }
    Ok(markup)
}

/// Wrap shell content in one fenced block, escaping what the typesetting
/// engine would otherwise read as template syntax.
pub fn shell_block(file_name: &str, content: &str) -> String {
    let escaped = content
        .replace('$', "\\$")
        .replace("=true", "=\\true")
        .replace("=false", "=\\false");
    let fence = python::fence_for(&escaped.lines().collect::<Vec<_>>());
    format!("# {file_name}\n\n{fence}bash\n{escaped}\n{fence}")
}

fn compiled(source: &SourceFile, tools: &dyn DocTools) -> Result<String, std::io::Error> {
    match tools.literate(&source.path) {
        Ok(out) if !out.trim().is_empty() => Ok(out.replace("~~~literatec", "~~~c")),
        Ok(_) => {
            tracing::debug!(path = %source.path.display(), "Literate conversion produced no output");
            plain_c_block(source)
        }
        Err(e) => {
            tracing::debug!(path = %source.path.display(), error = %e, "Literate conversion failed, using plain block");
            plain_c_block(source)
        }
    }
}

fn plain_c_block(source: &SourceFile) -> Result<String, std::io::Error> {
    let content = fs::read_to_string(&source.path)?;
    let fence = python::fence_for(&content.lines().collect::<Vec<_>>());
    Ok(format!(
        "# {}\n\n{fence}c\n{content}\n{fence}",
        source.file_name()
    ))
}
