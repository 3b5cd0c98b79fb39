//! Parameter types for the typesetting engine.
//!
//! [`TypesetParams`] describes *what* to render (input format, template,
//! output path, named variables), not *how*. The [`backend`](super::backend)
//! decides how to run it, so tests can swap in a recording mock.

use std::path::PathBuf;

/// Input format for source pages.
pub const PAGE_FORMAT: &str = "markdown+smart+raw_html+tex_math_dollars";

/// Input format for the root index.
pub const INDEX_FORMAT: &str = "markdown+tex_math_dollars+raw_html";

/// Everything one typesetting run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct TypesetParams {
    pub input_format: &'static str,
    pub template: PathBuf,
    pub output: PathBuf,
    /// Named template variables, passed in order as `-V name=value`.
    pub variables: Vec<(String, String)>,
}

impl TypesetParams {
    pub fn new(input_format: &'static str, template: PathBuf, output: PathBuf) -> Self {
        Self {
            input_format,
            template,
            output,
            variables: Vec::new(),
        }
    }

    pub fn with_var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.variables.push((name.to_string(), value.into()));
        self
    }

    /// Last value set for `name`.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Command-line arguments for the engine.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            self.input_format.to_string(),
            "-t".to_string(),
            "html5".to_string(),
            "--standalone".to_string(),
            "--mathjax".to_string(),
            "--template".to_string(),
            self.template.to_string_lossy().into_owned(),
        ];
        for (name, value) in &self.variables {
            args.push("-V".to_string());
            args.push(format!("{name}={value}"));
        }
        args.push("-o".to_string());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}
