//! Tool collaborator trait and shared error type.
//!
//! The [`DocTools`] trait covers the three external programs the pipeline
//! drives: literate conversion, typesetting, and declaration anchoring.
//!
//! The production implementation is
//! [`CommandTools`](super::command::CommandTools), which spawns subprocesses.
//! Tests use the recording `MockTools` below.

use super::params::TypesetParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{tool} could not be started: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },
    #[error("{tool} timed out after {secs}s")]
    TimedOut { tool: String, secs: u64 },
}

/// External programs used by the pipeline.
///
/// Implementations must be `Sync`: files are processed on a rayon pool and
/// every worker shares one collaborator.
pub trait DocTools: Sync {
    /// Convert an annotated compiled-language source to markdown.
    ///
    /// Returns the raw stdout, which may be empty.
    fn literate(&self, source: &Path) -> Result<String, ToolError>;

    /// Render `markup` to the HTML file named in `params.output`.
    fn typeset(&self, markup: &str, params: &TypesetParams) -> Result<(), ToolError>;

    /// Insert declaration anchors into rendered HTML.
    fn annotate(&self, html: &str, tags_path: &str) -> Result<String, ToolError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;

    /// Mock collaborator that records calls and writes canned HTML.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct MockTools {
        /// Returned by `literate`; `None` makes it fail.
        pub literate_output: Option<String>,
        /// Output paths containing any of these fail to typeset.
        pub fail_typeset: Vec<String>,
        pub fail_annotate: bool,
        /// Replaces the generated document when set.
        pub typeset_html: Option<String>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Literate(String),
        Typeset {
            output: String,
            markup: String,
            variables: Vec<(String, String)>,
        },
        Annotate {
            tags: String,
        },
    }

    impl MockTools {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_literate(output: &str) -> Self {
            Self {
                literate_output: Some(output.to_string()),
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn typeset_outputs(&self) -> Vec<String> {
            self.get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::Typeset { output, .. } => Some(output),
                    _ => None,
                })
                .collect()
        }
    }

    /// A minimal standalone document carrying the page's metadata.
    pub fn canned_document(markup: &str, params: &TypesetParams) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<title>{}</title>\n\
             <meta name=\"description\" content=\"{}\">\n</head>\n<body>\n{}\n</body>\n</html>\n",
            params.var("pagetitle").unwrap_or_default(),
            params.var("description").unwrap_or_default(),
            markup
        )
    }

    impl DocTools for MockTools {
        fn literate(&self, source: &Path) -> Result<String, ToolError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Literate(source.to_string_lossy().to_string()));

            self.literate_output
                .clone()
                .ok_or_else(|| ToolError::Failed {
                    tool: "literate-c".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "mock failure".to_string(),
                })
        }

        fn typeset(&self, markup: &str, params: &TypesetParams) -> Result<(), ToolError> {
            let output = params.output.to_string_lossy().to_string();
            self.operations.lock().unwrap().push(RecordedOp::Typeset {
                output: output.clone(),
                markup: markup.to_string(),
                variables: params.variables.clone(),
            });

            if self.fail_typeset.iter().any(|f| output.contains(f.as_str())) {
                return Err(ToolError::Failed {
                    tool: "pandoc".to_string(),
                    status: "exit status: 64".to_string(),
                    stderr: "mock failure".to_string(),
                });
            }

            let html = self
                .typeset_html
                .clone()
                .unwrap_or_else(|| canned_document(markup, params));
            fs::write(&params.output, html)?;
            Ok(())
        }

        fn annotate(&self, html: &str, tags_path: &str) -> Result<String, ToolError> {
            self.operations.lock().unwrap().push(RecordedOp::Annotate {
                tags: tags_path.to_string(),
            });

            if self.fail_annotate {
                return Err(ToolError::Failed {
                    tool: "awk".to_string(),
                    status: "exit status: 2".to_string(),
                    stderr: "mock failure".to_string(),
                });
            }
            Ok(html.to_string())
        }
    }

    #[test]
    fn mock_records_literate() {
        let tools = MockTools::with_literate("~~~c\nint x;\n~~~");
        let out = tools.literate(Path::new("/repo/a.c")).unwrap();
        assert!(out.contains("int x;"));
        assert_eq!(
            tools.get_operations(),
            vec![RecordedOp::Literate("/repo/a.c".to_string())]
        );
    }

    #[test]
    fn mock_writes_typeset_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join("a.html");
        let tools = MockTools::new();
        let params = TypesetParams::new(super::super::PAGE_FORMAT, "t".into(), out.clone())
            .with_var("pagetitle", "a.py");

        tools.typeset("hello", &params).unwrap();

        let html = fs::read_to_string(&out).unwrap();
        assert!(html.contains("<title>a.py</title>"));
        assert_eq!(tools.typeset_outputs().len(), 1);
    }

    #[test]
    fn mock_annotate_failure() {
        let tools = MockTools {
            fail_annotate: true,
            ..MockTools::default()
        };
        assert!(matches!(
            tools.annotate("<p></p>", "a.c.tags"),
            Err(ToolError::Failed { .. })
        ));
    }
}
