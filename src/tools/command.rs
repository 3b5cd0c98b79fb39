//! Subprocess implementation of [`DocTools`].
//!
//! Each call spawns the tool, feeds stdin from a helper thread, drains stdout
//! and stderr on their own threads, and waits with an optional deadline. A
//! child still running at the deadline is killed and reported as
//! [`ToolError::TimedOut`].

use super::backend::{DocTools, ToolError};
use super::params::TypesetParams;
use crate::config::Project;
use std::ffi::OsStr;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs the real binaries.
#[derive(Debug, Clone)]
pub struct CommandTools {
    pandoc: String,
    awk: String,
    literate_c: PathBuf,
    decl_anchors: PathBuf,
    timeout: Option<Duration>,
}

impl CommandTools {
    pub fn from_project(project: &Project) -> Self {
        let tools = &project.config.tools;
        Self {
            pandoc: tools.pandoc.clone(),
            awk: tools.awk.clone(),
            literate_c: project.literate_c_path(),
            decl_anchors: project.decl_anchors_path(),
            timeout: tools.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Required binaries that cannot be found on `PATH`.
    pub fn missing_binaries(&self) -> Vec<String> {
        [&self.pandoc, &self.awk]
            .into_iter()
            .filter(|bin| which::which(bin.as_str()).is_err())
            .cloned()
            .collect()
    }
}

impl DocTools for CommandTools {
    fn literate(&self, source: &Path) -> Result<String, ToolError> {
        let mut cmd = Command::new(&self.literate_c);
        cmd.arg(source).arg("0");
        run(cmd, None, self.timeout)
    }

    fn typeset(&self, markup: &str, params: &TypesetParams) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.pandoc);
        cmd.args(params.args());
        run(cmd, Some(markup), self.timeout).map(|_| ())
    }

    fn annotate(&self, html: &str, tags_path: &str) -> Result<String, ToolError> {
        let mut cmd = Command::new(&self.awk);
        cmd.arg("-v")
            .arg(format!("tags={tags_path}"))
            .arg("-f")
            .arg(&self.decl_anchors);
        run(cmd, Some(html), self.timeout)
    }
}

/// Run a command to completion and return its stdout.
fn run(
    mut cmd: Command,
    input: Option<&str>,
    timeout: Option<Duration>,
) -> Result<String, ToolError> {
    let tool = program_name(cmd.get_program());
    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    tracing::debug!(tool = %tool, args = ?cmd.get_args().collect::<Vec<_>>(), "Spawning");
    let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
        tool: tool.clone(),
        source,
    })?;

    let writer = match (input, child.stdin.take()) {
        (Some(text), Some(mut stdin)) => {
            let text = text.to_owned();
            Some(thread::spawn(move || stdin.write_all(text.as_bytes())))
        }
        _ => None,
    };
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let status = match wait_with_timeout(&mut child, timeout)? {
        Some(status) => status,
        None => {
            // Reader threads see EOF once the child is gone
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::TimedOut {
                tool,
                secs: timeout.map(|t| t.as_secs()).unwrap_or_default(),
            });
        }
    };

    if let Some(handle) = writer {
        match join(handle) {
            // The tool may legitimately stop reading early
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
            other => other?,
        }
    }
    let stdout = stdout.map(join).transpose()?.unwrap_or_default();
    let stderr = stderr.map(join).transpose()?.unwrap_or_default();

    if !status.success() {
        return Err(ToolError::Failed {
            tool,
            status: status.to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).map(|_| buf)
    })
}

fn join<T>(handle: thread::JoinHandle<io::Result<T>>) -> io::Result<T> {
    handle
        .join()
        .map_err(|_| io::Error::other("pipe thread panicked"))?
}

/// `Ok(None)` when the deadline passes before the child exits.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
) -> io::Result<Option<ExitStatus>> {
    let Some(limit) = timeout else {
        return child.wait().map(Some);
    };
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= limit {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn program_name(program: &OsStr) -> String {
    Path::new(program)
        .file_name()
        .unwrap_or(program)
        .to_string_lossy()
        .into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn run_pipes_stdin_to_stdout() {
        let out = run(Command::new("cat"), Some("hello\nworld"), None).unwrap();
        assert_eq!(out, "hello\nworld");
    }

    #[test]
    fn run_reports_nonzero_exit_with_stderr() {
        let err = run(sh("echo oops >&2; exit 3"), None, None).unwrap_err();
        match err {
            ToolError::Failed { tool, stderr, .. } => {
                assert_eq!(tool, "sh");
                assert_eq!(stderr, "oops");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn run_kills_on_timeout() {
        let start = Instant::now();
        let err = run(sh("sleep 5"), None, Some(Duration::from_millis(100))).unwrap_err();
        assert!(matches!(err, ToolError::TimedOut { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn run_missing_binary_is_spawn_error() {
        let err = run(Command::new("definitely-not-a-real-tool-xyz"), None, None).unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[test]
    fn missing_binaries_lists_only_absent_tools() {
        let tools = CommandTools {
            pandoc: "definitely-not-a-real-tool-xyz".into(),
            awk: "sh".into(),
            literate_c: PathBuf::from("literate-c"),
            decl_anchors: PathBuf::from("decl_anchors.awk"),
            timeout: None,
        };
        assert_eq!(tools.missing_binaries(), vec!["definitely-not-a-real-tool-xyz"]);
    }
}
