//! Process execution module.
//!
//! Spawns external programs, streams their output line by line and buffers
//! it, and resolves with the exit status. A non-zero exit is an outcome, not
//! an error; only a failure to spawn is reported as `Err`.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as ProcessCommand;

/// One external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Absolute path of the program
    pub program: PathBuf,
    /// Arguments
    pub args: Vec<OsString>,
    /// Working directory
    pub cwd: PathBuf,
    /// Kill the process if it runs longer than this
    pub timeout: Option<Duration>,
}

impl Invocation {
    /// Create an invocation without a timeout.
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>, cwd: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args, cwd: cwd.into(), timeout: None }
    }

    /// Set the timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Last argument, which names the subcommand for package manager calls.
    pub fn subcommand(&self) -> Option<&str> {
        self.args.last().and_then(|arg| arg.to_str())
    }
}

/// Which stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// A single line of child output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    /// Source stream
    pub stream: OutputStream,
    /// Line content without the trailing newline
    pub line: String,
}

/// Result of running a process to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code; `None` when killed by a signal or timed out
    pub exit_code: Option<i32>,
    /// Buffered standard output
    pub stdout: String,
    /// Buffered standard error
    pub stderr: String,
    /// Time taken
    pub duration: Duration,
    /// Whether the process was killed for exceeding its timeout
    pub timed_out: bool,
}

impl ProcessOutcome {
    /// Check if the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Get combined output (stdout + stderr).
    pub fn combined(&self) -> String {
        let mut combined = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&self.stderr);
        }
        combined
    }
}

/// Callback receiving each output line as it arrives.
pub type LineSink<'a> = &'a (dyn Fn(&OutputLine) + Send + Sync);

/// Runs external processes.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `invocation` to completion, passing every output line to `on_line`.
    async fn run(&self, invocation: &Invocation, on_line: LineSink<'_>) -> io::Result<ProcessOutcome>;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation, on_line: LineSink<'_>) -> io::Result<ProcessOutcome> {
        let start = Instant::now();

        let mut cmd = ProcessCommand::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            program = %invocation.program.display(),
            cwd = %invocation.cwd.display(),
            args = ?invocation.args,
            "spawning process"
        );
        let mut child = cmd.spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Filled while the process runs so a timeout still keeps partial output.
        let mut stdout_buf = String::new();
        let mut stderr_buf = String::new();

        let drive = async {
            tokio::join!(
                collect(stdout, OutputStream::Stdout, on_line, &mut stdout_buf),
                collect(stderr, OutputStream::Stderr, on_line, &mut stderr_buf),
            );
            child.wait().await
        };

        let finished = match invocation.timeout {
            Some(limit) => tokio::time::timeout(limit, drive).await.ok(),
            None => Some(drive.await),
        };

        let outcome = match finished {
            Some(status) => ProcessOutcome {
                exit_code: status?.code(),
                stdout: stdout_buf,
                stderr: stderr_buf,
                duration: start.elapsed(),
                timed_out: false,
            },
            None => {
                tracing::warn!(
                    program = %invocation.program.display(),
                    cwd = %invocation.cwd.display(),
                    "process timed out, killing it"
                );
                if let Err(err) = child.start_kill() {
                    tracing::debug!(error = %err, "kill after timeout failed");
                }
                if let Err(err) = child.wait().await {
                    tracing::debug!(error = %err, "reaping timed out process failed");
                }
                ProcessOutcome {
                    exit_code: None,
                    stdout: stdout_buf,
                    stderr: stderr_buf,
                    duration: start.elapsed(),
                    timed_out: true,
                }
            }
        };

        tracing::debug!(
            program = %invocation.program.display(),
            exit_code = ?outcome.exit_code,
            duration_ms = outcome.duration.as_millis() as u64,
            "process finished"
        );
        Ok(outcome)
    }
}

/// Forward every line of `reader` to `on_line` and append it to `buffer`.
///
/// Lines are decoded lossily so undecodable bytes never stop the pipe from
/// being drained.
async fn collect<R>(
    reader: Option<R>,
    stream: OutputStream,
    on_line: LineSink<'_>,
    buffer: &mut String,
) where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };

    let mut reader = BufReader::new(reader);
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {
                if raw.last() == Some(&b'\n') {
                    raw.pop();
                    if raw.last() == Some(&b'\r') {
                        raw.pop();
                    }
                }
                let output =
                    OutputLine { stream, line: String::from_utf8_lossy(&raw).into_owned() };
                on_line(&output);
                buffer.push_str(&output.line);
                buffer.push('\n');
            }
            Err(err) => {
                tracing::debug!(error = %err, ?stream, "reading process output failed");
                break;
            }
        }
    }
}
