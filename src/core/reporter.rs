//! Status reporting.
//!
//! Jobs describe their progress as [`StatusEvent`]s; a [`Reporter`] decides
//! how to surface them. Lines from concurrently running jobs are always
//! prefixed with the plugin name so they stay distinguishable.

use std::fmt;
use std::io::{self, IsTerminal, Write};

use crossterm::style::{Color, Stylize};
use parking_lot::Mutex;

use super::config::LogLevel;
use super::executor::{OutputLine, OutputStream};
use super::scheduler::RunSummary;

/// Stage a status event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Started,
    Installing,
    Testing,
    Warning,
    Success,
    Failure,
    Info,
}

impl Phase {
    /// Severity used for filtering.
    pub fn level(self) -> LogLevel {
        match self {
            Self::Warning => LogLevel::Warn,
            Self::Failure => LogLevel::Error,
            Self::Started | Self::Installing | Self::Testing | Self::Success | Self::Info => {
                LogLevel::Info
            }
        }
    }

    /// Symbol printed in front of the line.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Started | Self::Installing | Self::Testing => "›",
            Self::Warning => "⚠",
            Self::Success => "✔",
            Self::Failure => "✖",
            Self::Info => "ℹ",
        }
    }

    fn color(self) -> Color {
        match self {
            Self::Started | Self::Installing | Self::Testing => Color::Cyan,
            Self::Warning => Color::Yellow,
            Self::Success => Color::Green,
            Self::Failure => Color::Red,
            Self::Info => Color::Blue,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Started => "started",
            Self::Installing => "installing",
            Self::Testing => "testing",
            Self::Warning => "warning",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Info => "info",
        };
        f.write_str(name)
    }
}

/// A status transition of one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    /// Plugin the event belongs to
    pub plugin: String,
    /// Phase reached
    pub phase: Phase,
    /// Human readable detail
    pub message: String,
}

impl StatusEvent {
    /// Create a new event.
    pub fn new(plugin: impl Into<String>, phase: Phase, message: impl Into<String>) -> Self {
        Self { plugin: plugin.into(), phase, message: message.into() }
    }
}

/// Sink for job progress.
pub trait Reporter: Send + Sync {
    /// A plugin changed phase.
    fn event(&self, event: &StatusEvent);

    /// A line of child output selected for passthrough.
    fn output(&self, plugin: &str, line: &OutputLine);

    /// Buffered output of a failed test run.
    fn dump(&self, plugin: &str, output: &str);

    /// The run finished.
    fn summary(&self, summary: &RunSummary);
}

/// Reporter writing symbol-prefixed lines to a terminal.
pub struct TerminalReporter<W: Write + Send = io::Stdout> {
    out: Mutex<W>,
    min_level: LogLevel,
    color: bool,
}

impl TerminalReporter<io::Stdout> {
    /// Report to standard output, colored when it is a terminal.
    pub fn stdout(min_level: LogLevel) -> Self {
        let color = io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self::with_writer(io::stdout(), min_level, color)
    }
}

impl<W: Write + Send> TerminalReporter<W> {
    /// Report to an arbitrary writer.
    pub fn with_writer(out: W, min_level: LogLevel, color: bool) -> Self {
        Self { out: Mutex::new(out), min_level, color }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn write_lines(&self, lines: &[String]) {
        let mut out = self.out.lock();
        for line in lines {
            if writeln!(out, "{line}").is_err() {
                return;
            }
        }
        let _ = out.flush();
    }
}

impl<W: Write + Send> fmt::Debug for TerminalReporter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalReporter")
            .field("min_level", &self.min_level)
            .field("color", &self.color)
            .finish()
    }
}

impl<W: Write + Send> Reporter for TerminalReporter<W> {
    fn event(&self, event: &StatusEvent) {
        if event.phase.level() < self.min_level {
            return;
        }
        let symbol = self.paint(event.phase.symbol(), event.phase.color());
        self.write_lines(&[format!("{symbol} {}: {}", event.plugin, event.message)]);
    }

    fn output(&self, plugin: &str, line: &OutputLine) {
        let color = match line.stream {
            OutputStream::Stdout => Color::Yellow,
            OutputStream::Stderr => Color::Red,
        };
        let tag = self.paint(&format!("[{plugin}]"), Color::DarkGrey);
        self.write_lines(&[format!("{tag} {}", self.paint(&line.line, color))]);
    }

    fn dump(&self, plugin: &str, output: &str) {
        let mut lines = vec![self.paint(&format!("--- {plugin} test output ---"), Color::DarkGrey)];
        lines.extend(output.lines().map(|line| self.paint(line, Color::Yellow)));
        lines.push(self.paint(&format!("--- end of {plugin} test output ---"), Color::DarkGrey));
        self.write_lines(&lines);
    }

    fn summary(&self, summary: &RunSummary) {
        let color = if summary.all_passed() { Color::Green } else { Color::Yellow };
        let mut lines = vec![self.paint(&summary.to_string(), color)];
        let failed = summary.failed_plugins();
        if !failed.is_empty() {
            lines.push(format!("Not passing: {}", failed.join(", ")));
        }
        self.write_lines(&lines);
    }
}

/// Everything a [`MemoryReporter`] has seen.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    /// Status events in arrival order
    pub events: Vec<StatusEvent>,
    /// Passthrough lines with their plugin
    pub output: Vec<(String, OutputLine)>,
    /// Failure dumps with their plugin
    pub dumps: Vec<(String, String)>,
    /// Summaries reported
    pub summaries: usize,
}

/// Reporter that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    recorded: Mutex<Recorded>,
}

impl MemoryReporter {
    /// Create an empty reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of what has been recorded so far.
    pub fn recorded(&self) -> Recorded {
        self.recorded.lock().clone()
    }

    /// Events of one plugin.
    pub fn events_for(&self, plugin: &str) -> Vec<StatusEvent> {
        self.recorded.lock().events.iter().filter(|e| e.plugin == plugin).cloned().collect()
    }
}

impl Reporter for MemoryReporter {
    fn event(&self, event: &StatusEvent) {
        self.recorded.lock().events.push(event.clone());
    }

    fn output(&self, plugin: &str, line: &OutputLine) {
        self.recorded.lock().output.push((plugin.to_string(), line.clone()));
    }

    fn dump(&self, plugin: &str, output: &str) {
        self.recorded.lock().dumps.push((plugin.to_string(), output.to_string()));
    }

    fn summary(&self, _summary: &RunSummary) {
        self.recorded.lock().summaries += 1;
    }
}
