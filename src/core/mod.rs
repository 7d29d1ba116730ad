//! Core types and functionality for plugcheck.
//!
//! This module contains the building blocks of a run: configuration,
//! plugin discovery, manifest patching, process execution, the per-plugin
//! job pipeline, scheduling and reporting.

mod config;
mod discovery;
mod error;
mod executor;
mod job;
mod manifest;
mod reporter;
mod scheduler;
mod toolchain;

pub use config::{
    Config, FrameworkConfig, LogLevel, OutputConfig, PluginsConfig, RunConfig, RunSettings,
    ToolchainConfig, DEFAULT_FRAMEWORK_REF, LOCAL_CONFIG_FILE,
};
pub use discovery::{discover_plugins, Plan, ProjectManifest, SkipList, DEFAULT_SKIP};
pub use error::{ConfigError, ManifestError, ManifestResult};
pub use executor::{
    CommandRunner, Invocation, LineSink, OutputLine, OutputStream, ProcessOutcome, ProcessRunner,
};
pub use job::{JobContext, JobOutcome, JobResult, PluginJob};
pub use manifest::{ManifestPatcher, DEV_DEPENDENCIES};
pub use reporter::{MemoryReporter, Phase, Recorded, Reporter, StatusEvent, TerminalReporter};
pub use scheduler::{RunSummary, Scheduler};
pub use toolchain::{find_in, Toolchain};
