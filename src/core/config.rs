//! Configuration management for plugcheck.
//!
//! Handles loading settings from TOML files and resolving them, together
//! with command-line overrides, into the immutable [`RunConfig`] that every
//! other component receives.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::discovery::{SkipList, DEFAULT_SKIP};
use super::error::ConfigError;

/// Name of the project-local config file.
pub const LOCAL_CONFIG_FILE: &str = ".plugcheck.toml";

/// Framework reference written into each plugin's manifest by default.
pub const DEFAULT_FRAMEWORK_REF: &str = "git+https://github.com/fastify/fastify.git";

/// File-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Framework under validation
    pub framework: FrameworkConfig,

    /// External executables and subcommands
    pub toolchain: ToolchainConfig,

    /// Plugin locations and exclusions
    pub plugins: PluginsConfig,

    /// Scheduling settings
    pub run: RunSettings,

    /// Output settings
    pub output: OutputConfig,
}

/// The framework every plugin is pinned to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// devDependency key rewritten in each plugin manifest
    pub package: String,

    /// Version, branch or repository locator written into the pin
    pub reference: String,
}

/// Runtime and package manager used for install and test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Runtime executable, looked up on PATH
    pub runtime: String,

    /// Package manager executable, looked up on PATH
    pub package_manager: String,

    /// Subcommand that installs dependencies
    pub install_command: String,

    /// Subcommand that runs the test suite
    pub test_command: String,
}

/// Where plugins live and which ones never run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Directory holding installed plugins, relative to the project dir
    pub root: String,

    /// Manifest file name inside each plugin directory
    pub manifest: String,

    /// Plugins excluded from every run
    pub skip: Vec<String>,
}

/// Scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Plugins processed at once (0 = number of CPUs)
    pub jobs: usize,

    /// Per-stage timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_timeout_secs: Option<u64>,

    /// Exit non-zero when any plugin does not pass
    pub fail_on_error: bool,

    /// Plan only, never touch plugins
    #[serde(skip)]
    pub dry_run: bool,
}

/// Output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Echo child process output
    pub verbose: bool,

    /// Also echo package manager install output
    pub install_logs: bool,

    /// Print buffered test output when a test fails
    pub log_errors: bool,

    /// Minimum severity shown
    pub log_level: LogLevel,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self { package: "fastify".to_string(), reference: DEFAULT_FRAMEWORK_REF.to_string() }
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            runtime: "node".to_string(),
            package_manager: "npm".to_string(),
            install_command: "install".to_string(),
            test_command: "test".to_string(),
        }
    }
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            root: "node_modules".to_string(),
            manifest: "package.json".to_string(),
            skip: DEFAULT_SKIP.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self { jobs: 1, stage_timeout_secs: None, fail_on_error: false, dry_run: false }
    }
}

/// Minimum severity for reporter lines and diagnostics.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Config {
    /// Load configuration for a project.
    ///
    /// Looks for config in:
    /// 1. `.plugcheck.toml` in the project directory
    /// 2. `~/.config/plugcheck/config.toml`
    /// 3. Falls back to defaults
    pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
        let local_config = project_dir.join(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(global_config) = Self::global_path() {
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::ConfigUnreadable { path: path.to_path_buf(), source })?;
        toml::from_str(&content)
            .map_err(|source| ConfigError::ConfigInvalid { path: path.to_path_buf(), source })
    }

    /// Location of the global config file.
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("plugcheck").join("config.toml"))
    }
}

/// Resolved, immutable options for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Host project containing the plugin list
    pub project_dir: PathBuf,
    /// Directory holding one sub-directory per plugin
    pub plugins_root: PathBuf,
    /// Manifest file name inside each plugin directory
    pub manifest_name: String,
    /// devDependency key pinning the framework
    pub framework: String,
    /// Value written into the pin
    pub framework_ref: String,
    /// Runtime executable name
    pub runtime: String,
    /// Package manager executable name
    pub package_manager: String,
    /// Install subcommand
    pub install_command: String,
    /// Test subcommand
    pub test_command: String,
    /// Plugins never run
    pub skip: SkipList,
    /// Requested concurrency (0 = CPUs)
    pub jobs: usize,
    /// Per-stage timeout
    pub stage_timeout: Option<Duration>,
    /// Exit non-zero when any plugin does not pass
    pub fail_on_error: bool,
    /// Plan only
    pub dry_run: bool,
    /// Echo child process output
    pub verbose: bool,
    /// Also echo install output
    pub install_logs: bool,
    /// Print buffered test output on failure
    pub log_errors: bool,
    /// Minimum severity shown
    pub log_level: LogLevel,
}

impl RunConfig {
    /// Resolve file configuration against a project directory.
    pub fn resolve(config: Config, project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        let root = PathBuf::from(shellexpand::tilde(&config.plugins.root).into_owned());
        let plugins_root = if root.is_absolute() { root } else { project_dir.join(root) };

        Self {
            project_dir,
            plugins_root,
            manifest_name: config.plugins.manifest,
            framework: config.framework.package,
            framework_ref: config.framework.reference,
            runtime: config.toolchain.runtime,
            package_manager: config.toolchain.package_manager,
            install_command: config.toolchain.install_command,
            test_command: config.toolchain.test_command,
            skip: SkipList::new(config.plugins.skip),
            jobs: config.run.jobs,
            stage_timeout: config.run.stage_timeout_secs.map(Duration::from_secs),
            fail_on_error: config.run.fail_on_error,
            dry_run: config.run.dry_run,
            verbose: config.output.verbose,
            install_logs: config.output.install_logs,
            log_errors: config.output.log_errors,
            log_level: config.output.log_level,
        }
    }

    /// On-disk directory of a plugin.
    pub fn plugin_dir(&self, plugin: &str) -> PathBuf {
        self.plugins_root.join(plugin)
    }

    /// Number of plugins processed at once.
    pub fn concurrency(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get().max(1)
        } else {
            self.jobs
        }
    }

    /// Whether install output is echoed.
    pub fn echo_install(&self) -> bool {
        self.verbose && self.install_logs
    }

    /// Whether test stdout is echoed.
    pub fn echo_test_stdout(&self) -> bool {
        self.verbose
    }

    /// Whether test stderr is echoed.
    pub fn echo_test_stderr(&self) -> bool {
        self.verbose && self.install_logs
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::resolve(Config::default(), ".")
    }
}
