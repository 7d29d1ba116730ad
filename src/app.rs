//! Application lifecycle.
//!
//! `App` owns the resolved [`RunConfig`] and wires the toolchain, plugin
//! discovery, scheduler and reporter together for one run.

use crate::core::{
    discover_plugins, CommandRunner, ConfigError, ProcessRunner, Reporter, RunConfig, RunSummary,
    Scheduler, TerminalReporter, Toolchain,
};

/// Main application state.
#[derive(Debug, Clone)]
pub struct App {
    /// Options for this run
    pub config: RunConfig,
}

impl App {
    /// Create an app for a resolved configuration.
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Plugins to test: `explicit` when given, otherwise the dependencies
    /// declared by the project manifest.
    pub fn plugins(&self, explicit: Vec<String>) -> Result<Vec<String>, ConfigError> {
        if !explicit.is_empty() {
            return Ok(explicit);
        }
        let manifest = self.config.project_dir.join(&self.config.manifest_name);
        let plugins = discover_plugins(&manifest)?;
        tracing::debug!(count = plugins.len(), manifest = %manifest.display(), "discovered plugins");
        Ok(plugins)
    }

    /// Run every plugin with real processes, reporting to the terminal.
    ///
    /// Fails only when the toolchain cannot be resolved, before any plugin
    /// is touched.
    pub async fn run(&self, plugins: &[String]) -> Result<RunSummary, ConfigError> {
        let reporter = TerminalReporter::stdout(self.config.log_level);
        self.run_with(plugins, &ProcessRunner::new(), &reporter).await
    }

    /// Run every plugin with the given runner and reporter.
    ///
    /// A dry run spawns nothing, so it does not need the toolchain on `PATH`.
    pub async fn run_with(
        &self,
        plugins: &[String],
        runner: &dyn CommandRunner,
        reporter: &dyn Reporter,
    ) -> Result<RunSummary, ConfigError> {
        let toolchain = if self.config.dry_run {
            Toolchain::new(&self.config.runtime, &self.config.package_manager)
        } else {
            Toolchain::resolve(&self.config)?
        };
        let scheduler = Scheduler::new(&self.config, &toolchain, runner, reporter);
        Ok(scheduler.run_all(plugins, &self.config.skip).await)
    }

    /// Process exit code for a finished run.
    pub fn exit_code(&self, summary: &RunSummary) -> i32 {
        if self.config.fail_on_error && !summary.all_passed() {
            1
        } else {
            0
        }
    }
}
