//! plugcheck - batch-test framework plugins against a framework build.
//!
//! Pins every installed plugin to the requested framework reference, runs
//! its install and test scripts and reports which plugins still pass.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use plugcheck::{App, Config, LogLevel, RunConfig};

/// Batch-test framework plugins against a framework build
#[derive(Parser, Debug)]
#[command(name = "plugcheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Plugins to test (defaults to the project's dependencies)
    #[arg(value_name = "PLUGINS")]
    plugins: Vec<String>,

    /// Framework reference written into each plugin's manifest
    #[arg(short = 'F', long, value_name = "REF", env = "PLUGCHECK_FRAMEWORK_REF")]
    framework_ref: Option<String>,

    /// devDependency key to rewrite
    #[arg(long, value_name = "PKG", env = "PLUGCHECK_FRAMEWORK")]
    framework: Option<String>,

    /// Echo child process output
    #[arg(short, long)]
    verbose: bool,

    /// Also echo install output and test stderr
    #[arg(short = 'N', long, visible_alias = "npm-logs")]
    install_logs: bool,

    /// Print buffered test output when a test fails
    #[arg(short = 'L', long)]
    log_errors: bool,

    /// Minimum severity shown
    #[arg(long, value_enum, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Host project containing package.json and node_modules
    #[arg(short = 'C', long, value_name = "DIR", default_value = ".")]
    project_dir: PathBuf,

    /// Config file (defaults to .plugcheck.toml, then the global config)
    #[arg(short, long, value_name = "FILE", env = "PLUGCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Plugins processed at once (0 = number of CPUs)
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Per-stage timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Additional plugin to skip (repeatable)
    #[arg(long, value_name = "NAME")]
    skip: Vec<String>,

    /// Exit with status 1 when any plugin does not pass
    #[arg(long)]
    fail_on_error: bool,

    /// Show what would run without touching any plugin
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    /// Layer command-line overrides on top of file configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(reference) = &self.framework_ref {
            config.framework.reference.clone_from(reference);
        }
        if let Some(package) = &self.framework {
            config.framework.package.clone_from(package);
        }
        config.plugins.skip.extend(self.skip.iter().cloned());

        if let Some(jobs) = self.jobs {
            config.run.jobs = jobs;
        }
        if self.timeout.is_some() {
            config.run.stage_timeout_secs = self.timeout;
        }
        config.run.fail_on_error |= self.fail_on_error;
        config.run.dry_run = self.dry_run;

        config.output.verbose |= self.verbose;
        config.output.install_logs |= self.install_logs;
        config.output.log_errors |= self.log_errors;
        if let Some(level) = self.log_level {
            config.output.log_level = level;
        }
    }

    fn load_config(&self) -> Result<Config> {
        let config = match &self.config {
            Some(path) => Config::load_from_file(path)?,
            None => Config::load(&self.project_dir)?,
        };
        Ok(config)
    }
}

fn init_logging(level: LogLevel) {
    // Diagnostics stay quiet unless asked for; status lines go through the reporter.
    let default = if level <= LogLevel::Debug { level.as_str() } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = cli.load_config()?;
    cli.apply(&mut config);
    init_logging(config.output.log_level);

    let app = App::new(RunConfig::resolve(config, cli.project_dir.clone()));
    let plugins = app.plugins(cli.plugins.clone())?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let summary = runtime.block_on(app.run(&plugins))?;
    drop(runtime);

    let code = app.exit_code(&summary);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
