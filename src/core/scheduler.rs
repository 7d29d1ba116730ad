//! Job scheduling.
//!
//! Runs one [`PluginJob`] per plugin that is not skip-listed, at most
//! `concurrency` at a time, and aggregates the results. Plugin failures never
//! stop the run; every job reaches a terminal state before the summary is
//! reported.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};

use super::config::RunConfig;
use super::discovery::{Plan, SkipList};
use super::executor::CommandRunner;
use super::job::{JobContext, JobOutcome, JobResult, PluginJob};
use super::manifest::ManifestPatcher;
use super::reporter::{Phase, Reporter, StatusEvent};
use super::toolchain::Toolchain;

/// Aggregate of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// One result per job, in plugin order
    pub results: Vec<JobResult>,
    /// Skip-listed plugins
    pub skipped: Vec<String>,
    /// Plugins that would have run in a dry run
    pub planned: Vec<String>,
    /// Total duration of the run
    pub duration: Duration,
    /// Nothing was executed
    pub dry_run: bool,
}

impl RunSummary {
    /// Number of results with the given outcome.
    pub fn count(&self, outcome: JobOutcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Number of plugins that passed.
    pub fn passed(&self) -> usize {
        self.count(JobOutcome::Passed)
    }

    /// Number of plugins that did not pass.
    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    /// Check if every job passed.
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_success())
    }

    /// Names of plugins that did not pass.
    pub fn failed_plugins(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.outcome.is_success())
            .map(|r| r.plugin.as_str())
            .collect()
    }

    /// Look up the result of one plugin.
    pub fn result(&self, plugin: &str) -> Option<&JobResult> {
        self.results.iter().find(|r| r.plugin == plugin)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            return write!(
                f,
                "Dry run: {} plugins would be tested, {} skipped",
                self.planned.len(),
                self.skipped.len()
            );
        }
        write!(
            f,
            "Finished in {:.1}s: {} passed, {} test failed, {} install failed, \
             {} manifest update failed, {} skipped",
            self.duration.as_secs_f64(),
            self.passed(),
            self.count(JobOutcome::TestFailed),
            self.count(JobOutcome::InstallFailed),
            self.count(JobOutcome::ManifestUpdateFailed),
            self.skipped.len()
        )
    }
}

/// Runs plugin jobs to completion.
pub struct Scheduler<'a> {
    ctx: JobContext<'a>,
}

impl<'a> Scheduler<'a> {
    /// Create a scheduler over shared collaborators.
    pub fn new(
        config: &'a RunConfig,
        toolchain: &'a Toolchain,
        runner: &'a dyn CommandRunner,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self { ctx: JobContext { config, toolchain, runner, reporter } }
    }

    /// Run every plugin not in `skip` and report the summary once.
    pub async fn run_all(&self, plugins: &[String], skip: &SkipList) -> RunSummary {
        let start = Instant::now();
        let config = self.ctx.config;
        let plan = Plan::new(plugins, skip);

        for name in &plan.skipped {
            self.ctx.reporter.event(&StatusEvent::new(name, Phase::Info, "skipped"));
        }

        let summary = if config.dry_run {
            self.dry_run(plan)
        } else {
            let concurrency = config.concurrency();
            tracing::debug!(jobs = plan.run.len(), concurrency, "scheduling plugin jobs");

            let ctx = &self.ctx;
            let mut results: Vec<JobResult> = stream::iter(&plan.run)
                .map(|name| PluginJob::new(name.as_str(), config).run(ctx))
                .buffer_unordered(concurrency)
                .collect()
                .await;

            let order: HashMap<&str, usize> =
                plan.run.iter().enumerate().map(|(i, name)| (name.as_str(), i)).collect();
            results.sort_by_key(|r| order.get(r.plugin.as_str()).copied().unwrap_or(usize::MAX));

            RunSummary { results, skipped: plan.skipped, ..RunSummary::default() }
        };

        let summary = RunSummary { duration: start.elapsed(), ..summary };
        self.ctx.reporter.summary(&summary);
        summary
    }

    /// Describe what a run would do without touching anything.
    fn dry_run(&self, plan: Plan) -> RunSummary {
        let config = self.ctx.config;
        let patcher = ManifestPatcher::new(&config.framework);

        for name in &plan.run {
            let manifest = PluginJob::new(name.as_str(), config).manifest_path(config);
            let message = match patcher.current_pin(&manifest) {
                Ok(Some(pin)) => {
                    format!("would pin {} {pin} -> {}", patcher.field(), config.framework_ref)
                }
                Ok(None) => format!("manifest does not declare {}", patcher.field()),
                Err(err) => format!("manifest unusable: {err}"),
            };
            self.ctx.reporter.event(&StatusEvent::new(name, Phase::Info, message));
        }

        RunSummary { skipped: plan.skipped, planned: plan.run, dry_run: true, ..RunSummary::default() }
    }
}
