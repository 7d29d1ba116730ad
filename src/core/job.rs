//! Per-plugin pipeline.
//!
//! A job runs patch → install → test → report for one plugin, strictly in
//! that order, and stops at the first failing stage.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::config::RunConfig;
use super::executor::{CommandRunner, Invocation, OutputLine, OutputStream, ProcessOutcome};
use super::manifest::ManifestPatcher;
use super::reporter::{Phase, Reporter, StatusEvent};
use super::toolchain::Toolchain;

/// Terminal state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobOutcome {
    /// The framework pin could not be written
    ManifestUpdateFailed,
    /// Dependency installation did not succeed
    InstallFailed,
    /// The test suite did not succeed
    TestFailed,
    /// The test suite succeeded
    Passed,
}

impl JobOutcome {
    /// Check if the plugin passed.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Stable kebab-case label.
    pub fn label(self) -> &'static str {
        match self {
            Self::ManifestUpdateFailed => "manifest-update-failed",
            Self::InstallFailed => "install-failed",
            Self::TestFailed => "test-failed",
            Self::Passed => "passed",
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one plugin's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    /// Plugin name
    pub plugin: String,
    /// Terminal state
    pub outcome: JobOutcome,
    /// Exit code of the last process run, if it exited normally
    pub exit_code: Option<i32>,
    /// Buffered output of the test stage, when it ran
    pub test_output: Option<String>,
    /// Wall time of the whole job
    pub duration: Duration,
}

/// Shared, read-only collaborators of every job.
#[derive(Clone, Copy)]
pub struct JobContext<'a> {
    /// Resolved run options
    pub config: &'a RunConfig,
    /// Resolved executables
    pub toolchain: &'a Toolchain,
    /// Process runner
    pub runner: &'a dyn CommandRunner,
    /// Progress sink
    pub reporter: &'a dyn Reporter,
}

impl JobContext<'_> {
    fn report(&self, plugin: &str, phase: Phase, message: impl Into<String>) {
        self.reporter.event(&StatusEvent::new(plugin, phase, message));
    }
}

/// One plugin to test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginJob {
    /// Plugin name
    pub name: String,
    /// Plugin directory
    pub path: PathBuf,
}

impl PluginJob {
    /// Create a job for `name` under the configured plugins root.
    pub fn new(name: impl Into<String>, config: &RunConfig) -> Self {
        let name = name.into();
        let path = config.plugin_dir(&name);
        Self { name, path }
    }

    /// Path of the plugin manifest.
    pub fn manifest_path(&self, config: &RunConfig) -> PathBuf {
        self.path.join(&config.manifest_name)
    }

    /// Run the pipeline to its terminal state.
    pub async fn run(self, ctx: &JobContext<'_>) -> JobResult {
        let start = Instant::now();
        let config = ctx.config;
        ctx.report(&self.name, Phase::Started, "testing plugin");

        let patcher = ManifestPatcher::new(&config.framework);
        if let Err(err) = patcher.patch(&self.manifest_path(config), &config.framework_ref) {
            tracing::debug!(plugin = %self.name, error = %err, "manifest patch failed");
            ctx.report(&self.name, Phase::Warning, format!("cannot update plugin: {err}"));
            return self.finish(JobOutcome::ManifestUpdateFailed, None, None, start);
        }

        ctx.report(&self.name, Phase::Installing, "installing dependencies");
        let install = self
            .stage(ctx, &config.install_command, config.echo_install(), config.echo_install())
            .await;
        match install {
            Ok(outcome) if outcome.success() => {}
            Ok(outcome) => {
                ctx.report(
                    &self.name,
                    Phase::Warning,
                    format!("install deps failed ({})", describe(&outcome, config)),
                );
                return self.finish(JobOutcome::InstallFailed, outcome.exit_code, None, start);
            }
            Err(err) => {
                ctx.report(&self.name, Phase::Warning, format!("install deps failed: {err}"));
                return self.finish(JobOutcome::InstallFailed, None, None, start);
            }
        }

        ctx.report(&self.name, Phase::Testing, "running tests");
        let test = self
            .stage(ctx, &config.test_command, config.echo_test_stdout(), config.echo_test_stderr())
            .await;
        match test {
            Ok(outcome) if outcome.success() => {
                ctx.report(
                    &self.name,
                    Phase::Success,
                    format!("test ok ({:.1}s)", start.elapsed().as_secs_f64()),
                );
                self.finish(JobOutcome::Passed, outcome.exit_code, Some(outcome.combined()), start)
            }
            Ok(outcome) => {
                ctx.report(
                    &self.name,
                    Phase::Failure,
                    format!("test not ok ({})", describe(&outcome, config)),
                );
                let output = outcome.combined();
                if config.log_errors {
                    ctx.reporter.dump(&self.name, &output);
                }
                self.finish(JobOutcome::TestFailed, outcome.exit_code, Some(output), start)
            }
            Err(err) => {
                ctx.report(&self.name, Phase::Failure, format!("test could not start: {err}"));
                self.finish(JobOutcome::TestFailed, None, None, start)
            }
        }
    }

    /// Run `<runtime> <package-manager> <subcommand>` in the plugin directory.
    async fn stage(
        &self,
        ctx: &JobContext<'_>,
        subcommand: &str,
        echo_stdout: bool,
        echo_stderr: bool,
    ) -> io::Result<ProcessOutcome> {
        let invocation =
            Invocation::new(&ctx.toolchain.runtime, ctx.toolchain.args(subcommand), &self.path)
                .timeout(ctx.config.stage_timeout);

        let reporter = ctx.reporter;
        let plugin = self.name.as_str();
        let echo = move |line: &OutputLine| {
            let wanted = match line.stream {
                OutputStream::Stdout => echo_stdout,
                OutputStream::Stderr => echo_stderr,
            };
            if wanted {
                reporter.output(plugin, line);
            }
        };

        ctx.runner.run(&invocation, &echo).await
    }

    fn finish(
        self,
        outcome: JobOutcome,
        exit_code: Option<i32>,
        test_output: Option<String>,
        start: Instant,
    ) -> JobResult {
        tracing::debug!(plugin = %self.name, outcome = %outcome, "job finished");
        JobResult { plugin: self.name, outcome, exit_code, test_output, duration: start.elapsed() }
    }
}

fn describe(outcome: &ProcessOutcome, config: &RunConfig) -> String {
    if outcome.timed_out {
        return match config.stage_timeout {
            Some(limit) => format!("timed out after {}s", limit.as_secs()),
            None => "timed out".to_string(),
        };
    }
    match outcome.exit_code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::core::executor::LineSink;
    use crate::core::reporter::MemoryReporter;

    /// Runner that answers each subcommand with a scripted exit code.
    #[derive(Default)]
    struct ScriptedRunner {
        exit_codes: HashMap<&'static str, i32>,
        output: Vec<OutputLine>,
        calls: Mutex<Vec<(PathBuf, String)>>,
    }

    impl ScriptedRunner {
        fn new(install: i32, test: i32) -> Self {
            Self { exit_codes: HashMap::from([("install", install), ("test", test)]), ..Default::default() }
        }

        fn subcommands(&self) -> Vec<String> {
            self.calls.lock().iter().map(|(_, sub)| sub.clone()).collect()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(
            &self,
            invocation: &Invocation,
            on_line: LineSink<'_>,
        ) -> io::Result<ProcessOutcome> {
            let sub = invocation.subcommand().unwrap_or_default().to_string();
            self.calls.lock().push((invocation.cwd.clone(), sub.clone()));

            let mut stdout = String::new();
            for line in &self.output {
                on_line(line);
                stdout.push_str(&line.line);
                stdout.push('\n');
            }
            let code = self.exit_codes.get(sub.as_str()).copied().unwrap_or(0);
            Ok(ProcessOutcome { exit_code: Some(code), stdout, ..Default::default() })
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        config: RunConfig,
        toolchain: Toolchain,
    }

    fn fixture(manifest: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let plugin_dir = dir.path().join("node_modules").join("alpha");
        fs::create_dir_all(&plugin_dir).unwrap();
        fs::write(plugin_dir.join("package.json"), manifest).unwrap();

        let config = RunConfig::resolve(Default::default(), dir.path());
        Fixture { _dir: dir, config, toolchain: Toolchain::new("/usr/bin/node", "/usr/bin/npm") }
    }

    const PINNED: &str = r#"{"name":"alpha","devDependencies":{"fastify":"^4.0.0"}}"#;

    async fn run_alpha(fx: &Fixture, runner: &ScriptedRunner, reporter: &MemoryReporter) -> JobResult {
        let ctx = JobContext { config: &fx.config, toolchain: &fx.toolchain, runner, reporter };
        PluginJob::new("alpha", &fx.config).run(&ctx).await
    }

    fn phases(reporter: &MemoryReporter) -> Vec<Phase> {
        reporter.events_for("alpha").iter().map(|e| e.phase).collect()
    }

    #[tokio::test]
    async fn test_job_passes() {
        let fx = fixture(PINNED);
        let runner = ScriptedRunner::new(0, 0);
        let reporter = MemoryReporter::new();

        let result = run_alpha(&fx, &runner, &reporter).await;

        assert_eq!(result.outcome, JobOutcome::Passed);
        assert_eq!(result.plugin, "alpha");
        assert_eq!(runner.subcommands(), vec!["install", "test"]);
        assert_eq!(
            phases(&reporter),
            vec![Phase::Started, Phase::Installing, Phase::Testing, Phase::Success]
        );

        let manifest = fs::read_to_string(fx.config.plugin_dir("alpha").join("package.json")).unwrap();
        assert!(manifest.contains(&fx.config.framework_ref));
    }

    #[tokio::test]
    async fn test_job_runs_in_plugin_dir() {
        let fx = fixture(PINNED);
        let runner = ScriptedRunner::new(0, 0);

        run_alpha(&fx, &runner, &MemoryReporter::new()).await;

        let cwd: Vec<_> = runner.calls.lock().iter().map(|(cwd, _)| cwd.clone()).collect();
        assert_eq!(cwd, vec![fx.config.plugin_dir("alpha"); 2]);
    }

    #[tokio::test]
    async fn test_job_manifest_failure_spawns_nothing() {
        let fx = fixture(r#"{"name":"alpha","devDependencies":{}}"#);
        let runner = ScriptedRunner::new(0, 0);
        let reporter = MemoryReporter::new();

        let result = run_alpha(&fx, &runner, &reporter).await;

        assert_eq!(result.outcome, JobOutcome::ManifestUpdateFailed);
        assert!(runner.subcommands().is_empty());
        assert_eq!(phases(&reporter), vec![Phase::Started, Phase::Warning]);
    }

    #[tokio::test]
    async fn test_job_install_failure_skips_test() {
        let fx = fixture(PINNED);
        let runner = ScriptedRunner::new(1, 0);
        let reporter = MemoryReporter::new();

        let result = run_alpha(&fx, &runner, &reporter).await;

        assert_eq!(result.outcome, JobOutcome::InstallFailed);
        assert_eq!(result.exit_code, Some(1));
        assert!(result.test_output.is_none());
        assert_eq!(runner.subcommands(), vec!["install"]);
        assert_eq!(phases(&reporter).last(), Some(&Phase::Warning));
    }

    #[tokio::test]
    async fn test_job_test_failure_keeps_output() {
        let fx = fixture(PINNED);
        let runner = ScriptedRunner {
            output: vec![OutputLine { stream: OutputStream::Stdout, line: "not ok 1".into() }],
            ..ScriptedRunner::new(0, 2)
        };
        let reporter = MemoryReporter::new();

        let result = run_alpha(&fx, &runner, &reporter).await;

        assert_eq!(result.outcome, JobOutcome::TestFailed);
        assert_eq!(result.exit_code, Some(2));
        assert_eq!(result.test_output.as_deref(), Some("not ok 1\n"));
        assert!(reporter.recorded().dumps.is_empty());
        assert!(reporter.recorded().output.is_empty());
    }

    #[tokio::test]
    async fn test_job_dumps_failure_output_when_enabled() {
        let mut fx = fixture(PINNED);
        fx.config.log_errors = true;
        let runner = ScriptedRunner {
            output: vec![OutputLine { stream: OutputStream::Stdout, line: "not ok 1".into() }],
            ..ScriptedRunner::new(0, 1)
        };
        let reporter = MemoryReporter::new();

        run_alpha(&fx, &runner, &reporter).await;

        assert_eq!(reporter.recorded().dumps, vec![("alpha".to_string(), "not ok 1\n".to_string())]);
    }

    #[tokio::test]
    async fn test_job_verbose_echoes_test_stdout_only() {
        let mut fx = fixture(PINNED);
        fx.config.verbose = true;
        let runner = ScriptedRunner {
            output: vec![OutputLine { stream: OutputStream::Stdout, line: "ok 1".into() }],
            ..ScriptedRunner::new(0, 0)
        };
        let reporter = MemoryReporter::new();

        run_alpha(&fx, &runner, &reporter).await;

        // install output stays hidden without install logs
        let output = reporter.recorded().output;
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].0, "alpha");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(JobOutcome::ManifestUpdateFailed.to_string(), "manifest-update-failed");
        assert_eq!(JobOutcome::InstallFailed.label(), "install-failed");
        assert!(JobOutcome::Passed.is_success());
        assert!(!JobOutcome::TestFailed.is_success());
    }

    #[test]
    fn test_describe() {
        let config = RunConfig::default();
        let exited = ProcessOutcome { exit_code: Some(1), ..Default::default() };
        assert_eq!(describe(&exited, &config), "exit code 1");

        let killed = ProcessOutcome::default();
        assert_eq!(describe(&killed, &config), "terminated by signal");

        let timed_out = ProcessOutcome { timed_out: true, ..Default::default() };
        assert_eq!(describe(&timed_out, &config), "timed out");
    }
}
