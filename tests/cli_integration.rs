//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end against fake `node` and `npm`
//! executables placed on an isolated `PATH`.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

/// Get the binary to test.
fn plugcheck() -> Command {
    Command::cargo_bin("plugcheck").unwrap()
}

/// Binary isolated from the caller's configuration and environment.
fn isolated(project: &TempDir) -> Command {
    let mut cmd = plugcheck();
    cmd.current_dir(project.path())
        .env("HOME", project.path())
        .env("XDG_CONFIG_HOME", project.path().join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("PLUGCHECK_FRAMEWORK_REF")
        .env_remove("PLUGCHECK_FRAMEWORK")
        .env_remove("PLUGCHECK_CONFIG");
    cmd
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    plugcheck()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--framework-ref"))
        .stdout(predicate::str::contains("--log-errors"));
}

#[test]
fn test_short_help_does_no_work() {
    let project = TempDir::new().unwrap();
    isolated(&project).arg("-h").assert().success().stdout(predicate::str::contains("Usage:"));
    project.child("node_modules").assert(predicate::path::missing());
}

#[test]
fn test_version_flag() {
    plugcheck()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_invalid_log_level() {
    plugcheck().args(["--log-level", "loud"]).assert().failure();
}

// ============================================================================
// Configuration Errors
// ============================================================================

#[test]
fn test_missing_project_manifest_is_fatal() {
    let project = TempDir::new().unwrap();
    isolated(&project)
        .assert()
        .failure()
        .stderr(predicate::str::contains("package.json"));
}

#[test]
fn test_invalid_config_file_is_fatal() {
    let project = TempDir::new().unwrap();
    project.child(".plugcheck.toml").write_str("[run]\njobs = \"many\"\n").unwrap();
    isolated(&project).arg("alpha").assert().failure();
}

#[cfg(unix)]
mod unix {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use super::*;

    const FAKE_NODE: &str = "#!/bin/sh\nexec /bin/sh \"$@\"\n";

    const FAKE_NPM: &str = r#"case "$1" in
  install)
    echo "added 42 packages"
    if [ -f fail-install ]; then exit 1; fi
    ;;
  test)
    if [ -f fail-test ]; then echo "not ok 1 - boom"; exit 1; fi
    echo "ok 1 - works"
    ;;
esac
"#;

    const PINNED: &str = r#"{
  "name": "plugin",
  "devDependencies": {
    "fastify": "^4.0.0",
    "tap": "^16.0.0"
  }
}
"#;

    fn write_executable(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// A host project with the given plugins installed and a fake toolchain.
    fn project(plugins: &[&str]) -> TempDir {
        let project = TempDir::new().unwrap();
        let deps: Vec<String> = plugins.iter().map(|p| format!("\"{p}\": \"*\"")).collect();
        project
            .child("package.json")
            .write_str(&format!("{{\"dependencies\": {{{}}}}}", deps.join(", ")))
            .unwrap();
        for plugin in plugins {
            project.child(format!("node_modules/{plugin}/package.json")).write_str(PINNED).unwrap();
        }

        let bin = project.child("bin");
        bin.create_dir_all().unwrap();
        write_executable(&bin.path().join("node"), FAKE_NODE);
        write_executable(&bin.path().join("npm"), FAKE_NPM);
        project
    }

    fn run(project: &TempDir) -> Command {
        let mut cmd = isolated(project);
        cmd.env("PATH", project.child("bin").path());
        cmd
    }

    fn manifest(project: &TempDir, plugin: &str) -> String {
        fs::read_to_string(project.child(format!("node_modules/{plugin}/package.json")).path())
            .unwrap()
    }

    #[test]
    fn test_missing_runtime_is_fatal() {
        let project = project(&["alpha"]);
        fs::remove_file(project.child("bin/node").path()).unwrap();

        run(&project).assert().failure().stderr(predicate::str::contains("node"));
        assert_eq!(manifest(&project, "alpha"), PINNED);
    }

    #[test]
    fn test_all_plugins_pass() {
        let project = project(&["alpha", "beta"]);

        run(&project)
            .assert()
            .success()
            .stdout(predicate::str::contains("✔ alpha: test ok"))
            .stdout(predicate::str::contains("✔ beta: test ok"))
            .stdout(predicate::str::contains("2 passed"));

        let patched = manifest(&project, "alpha");
        assert!(patched.contains("\"fastify\": \"git+https://github.com/fastify/fastify.git\""));
        assert!(patched.contains("\"tap\": \"^16.0.0\""));
    }

    #[test]
    fn test_framework_ref_flag() {
        let project = project(&["alpha"]);

        run(&project).args(["-F", "github:me/fastify#fix"]).assert().success();

        assert!(manifest(&project, "alpha").contains("\"fastify\": \"github:me/fastify#fix\""));
    }

    #[test]
    fn test_failures_do_not_fail_the_run() {
        let project = project(&["alpha", "beta", "gamma"]);
        project.child("node_modules/beta/fail-test").touch().unwrap();
        project.child("node_modules/gamma/fail-install").touch().unwrap();

        run(&project)
            .assert()
            .success()
            .stdout(predicate::str::contains("✔ alpha: test ok"))
            .stdout(predicate::str::contains("✖ beta: test not ok (exit code 1)"))
            .stdout(predicate::str::contains("⚠ gamma: install deps failed"))
            .stdout(predicate::str::contains("gamma: running tests").not())
            .stdout(predicate::str::contains("Not passing: beta, gamma"));
    }

    #[test]
    fn test_fail_on_error_exit_code() {
        let project = project(&["alpha", "beta"]);
        project.child("node_modules/beta/fail-test").touch().unwrap();

        run(&project).arg("--fail-on-error").assert().code(1);
    }

    #[test]
    fn test_fail_on_error_when_all_pass() {
        let project = project(&["alpha"]);
        run(&project).arg("--fail-on-error").assert().success();
    }

    #[test]
    fn test_log_errors_dumps_test_output() {
        let project = project(&["alpha"]);
        project.child("node_modules/alpha/fail-test").touch().unwrap();

        run(&project)
            .assert()
            .success()
            .stdout(predicate::str::contains("not ok 1 - boom").not());

        run(&project)
            .arg("--log-errors")
            .assert()
            .success()
            .stdout(predicate::str::contains("not ok 1 - boom"));
    }

    #[test]
    fn test_verbose_echoes_test_output_only() {
        let project = project(&["alpha"]);

        run(&project)
            .arg("-v")
            .assert()
            .success()
            .stdout(predicate::str::contains("[alpha] ok 1 - works"))
            .stdout(predicate::str::contains("added 42 packages").not());

        run(&project)
            .args(["-v", "-N"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[alpha] added 42 packages"));
    }

    #[test]
    fn test_default_skip_list() {
        let project = project(&["alpha", "fastify-redis"]);

        run(&project)
            .assert()
            .success()
            .stdout(predicate::str::contains("fastify-redis: skipped"))
            .stdout(predicate::str::contains("1 passed"));

        assert_eq!(manifest(&project, "fastify-redis"), PINNED);
    }

    #[test]
    fn test_skip_flag() {
        let project = project(&["alpha", "beta"]);

        run(&project).args(["--skip", "beta"]).assert().success();

        assert_eq!(manifest(&project, "beta"), PINNED);
        assert_ne!(manifest(&project, "alpha"), PINNED);
    }

    #[test]
    fn test_explicit_plugins() {
        let project = project(&["alpha", "beta"]);

        run(&project).arg("beta").assert().success().stdout(predicate::str::contains("1 passed"));

        assert_eq!(manifest(&project, "alpha"), PINNED);
    }

    #[test]
    fn test_manifest_without_pin() {
        let project = project(&["alpha"]);
        let original = "{\"name\": \"alpha\", \"devDependencies\": {}}";
        project.child("node_modules/alpha/package.json").write_str(original).unwrap();

        run(&project)
            .assert()
            .success()
            .stdout(predicate::str::contains("⚠ alpha: cannot update plugin"))
            .stdout(predicate::str::contains("1 manifest update failed"));

        assert_eq!(manifest(&project, "alpha"), original);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let project = project(&["alpha"]);

        run(&project)
            .arg("--dry-run")
            .assert()
            .success()
            .stdout(predicate::str::contains("would pin fastify ^4.0.0"))
            .stdout(predicate::str::contains("Dry run: 1 plugins would be tested"));

        assert_eq!(manifest(&project, "alpha"), PINNED);
    }

    #[test]
    fn test_dry_run_without_toolchain() {
        let project = project(&["alpha"]);
        fs::remove_file(project.child("bin/node").path()).unwrap();
        fs::remove_file(project.child("bin/npm").path()).unwrap();

        run(&project)
            .arg("--dry-run")
            .assert()
            .success()
            .stdout(predicate::str::contains("would pin fastify ^4.0.0"));
    }

    #[test]
    fn test_relative_path_entry() {
        let project = project(&["alpha"]);

        run(&project)
            .env("PATH", "bin")
            .assert()
            .success()
            .stdout(predicate::str::contains("✔ alpha: test ok"));
    }

    #[test]
    fn test_parallel_jobs() {
        let project = project(&["alpha", "beta", "gamma", "delta"]);

        run(&project)
            .args(["--jobs", "3"])
            .assert()
            .success()
            .stdout(predicate::str::contains("4 passed"));
    }

    #[test]
    fn test_config_file_settings() {
        let project = project(&["alpha", "beta"]);
        project
            .child(".plugcheck.toml")
            .write_str("[framework]\nreference = \"1.2.3\"\n\n[plugins]\nskip = [\"beta\"]\n")
            .unwrap();

        run(&project).assert().success();

        assert!(manifest(&project, "alpha").contains("\"fastify\": \"1.2.3\""));
        assert_eq!(manifest(&project, "beta"), PINNED);
    }

    #[test]
    fn test_project_dir_flag() {
        let project = project(&["alpha"]);
        let elsewhere = TempDir::new().unwrap();

        run(&project)
            .current_dir(elsewhere.path())
            .arg("-C")
            .arg(project.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("1 passed"));
    }
}
