//! Runtime and package manager resolution.
//!
//! Both executables are located on `PATH` once, before any plugin is
//! processed; a missing one aborts the run.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use super::config::RunConfig;
use super::error::ConfigError;

/// Absolute paths of the executables every job invokes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Runtime executable (e.g. `node`)
    pub runtime: PathBuf,
    /// Package manager entry point passed to the runtime (e.g. `npm`)
    pub package_manager: PathBuf,
}

impl Toolchain {
    /// Create a toolchain from known paths.
    pub fn new(runtime: impl Into<PathBuf>, package_manager: impl Into<PathBuf>) -> Self {
        Self { runtime: runtime.into(), package_manager: package_manager.into() }
    }

    /// Resolve the configured executables on the process `PATH`.
    pub fn resolve(config: &RunConfig) -> Result<Self, ConfigError> {
        let path = std::env::var_os("PATH").unwrap_or_default();
        Self::resolve_in(config, &path)
    }

    /// Resolve the configured executables on an explicit search path.
    pub fn resolve_in(config: &RunConfig, search_path: &OsStr) -> Result<Self, ConfigError> {
        let locate = |tool: &str| {
            find_in(search_path, tool).ok_or_else(|| ConfigError::ExecutableNotFound(tool.into()))
        };
        let toolchain = Self::new(locate(&config.runtime)?, locate(&config.package_manager)?);
        tracing::debug!(
            runtime = %toolchain.runtime.display(),
            package_manager = %toolchain.package_manager.display(),
            "resolved toolchain"
        );
        Ok(toolchain)
    }

    /// Arguments for `<runtime> <package-manager> <subcommand>`.
    pub fn args(&self, subcommand: &str) -> Vec<OsString> {
        vec![self.package_manager.clone().into_os_string(), OsString::from(subcommand)]
    }
}

fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path).map(|m| (m.permissions().mode() & 0o111) != 0).unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        true
    }
}

/// Find `tool` in the directories of a `PATH`-style search string.
///
/// The returned path is absolute.
pub fn find_in(search_path: &OsStr, tool: &str) -> Option<PathBuf> {
    if tool.is_empty() {
        return None;
    }

    let found = std::env::split_paths(search_path).find_map(|dir| {
        let candidate = dir.join(tool);
        if is_executable(&candidate) {
            return Some(candidate);
        }
        #[cfg(windows)]
        {
            let candidate = dir.join(format!("{tool}.exe"));
            if is_executable(&candidate) {
                return Some(candidate);
            }
        }
        None
    })?;

    // Jobs run in the plugin directory, so relative PATH entries must not leak through.
    Some(std::path::absolute(&found).unwrap_or(found))
}
