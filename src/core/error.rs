//! Error types.
//!
//! `ConfigError` aborts a run before any plugin is touched. `ManifestError`
//! only ever fails the one plugin whose manifest could not be patched.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Fatal errors raised while resolving the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required executable is not on `PATH`.
    #[error("Executable '{0}' not found in PATH")]
    ExecutableNotFound(String),

    /// The project manifest listing the plugins could not be read.
    #[error("Cannot read project manifest {path:?}: {source}")]
    ProjectManifestUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The project manifest is not valid JSON.
    #[error("Invalid project manifest {path:?}: {source}")]
    ProjectManifestInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The config file could not be read.
    #[error("Cannot read config file {path:?}: {source}")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this tool.
    #[error("Invalid config file {path:?}: {source}")]
    ConfigInvalid {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors that can occur while patching a plugin manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Manifest could not be read.
    #[error("Cannot open {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest is not valid JSON.
    #[error("Cannot parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The dependency section is absent or not an object.
    #[error("{path:?} has no '{section}' object")]
    MissingSection { path: PathBuf, section: &'static str },

    /// The dependency section does not pin the framework.
    #[error("{path:?} does not declare '{field}' in '{section}'")]
    MissingField { path: PathBuf, section: &'static str, field: String },

    /// The patched manifest could not be persisted.
    #[error("Cannot overwrite {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
