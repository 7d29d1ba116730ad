//! Plugin discovery.
//!
//! The host project's own `package.json` declares every plugin under test in
//! its `dependencies` mapping. Names come back in declaration order.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::error::ConfigError;

/// Plugins that need infrastructure (database servers) the runner cannot
/// provision.
pub const DEFAULT_SKIP: &[&str] =
    &["fastify-mongodb", "fastify-redis", "fastify-postgres", "fastify-leveldb"];

/// Subset of the host project's package.json.
#[derive(Debug, Deserialize)]
pub struct ProjectManifest {
    /// Plugins under test
    pub dependencies: Option<Map<String, Value>>,
}

/// Read the plugin names declared by the project manifest at `path`.
///
/// A manifest without `dependencies` yields an empty list.
pub fn discover_plugins(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        ConfigError::ProjectManifestUnreadable { path: path.to_path_buf(), source }
    })?;
    let manifest: ProjectManifest = serde_json::from_str(&content).map_err(|source| {
        ConfigError::ProjectManifestInvalid { path: path.to_path_buf(), source }
    })?;

    let plugins = manifest
        .dependencies
        .map(|deps| deps.into_iter().map(|(name, _)| name).collect())
        .unwrap_or_default();
    Ok(plugins)
}

/// Plugins excluded from every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipList(BTreeSet<String>);

impl SkipList {
    /// Build a skip list from names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// Check whether a plugin is skipped.
    pub fn contains(&self, plugin: &str) -> bool {
        self.0.contains(plugin)
    }
}

/// Plugins split into those that run and those that are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Plugins that get a job, in input order
    pub run: Vec<String>,
    /// Skip-listed plugins present in the input
    pub skipped: Vec<String>,
}

impl Plan {
    /// Partition plugin names by the skip list. Duplicates keep their first
    /// occurrence.
    pub fn new(plugins: &[String], skip: &SkipList) -> Self {
        let mut seen = BTreeSet::new();
        let mut plan = Self::default();

        for name in plugins {
            if !seen.insert(name.as_str()) {
                continue;
            }
            if skip.contains(name) {
                plan.skipped.push(name.clone());
            } else {
                plan.run.push(name.clone());
            }
        }

        plan
    }
}
