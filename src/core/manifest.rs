//! Plugin manifest patching.
//!
//! Rewrites the single devDependency that pins the framework under test.
//! Either the field is updated and the file atomically replaced, or the file
//! is left exactly as it was.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::Value;
use tempfile::NamedTempFile;

use super::error::{ManifestError, ManifestResult};

/// Section holding the framework pin.
pub const DEV_DEPENDENCIES: &str = "devDependencies";

/// Rewrites the framework pin in plugin manifests.
#[derive(Debug, Clone)]
pub struct ManifestPatcher {
    /// devDependency key to rewrite
    field: String,
}

impl ManifestPatcher {
    /// Create a patcher for the given devDependency key.
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }

    /// The devDependency key this patcher rewrites.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Set the pin in the manifest at `path` to `value`.
    pub fn patch(&self, path: &Path, value: &str) -> ManifestResult<()> {
        let content = read(path)?;
        let patched = self.apply(path, &content, value)?;
        if patched == content {
            return Ok(());
        }
        write_atomic(path, &patched)
    }

    /// Current value of the pin, if the manifest declares one.
    pub fn current_pin(&self, path: &Path) -> ManifestResult<Option<String>> {
        let doc = parse(path, &read(path)?)?;
        Ok(doc
            .get(DEV_DEPENDENCIES)
            .and_then(|deps| deps.get(&self.field))
            .map(|pin| pin.as_str().map_or_else(|| pin.to_string(), str::to_string)))
    }

    /// Produce the patched manifest text without touching the disk.
    fn apply(&self, path: &Path, content: &str, value: &str) -> ManifestResult<String> {
        let mut doc = parse(path, content)?;

        let deps = doc.get_mut(DEV_DEPENDENCIES).and_then(Value::as_object_mut).ok_or_else(
            || ManifestError::MissingSection { path: path.to_path_buf(), section: DEV_DEPENDENCIES },
        )?;
        let pin = deps.get_mut(&self.field).ok_or_else(|| ManifestError::MissingField {
            path: path.to_path_buf(),
            section: DEV_DEPENDENCIES,
            field: self.field.clone(),
        })?;
        *pin = Value::String(value.to_string());

        let mut out = serde_json::to_string_pretty(&doc)
            .map_err(|err| ManifestError::Write { path: path.to_path_buf(), source: err.into() })?;
        out.push('\n');
        Ok(out)
    }
}

fn read(path: &Path) -> ManifestResult<String> {
    fs::read_to_string(path)
        .map_err(|source| ManifestError::Read { path: path.to_path_buf(), source })
}

fn parse(path: &Path, content: &str) -> ManifestResult<Value> {
    serde_json::from_str(content)
        .map_err(|source| ManifestError::Parse { path: path.to_path_buf(), source })
}

/// Replace `path` with `content` through a temp file in the same directory.
fn write_atomic(path: &Path, content: &str) -> ManifestResult<()> {
    let to_write_err = |source| ManifestError::Write { path: path.to_path_buf(), source };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path).map_err(to_write_err)?.permissions();

    let mut tmp = NamedTempFile::new_in(dir).map_err(to_write_err)?;
    tmp.write_all(content.as_bytes()).map_err(to_write_err)?;
    tmp.as_file().sync_all().map_err(to_write_err)?;
    tmp.as_file().set_permissions(permissions).map_err(to_write_err)?;
    tmp.persist(path).map_err(|err| to_write_err(err.error))?;

    Ok(())
}
