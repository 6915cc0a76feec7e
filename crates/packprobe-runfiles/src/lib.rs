//! Runtime location resolution for packaged-tool probes
//!
//! Build tools expose the files a test needs through a "runfiles" layout:
//! either a manifest file mapping logical paths to absolute paths, or a
//! directory tree rooted at a well-known location. A `Runfiles` resolver is
//! created once per run and queried per lookup.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Environment variable naming a runfiles manifest file.
pub const MANIFEST_ENV: &str = "RUNFILES_MANIFEST_FILE";

/// Environment variable naming a runfiles directory root.
pub const DIR_ENV: &str = "RUNFILES_DIR";

/// Errors raised while building a resolver or resolving a logical path
#[derive(thiserror::Error, Debug)]
pub enum RunfilesError {
    #[error("packprobe: ERR_UNRESOLVED: neither RUNFILES_MANIFEST_FILE nor RUNFILES_DIR is set")]
    NotConfigured,

    #[error("packprobe: ERR_UNRESOLVED: cannot read runfiles manifest {path}: {source}")]
    ManifestUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("packprobe: ERR_UNRESOLVED: malformed runfiles manifest {path} at line {line}")]
    ManifestMalformed { path: String, line: usize },

    #[error("packprobe: ERR_UNRESOLVED: logical path {path:?} must be relative without '..' segments")]
    InvalidLogicalPath { path: String },

    #[error("packprobe: ERR_UNRESOLVED: {path:?} is not listed in the runfiles manifest")]
    NotListed { path: String },
}

#[derive(Debug)]
enum Strategy {
    /// Explicit mapping parsed from a manifest file.
    Manifest(HashMap<String, PathBuf>),
    /// Logical paths joined onto a directory root.
    Directory(PathBuf),
}

/// Maps logical workspace-relative paths to absolute filesystem paths
#[derive(Debug)]
pub struct Runfiles {
    strategy: Strategy,
}

impl Runfiles {
    /// Build a resolver from the process environment.
    ///
    /// A manifest file takes precedence over a runfiles directory.
    ///
    /// # Errors
    ///
    /// Returns `RunfilesError::NotConfigured` when neither environment
    /// variable is set, or a manifest error when the manifest is unreadable
    /// or malformed.
    pub fn create() -> Result<Self, RunfilesError> {
        if let Some(manifest) = env::var_os(MANIFEST_ENV) {
            return Self::from_manifest(Path::new(&manifest));
        }
        if let Some(dir) = env::var_os(DIR_ENV) {
            return Ok(Self::from_dir(PathBuf::from(dir)));
        }
        Err(RunfilesError::NotConfigured)
    }

    /// Build a resolver from a manifest file of `logical-path SP absolute-path`
    /// lines. The first space on each line is the separator.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or a non-empty line has
    /// no space separator.
    pub fn from_manifest(path: &Path) -> Result<Self, RunfilesError> {
        let text = fs::read_to_string(path).map_err(|source| RunfilesError::ManifestUnreadable {
            path: path.display().to_string(),
            source,
        })?;

        let mut entries = HashMap::new();
        for (index, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let Some((logical, absolute)) = line.split_once(' ') else {
                return Err(RunfilesError::ManifestMalformed {
                    path: path.display().to_string(),
                    line: index + 1,
                });
            };
            entries.insert(logical.to_string(), PathBuf::from(absolute));
        }

        Ok(Self {
            strategy: Strategy::Manifest(entries),
        })
    }

    /// Build a resolver that joins logical paths onto a directory root.
    #[must_use]
    pub const fn from_dir(root: PathBuf) -> Self {
        Self {
            strategy: Strategy::Directory(root),
        }
    }

    /// Resolve a logical workspace-relative path to an absolute path.
    ///
    /// Directory-backed resolution always produces a candidate path; whether
    /// the file exists on disk is the caller's precondition to check.
    ///
    /// # Errors
    ///
    /// Returns an error when the logical path is absolute or escapes upward,
    /// or when a manifest-backed resolver has no entry for it.
    pub fn rlocation(&self, logical: &str) -> Result<PathBuf, RunfilesError> {
        validate_logical_path(logical)?;

        match &self.strategy {
            Strategy::Manifest(entries) => {
                entries
                    .get(logical)
                    .cloned()
                    .ok_or_else(|| RunfilesError::NotListed {
                        path: logical.to_string(),
                    })
            }
            Strategy::Directory(root) => Ok(root.join(logical)),
        }
    }
}

fn validate_logical_path(logical: &str) -> Result<(), RunfilesError> {
    let path = Path::new(logical);
    let escapes = path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if logical.is_empty() || path.is_absolute() || escapes {
        return Err(RunfilesError::InvalidLogicalPath {
            path: logical.to_string(),
        });
    }
    Ok(())
}
