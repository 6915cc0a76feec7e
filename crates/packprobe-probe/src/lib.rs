//! Probes over generated entry points and packaging manifests
//!
//! A probe reads its inputs from environment variables supplied by the
//! invoking build process, resolves entry points through the runfiles
//! resolver, and judges external executables by exit code and output.
//! Each probe is independently pass/fail; there are no retries.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use packprobe_exec::{ExecError, Invocation, InvocationOutput};
use packprobe_manifest::{Manifest, ManifestDiff};
use packprobe_runfiles::{Runfiles, RunfilesError};
use serde::Deserialize;

pub mod plan;

pub use plan::{Plan, PlanError, PlanReport, ProbeOutcome, ProbeSpec, run_plan};

/// Flag entry points are expected to answer with a version line.
pub const DEFAULT_VERSION_FLAG: &str = "--version";

/// Flag no entry point is expected to recognize.
pub const DEFAULT_REJECTED_FLAG: &str = "--option-does-not-exist";

/// Conventional usage-error exit code for wrapped tools.
pub const USAGE_ERROR_CODE: i32 = 2;

/// Error types for probe preconditions and outcomes
#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("packprobe: ERR_ENV_MISSING: {var} is not set")]
    EnvMissing { var: String },

    #[error(transparent)]
    Unresolved(#[from] RunfilesError),

    #[error("packprobe: ERR_NOT_FOUND: entry point {path} does not exist")]
    EntryPointMissing { path: String },

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(
        "packprobe: ERR_EXIT_STATUS: {program} exited with status {actual}, expected {expected}; stderr: {stderr}"
    )]
    ExitStatus {
        program: String,
        expected: i32,
        actual: i32,
        stderr: String,
    },

    #[error(
        "packprobe: ERR_VERSION_MISMATCH: {program} reported {actual:?}, expected {mode} match of {expected:?}"
    )]
    VersionMismatch {
        program: String,
        expected: String,
        actual: String,
        mode: MatchMode,
    },

    #[error("packprobe: ERR_MANIFEST_MISMATCH: {var}: {diff}")]
    ManifestMismatch { var: String, diff: ManifestDiff },
}

/// How a version probe compares trimmed stdout to the expected literal
///
/// Wrapped tools format their version line differently: some print a bare
/// `tool X.Y.Z` (exact match), others prefix it with argv[0] (suffix
/// match).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Exact,
    Suffix,
}

impl MatchMode {
    #[must_use]
    pub fn matches(self, expected: &str, actual: &str) -> bool {
        match self {
            Self::Exact => actual == expected,
            Self::Suffix => actual.ends_with(expected),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Suffix => write!(f, "suffix"),
        }
    }
}

/// Read a required environment variable.
///
/// # Errors
///
/// Returns `ProbeError::EnvMissing` when the variable is absent, empty, or
/// not valid UTF-8. Malformed inputs fail closed, they never skip.
pub fn require_env(var: &str) -> Result<String, ProbeError> {
    match env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ProbeError::EnvMissing {
            var: var.to_string(),
        }),
    }
}

/// Resolve an entry point named by an environment variable.
///
/// # Errors
///
/// Fails when the variable is missing or the logical path cannot be
/// resolved. Existence on disk is checked at invocation time.
pub fn resolve_entry_point(runfiles: &Runfiles, var: &str) -> Result<PathBuf, ProbeError> {
    let logical = require_env(var)?;
    Ok(runfiles.rlocation(&logical)?)
}

/// Verifies that an entry point answers a version flag with the expected
/// line and exit code 0
#[derive(Debug, Clone)]
pub struct VersionProbe {
    /// Environment variable holding the entry point's logical path.
    pub entry_point_env: String,
    /// Expected version literal.
    pub expected: String,
    pub mode: MatchMode,
    /// Version-query argument passed to the entry point.
    pub flag: String,
    pub timeout: Option<Duration>,
}

impl VersionProbe {
    #[must_use]
    pub fn new(
        entry_point_env: impl Into<String>,
        expected: impl Into<String>,
        mode: MatchMode,
    ) -> Self {
        Self {
            entry_point_env: entry_point_env.into(),
            expected: expected.into(),
            mode,
            flag: DEFAULT_VERSION_FLAG.to_string(),
            timeout: None,
        }
    }

    /// Resolve the entry point from the environment and run the probe.
    ///
    /// # Errors
    ///
    /// Returns `ProbeError` on any failed precondition or assertion.
    pub fn run(&self, runfiles: &Runfiles) -> Result<(), ProbeError> {
        let entry_point = resolve_entry_point(runfiles, &self.entry_point_env)?;
        self.run_at(&entry_point)
    }

    /// Run the probe against an already-resolved entry point path.
    ///
    /// # Errors
    ///
    /// Returns `ProbeError` when the path does not exist, the invocation
    /// fails, the exit code is non-zero, or the version line mismatches.
    pub fn run_at(&self, entry_point: &Path) -> Result<(), ProbeError> {
        ensure_exists(entry_point)?;

        let invocation = Invocation::new(entry_point).arg(&self.flag);
        let output = with_timeout(invocation, self.timeout).run()?;
        require_exit_code(entry_point, 0, &output)?;

        let actual = output.stdout_text().trim().to_string();
        if !self.mode.matches(&self.expected, &actual) {
            return Err(ProbeError::VersionMismatch {
                program: entry_point.display().to_string(),
                expected: self.expected.clone(),
                actual,
                mode: self.mode,
            });
        }
        Ok(())
    }
}

/// Verifies that an entry point rejects an unrecognized flag with a
/// specific non-zero exit code
#[derive(Debug, Clone)]
pub struct RejectionProbe {
    /// Environment variable holding the entry point's logical path.
    pub entry_point_env: String,
    /// Deliberately unrecognized flag.
    pub flag: String,
    /// Expected exit code, conventionally 2.
    pub expected_code: i32,
    pub timeout: Option<Duration>,
}

impl RejectionProbe {
    #[must_use]
    pub fn new(entry_point_env: impl Into<String>) -> Self {
        Self {
            entry_point_env: entry_point_env.into(),
            flag: DEFAULT_REJECTED_FLAG.to_string(),
            expected_code: USAGE_ERROR_CODE,
            timeout: None,
        }
    }

    /// Resolve the entry point from the environment and run the probe.
    ///
    /// # Errors
    ///
    /// Returns `ProbeError` on any failed precondition or assertion.
    pub fn run(&self, runfiles: &Runfiles) -> Result<(), ProbeError> {
        let entry_point = resolve_entry_point(runfiles, &self.entry_point_env)?;
        self.run_at(&entry_point)
    }

    /// Run the probe against an already-resolved entry point path.
    ///
    /// An unexpected success (exit 0) fails the probe the same way any
    /// other wrong exit code does.
    ///
    /// # Errors
    ///
    /// Returns `ProbeError` when the path does not exist, the invocation
    /// fails, or the exit code differs from the expected one.
    pub fn run_at(&self, entry_point: &Path) -> Result<(), ProbeError> {
        ensure_exists(entry_point)?;

        let invocation = Invocation::new(entry_point).arg(&self.flag);
        let output = with_timeout(invocation, self.timeout).run()?;
        require_exit_code(entry_point, self.expected_code, &output)
    }
}

/// Verifies that a space-delimited manifest environment value matches an
/// expected ordered list of paths
#[derive(Debug, Clone)]
pub struct ManifestProbe {
    /// Environment variable holding the space-delimited manifest.
    pub env: String,
    pub expected: Manifest,
}

impl ManifestProbe {
    #[must_use]
    pub const fn new(env: String, expected: Manifest) -> Self {
        Self { env, expected }
    }

    /// Read the manifest from the environment and verify it.
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::EnvMissing` when the variable is unset and
    /// `ProbeError::ManifestMismatch` on any divergence.
    pub fn run(&self) -> Result<(), ProbeError> {
        let raw = require_env(&self.env)?;
        self.verify_value(&raw)
    }

    /// Verify an already-read manifest string.
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::ManifestMismatch` on any divergence.
    pub fn verify_value(&self, raw: &str) -> Result<(), ProbeError> {
        let actual = Manifest::from_delimited(raw);
        self.expected
            .verify(&actual)
            .map_err(|diff| ProbeError::ManifestMismatch {
                var: self.env.clone(),
                diff,
            })
    }
}

fn ensure_exists(entry_point: &Path) -> Result<(), ProbeError> {
    if entry_point.exists() {
        Ok(())
    } else {
        Err(ProbeError::EntryPointMissing {
            path: entry_point.display().to_string(),
        })
    }
}

fn require_exit_code(
    program: &Path,
    expected: i32,
    output: &InvocationOutput,
) -> Result<(), ProbeError> {
    if output.code == expected {
        Ok(())
    } else {
        Err(ProbeError::ExitStatus {
            program: program.display().to_string(),
            expected,
            actual: output.code,
            stderr: output.stderr_text().trim().to_string(),
        })
    }
}

fn with_timeout(invocation: Invocation, timeout: Option<Duration>) -> Invocation {
    match timeout {
        Some(timeout) => invocation.timeout(timeout),
        None => invocation,
    }
}
