//! Probe plans: JSON suites of probes run sequentially
//!
//! A plan bundles probes so a build step can validate a whole packaging
//! example in one invocation. Probes stay independently pass/fail; one
//! failure does not stop later probes, only the summary.

use std::fs;
use std::path::Path;
use std::time::Duration;

use packprobe_manifest::Manifest;
use packprobe_runfiles::Runfiles;
use serde::Deserialize;

use crate::{
    DEFAULT_REJECTED_FLAG, DEFAULT_VERSION_FLAG, ManifestProbe, MatchMode, ProbeError,
    RejectionProbe, USAGE_ERROR_CODE, VersionProbe,
};

/// Errors raised while loading a plan document
#[derive(thiserror::Error, Debug)]
pub enum PlanError {
    #[error("packprobe: ERR_PLAN: cannot read plan {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("packprobe: ERR_PLAN: invalid plan: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },
}

/// One probe description inside a plan document
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ProbeSpec {
    /// Version check against an entry point.
    Version {
        entry_point_env: String,
        expect: String,
        #[serde(rename = "match", default)]
        mode: MatchMode,
        #[serde(default = "default_version_flag")]
        flag: String,
    },
    /// Unrecognized-flag rejection check against an entry point.
    Reject {
        entry_point_env: String,
        #[serde(default = "default_rejected_flag")]
        flag: String,
        #[serde(default = "default_usage_error_code")]
        code: i32,
    },
    /// Ordered manifest comparison against an environment value.
    Manifest { env: String, expect: Vec<String> },
}

impl ProbeSpec {
    /// Short human-readable identity used in plan reports.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Version {
                entry_point_env, ..
            } => format!("version({entry_point_env})"),
            Self::Reject {
                entry_point_env, ..
            } => format!("reject({entry_point_env})"),
            Self::Manifest { env, .. } => format!("manifest({env})"),
        }
    }
}

fn default_version_flag() -> String {
    DEFAULT_VERSION_FLAG.to_string()
}

fn default_rejected_flag() -> String {
    DEFAULT_REJECTED_FLAG.to_string()
}

const fn default_usage_error_code() -> i32 {
    USAGE_ERROR_CODE
}

/// A parsed plan document
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    pub probes: Vec<ProbeSpec>,
}

impl Plan {
    /// Parse a plan from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::Parse` on malformed JSON or unknown fields.
    pub fn from_json(text: &str) -> Result<Self, PlanError> {
        serde_json::from_str(text).map_err(|source| PlanError::Parse { source })
    }

    /// Load and parse a plan file.
    ///
    /// # Errors
    ///
    /// Returns `PlanError` when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, PlanError> {
        let text = fs::read_to_string(path).map_err(|source| PlanError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }
}

/// Outcome of one probe in a plan run
#[derive(Debug)]
pub struct ProbeOutcome {
    pub label: String,
    pub result: Result<(), ProbeError>,
}

/// Summary of a sequential plan run
#[derive(Debug)]
pub struct PlanReport {
    pub outcomes: Vec<ProbeOutcome>,
}

impl PlanReport {
    #[must_use]
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

/// Run every probe in the plan sequentially.
///
/// The runfiles resolver is created lazily on the first entry-point probe,
/// so manifest-only plans never require a runfiles environment. An optional
/// timeout applies to each subprocess invocation.
#[must_use]
pub fn run_plan(plan: &Plan, timeout: Option<Duration>) -> PlanReport {
    let mut runfiles: Option<Runfiles> = None;

    let outcomes = plan
        .probes
        .iter()
        .map(|spec| ProbeOutcome {
            label: spec.label(),
            result: run_spec(spec, &mut runfiles, timeout),
        })
        .collect();

    PlanReport { outcomes }
}

fn run_spec(
    spec: &ProbeSpec,
    runfiles: &mut Option<Runfiles>,
    timeout: Option<Duration>,
) -> Result<(), ProbeError> {
    match spec {
        ProbeSpec::Version {
            entry_point_env,
            expect,
            mode,
            flag,
        } => {
            let mut probe = VersionProbe::new(entry_point_env.clone(), expect.clone(), *mode);
            probe.flag = flag.clone();
            probe.timeout = timeout;
            probe.run(cached_runfiles(runfiles)?)
        }
        ProbeSpec::Reject {
            entry_point_env,
            flag,
            code,
        } => {
            let mut probe = RejectionProbe::new(entry_point_env.clone());
            probe.flag = flag.clone();
            probe.expected_code = *code;
            probe.timeout = timeout;
            probe.run(cached_runfiles(runfiles)?)
        }
        ProbeSpec::Manifest { env, expect } => {
            let expected = Manifest::new(expect.clone());
            ManifestProbe::new(env.clone(), expected).run()
        }
    }
}

fn cached_runfiles(cache: &mut Option<Runfiles>) -> Result<&Runfiles, ProbeError> {
    match cache {
        Some(runfiles) => Ok(runfiles),
        None => {
            let runfiles = Runfiles::create()?;
            Ok(cache.insert(runfiles))
        }
    }
}
