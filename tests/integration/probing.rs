//! Integration tests for probes against fabricated entry points
//!
//! Entry points are shell-script stand-ins for generated wrappers: they
//! answer `--version` with a fixed line and reject anything else with the
//! conventional usage-error exit code.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use packprobe::manifest::Manifest;
use packprobe::probe::{ManifestProbe, MatchMode, ProbeError, RejectionProbe, VersionProbe};
use tempfile::TempDir;

const YAMLLINT_WRAPPER: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
    echo "yamllint 1.26.3"
    exit 0
fi
echo "unknown option: $1" >&2
exit 2
"#;

// Prefixes the version with argv[0], the way tools that reuse their
// invocation name for the report do.
const SPHINX_BUILD_WRAPPER: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
    echo "$0 4.2.0"
    exit 0
fi
echo "unknown option: $1" >&2
exit 2
"#;

const WHEEL_DATA_CONTENTS: [&str; 6] = [
    "external/pip/pypi__s3cmd/s3cmd-2.1.0.data/data/share/doc/packages/s3cmd/INSTALL.md",
    "external/pip/pypi__s3cmd/s3cmd-2.1.0.data/data/share/doc/packages/s3cmd/LICENSE",
    "external/pip/pypi__s3cmd/s3cmd-2.1.0.data/data/share/doc/packages/s3cmd/NEWS",
    "external/pip/pypi__s3cmd/s3cmd-2.1.0.data/data/share/doc/packages/s3cmd/README.md",
    "external/pip/pypi__s3cmd/s3cmd-2.1.0.data/data/share/man/man1/s3cmd.1",
    "external/pip/pypi__s3cmd/s3cmd-2.1.0.data/scripts/s3cmd",
];

const WHEEL_DIST_INFO_CONTENTS: [&str; 6] = [
    "external/pip/pypi__boto3/boto3-1.14.51.dist-info/DESCRIPTION.rst",
    "external/pip/pypi__boto3/boto3-1.14.51.dist-info/METADATA",
    "external/pip/pypi__boto3/boto3-1.14.51.dist-info/RECORD",
    "external/pip/pypi__boto3/boto3-1.14.51.dist-info/WHEEL",
    "external/pip/pypi__boto3/boto3-1.14.51.dist-info/metadata.json",
    "external/pip/pypi__boto3/boto3-1.14.51.dist-info/top_level.txt",
];

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

fn expected_manifest(entries: &[&str]) -> Manifest {
    entries.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn test_version_probe_exact_match() {
    let dir = TempDir::new().unwrap();
    let entry_point = write_script(dir.path(), "yamllint", YAMLLINT_WRAPPER);

    let probe = VersionProbe::new("UNUSED_ENV", "yamllint 1.26.3", MatchMode::Exact);
    probe.run_at(&entry_point).unwrap();
}

#[test]
fn test_version_probe_suffix_match() {
    let dir = TempDir::new().unwrap();
    let entry_point = write_script(dir.path(), "sphinx-build", SPHINX_BUILD_WRAPPER);

    let probe = VersionProbe::new("UNUSED_ENV", "4.2.0", MatchMode::Suffix);
    probe.run_at(&entry_point).unwrap();
}

#[test]
fn test_version_probe_mismatch_reports_both_strings() {
    let dir = TempDir::new().unwrap();
    let entry_point = write_script(dir.path(), "yamllint", YAMLLINT_WRAPPER);

    let probe = VersionProbe::new("UNUSED_ENV", "yamllint 9.9.9", MatchMode::Exact);
    let err = probe.run_at(&entry_point).unwrap_err();
    match err {
        ProbeError::VersionMismatch {
            expected, actual, ..
        } => {
            assert_eq!(expected, "yamllint 9.9.9");
            assert_eq!(actual, "yamllint 1.26.3");
        }
        other => panic!("Expected VersionMismatch, got {other}"),
    }
}

#[test]
fn test_version_probe_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let entry_point = write_script(dir.path(), "yamllint", YAMLLINT_WRAPPER);

    let probe = VersionProbe::new("UNUSED_ENV", "yamllint 1.26.3", MatchMode::Exact);
    probe.run_at(&entry_point).unwrap();
    probe.run_at(&entry_point).unwrap();
}

#[test]
fn test_version_probe_requires_exit_zero() {
    let dir = TempDir::new().unwrap();
    let entry_point = write_script(
        dir.path(),
        "broken",
        "#!/bin/sh\necho \"broken 1.0.0\"\nexit 3\n",
    );

    let probe = VersionProbe::new("UNUSED_ENV", "broken 1.0.0", MatchMode::Exact);
    let err = probe.run_at(&entry_point).unwrap_err();
    match err {
        ProbeError::ExitStatus {
            expected, actual, ..
        } => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 3);
        }
        other => panic!("Expected ExitStatus, got {other}"),
    }
}

#[test]
fn test_rejection_probe_accepts_usage_error() {
    let dir = TempDir::new().unwrap();
    let entry_point = write_script(dir.path(), "yamllint", YAMLLINT_WRAPPER);

    let probe = RejectionProbe::new("UNUSED_ENV");
    probe.run_at(&entry_point).unwrap();
}

#[test]
fn test_rejection_probe_fails_on_unexpected_success() {
    let dir = TempDir::new().unwrap();
    let entry_point = write_script(dir.path(), "agreeable", "#!/bin/sh\nexit 0\n");

    let probe = RejectionProbe::new("UNUSED_ENV");
    let err = probe.run_at(&entry_point).unwrap_err();
    match err {
        ProbeError::ExitStatus {
            expected, actual, ..
        } => {
            assert_eq!(expected, 2);
            assert_eq!(actual, 0);
        }
        other => panic!("Expected ExitStatus, got {other}"),
    }
}

#[test]
fn test_rejection_probe_reports_captured_stderr() {
    let dir = TempDir::new().unwrap();
    let entry_point = write_script(dir.path(), "grumbler", "#!/bin/sh\necho \"bad flag\" >&2\nexit 7\n");

    let probe = RejectionProbe::new("UNUSED_ENV");
    let err = probe.run_at(&entry_point).unwrap_err();
    match err {
        ProbeError::ExitStatus { stderr, actual, .. } => {
            assert_eq!(actual, 7);
            assert_eq!(stderr, "bad flag");
        }
        other => panic!("Expected ExitStatus, got {other}"),
    }
}

#[test]
fn test_wheel_data_manifest_matches() {
    let probe = ManifestProbe::new(
        "WHEEL_DATA_CONTENTS".to_string(),
        expected_manifest(&WHEEL_DATA_CONTENTS),
    );
    probe.verify_value(&WHEEL_DATA_CONTENTS.join(" ")).unwrap();
}

#[test]
fn test_wheel_dist_info_manifest_matches() {
    let probe = ManifestProbe::new(
        "WHEEL_DIST_INFO_CONTENTS".to_string(),
        expected_manifest(&WHEEL_DIST_INFO_CONTENTS),
    );
    probe
        .verify_value(&WHEEL_DIST_INFO_CONTENTS.join(" "))
        .unwrap();
}

#[test]
fn test_manifest_probe_rejects_dropped_file() {
    let probe = ManifestProbe::new(
        "WHEEL_DATA_CONTENTS".to_string(),
        expected_manifest(&WHEEL_DATA_CONTENTS),
    );

    let truncated = WHEEL_DATA_CONTENTS[..5].join(" ");
    let err = probe.verify_value(&truncated).unwrap_err();
    match err {
        ProbeError::ManifestMismatch { diff, .. } => {
            assert_eq!(diff.index, 5);
            assert_eq!(
                diff.missing,
                ["external/pip/pypi__s3cmd/s3cmd-2.1.0.data/scripts/s3cmd"]
            );
        }
        other => panic!("Expected ManifestMismatch, got {other}"),
    }
}

#[test]
fn test_manifest_probe_rejects_reordered_files() {
    let probe = ManifestProbe::new(
        "WHEEL_DIST_INFO_CONTENTS".to_string(),
        expected_manifest(&WHEEL_DIST_INFO_CONTENTS),
    );

    let mut reordered: Vec<&str> = WHEEL_DIST_INFO_CONTENTS.to_vec();
    reordered.swap(0, 1);
    let err = probe.verify_value(&reordered.join(" ")).unwrap_err();
    match err {
        ProbeError::ManifestMismatch { diff, .. } => assert_eq!(diff.index, 0),
        other => panic!("Expected ManifestMismatch, got {other}"),
    }
}
