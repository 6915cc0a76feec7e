//! Packprobe CLI
//!
//! Command-line front end for entry-point and manifest probes. Single
//! probes exit 0 on pass and 1 on failure; `plan` runs a JSON suite and
//! reports each probe before summarizing.

use std::path::Path;
use std::process;
use std::time::Duration;

use clap::{Arg, ArgAction, ArgMatches, Command};
use packprobe_manifest::Manifest;
use packprobe_probe::{
    DEFAULT_REJECTED_FLAG, DEFAULT_VERSION_FLAG, ManifestProbe, MatchMode, Plan, RejectionProbe,
    VersionProbe, run_plan,
};
use packprobe_runfiles::Runfiles;

fn main() {
    let matches = Command::new("packprobe")
        .version("0.1.0")
        .about("Smoke-test harness for packaged tool distributions")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("version")
                .about("Check an entry point's version output and exit code")
                .arg(entry_point_env_arg())
                .arg(
                    Arg::new("expect")
                        .long("expect")
                        .value_name("STRING")
                        .help("Expected version literal")
                        .required(true),
                )
                .arg(
                    Arg::new("suffix")
                        .long("suffix")
                        .help("Match the expected literal as a suffix instead of exactly")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("flag")
                        .long("flag")
                        .value_name("FLAG")
                        .help("Version-query argument")
                        .default_value(DEFAULT_VERSION_FLAG),
                )
                .arg(timeout_arg()),
        )
        .subcommand(
            Command::new("reject")
                .about("Check that an entry point rejects an unrecognized flag")
                .arg(entry_point_env_arg())
                .arg(
                    Arg::new("flag")
                        .long("flag")
                        .value_name("FLAG")
                        .help("Deliberately unrecognized flag")
                        .default_value(DEFAULT_REJECTED_FLAG),
                )
                .arg(
                    Arg::new("code")
                        .long("code")
                        .value_name("N")
                        .help("Expected exit code")
                        .value_parser(clap::value_parser!(i32))
                        .default_value("2"),
                )
                .arg(timeout_arg()),
        )
        .subcommand(
            Command::new("manifest")
                .about("Compare a space-delimited manifest env value to an expected list")
                .arg(
                    Arg::new("env")
                        .long("env")
                        .value_name("VAR")
                        .help("Environment variable holding the manifest")
                        .required(true),
                )
                .arg(
                    Arg::new("expect")
                        .long("expect")
                        .value_name("PATH")
                        .help("Expected entry, repeat in order")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("expect-file")
                        .long("expect-file")
                        .value_name("FILE")
                        .help("File with one expected entry per line")
                        .conflicts_with("expect"),
                ),
        )
        .subcommand(
            Command::new("plan")
                .about("Run a JSON plan of probes")
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .help("Plan file to run")
                        .required(true)
                        .index(1),
                )
                .arg(timeout_arg()),
        )
        .get_matches();

    let result = match matches.subcommand() {
        Some(("version", sub)) => cmd_version(sub),
        Some(("reject", sub)) => cmd_reject(sub),
        Some(("manifest", sub)) => cmd_manifest(sub),
        Some(("plan", sub)) => cmd_plan(sub),
        _ => unreachable!("subcommand is required"),
    };

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}

fn entry_point_env_arg() -> Arg {
    Arg::new("entry-point-env")
        .long("entry-point-env")
        .value_name("VAR")
        .help("Environment variable holding the entry point's logical path")
        .required(true)
}

fn timeout_arg() -> Arg {
    Arg::new("timeout-sec")
        .long("timeout-sec")
        .value_name("N")
        .help("Kill the probed executable after N seconds")
        .value_parser(clap::value_parser!(u64))
}

fn timeout_from(matches: &ArgMatches) -> Option<Duration> {
    matches
        .get_one::<u64>("timeout-sec")
        .map(|secs| Duration::from_secs(*secs))
}

fn cmd_version(matches: &ArgMatches) -> Result<i32, anyhow::Error> {
    let env = required_str(matches, "entry-point-env")?;
    let expect = required_str(matches, "expect")?;
    let mode = if matches.get_flag("suffix") {
        MatchMode::Suffix
    } else {
        MatchMode::Exact
    };

    let mut probe = VersionProbe::new(env, expect, mode);
    probe.flag = required_str(matches, "flag")?;
    probe.timeout = timeout_from(matches);

    let runfiles = Runfiles::create()?;
    probe.run(&runfiles)?;
    Ok(0)
}

fn cmd_reject(matches: &ArgMatches) -> Result<i32, anyhow::Error> {
    let mut probe = RejectionProbe::new(required_str(matches, "entry-point-env")?);
    probe.flag = required_str(matches, "flag")?;
    probe.expected_code = matches
        .get_one::<i32>("code")
        .copied()
        .ok_or_else(|| anyhow::anyhow!("packprobe: argument code is missing"))?;
    probe.timeout = timeout_from(matches);

    let runfiles = Runfiles::create()?;
    probe.run(&runfiles)?;
    Ok(0)
}

fn cmd_manifest(matches: &ArgMatches) -> Result<i32, anyhow::Error> {
    let env = required_str(matches, "env")?;

    let expected = match matches.get_one::<String>("expect-file") {
        Some(path) => manifest_from_file(Path::new(path))?,
        None => {
            let entries: Vec<String> = matches
                .get_many::<String>("expect")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            if entries.is_empty() {
                anyhow::bail!("packprobe: ERR_PLAN: manifest needs --expect or --expect-file");
            }
            Manifest::new(entries)
        }
    };

    ManifestProbe::new(env, expected).run()?;
    Ok(0)
}

fn cmd_plan(matches: &ArgMatches) -> Result<i32, anyhow::Error> {
    let path = required_str(matches, "file")?;
    let plan = Plan::from_file(Path::new(&path))?;

    let report = run_plan(&plan, timeout_from(matches));
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(()) => println!("PASS {}", outcome.label),
            Err(e) => println!("FAIL {}: {e}", outcome.label),
        }
    }
    println!("{} passed, {} failed", report.passed(), report.failed());

    Ok(if report.all_passed() { 0 } else { 1 })
}

fn manifest_from_file(path: &Path) -> Result<Manifest, anyhow::Error> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

// Every caller passes an id clap marks required or defaulted; an absent
// value is an argument-wiring bug, surfaced as an error rather than an
// empty string.
fn required_str(matches: &ArgMatches, id: &str) -> Result<String, anyhow::Error> {
    matches
        .get_one::<String>(id)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("packprobe: argument {id} is missing"))
}
