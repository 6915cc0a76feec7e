//! Packprobe - smoke-test harness for packaged tool distributions
//!
//! Re-exports the workspace crates under one roof for test suites that
//! want a single dependency.

pub use packprobe_exec as exec;
pub use packprobe_manifest as manifest;
pub use packprobe_probe as probe;
pub use packprobe_runfiles as runfiles;
