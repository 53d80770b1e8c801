//! Shared helpers for driving the built `plcwatchd` binary.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

/// Captured outcome of one CLI invocation.
#[derive(Debug)]
pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    /// Transcript of the invocation, kept for failure messages.
    pub log_path: PathBuf,
}

/// Run the binary with `args` and write a transcript named after `case`.
pub fn run_cli_case(case: &str, args: &[&str]) -> CmdResult {
    let output = Command::new(env!("CARGO_BIN_EXE_plcwatchd"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("spawn plcwatchd");

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    let log_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("cli-cases");
    fs::create_dir_all(&log_dir).expect("create transcript dir");
    let log_path = log_dir.join(format!("{case}.log"));
    let transcript = format!(
        "args: {args:?}\nstatus: {}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}\n",
        output.status
    );
    fs::write(&log_path, transcript).expect("write transcript");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}
