//! plcwatchd binary entry point.

use std::process::ExitCode;

use clap::Parser;
use plcwatchd::cli_app::{self, Cli, Launch};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version are not failures.
            let code = if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            if let Err(io_err) = err.print() {
                eprintln!("plcwatchd: cannot print usage: {io_err}");
            }
            return code;
        }
    };

    match cli_app::run(&cli) {
        Ok(Launch::Detached { pid }) => {
            println!("plcwatchd detached (pid {pid})");
            ExitCode::SUCCESS
        }
        // Only a termination signal ends the loop; report it as a failure.
        Ok(Launch::Stopped { .. }) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("plcwatchd: {err}");
            ExitCode::FAILURE
        }
    }
}
