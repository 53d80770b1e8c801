//! Integration smoke tests for the `plcwatchd` command line.

mod common;

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: plcwatchd [OPTIONS]"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
    for flag in ["--ip", "--key", "--token", "--retry", "--expire", "--device", "--daemonize"] {
        assert!(
            result.stdout.contains(flag),
            "help lacks {flag}; log: {}",
            result.log_path.display()
        );
    }
}

#[test]
fn version_command_prints_version() {
    let result = common::run_cli_case("version_command_prints_version", &["--version"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains(env!("CARGO_PKG_VERSION")),
        "missing version output; log: {}",
        result.log_path.display()
    );
}

#[test]
fn missing_mandatory_arguments_exit_one() {
    let cases: [(&[&str], &str); 3] = [
        (&[], "ip"),
        (&["-i", "10.0.0.1", "-t", "app"], "key"),
        (&["-i", "10.0.0.1", "-k", "user"], "token"),
    ];
    for (args, missing) in cases {
        let case = format!("missing_{missing}");
        let result = common::run_cli_case(&case, args);
        assert_eq!(
            result.status.code(),
            Some(1),
            "expected exit 1 for {args:?}; log: {}",
            result.log_path.display()
        );
        assert!(
            result.stderr.contains("PWD-1002") && result.stderr.contains(missing),
            "expected missing-argument error naming {missing}; log: {}",
            result.log_path.display()
        );
    }
}

#[test]
fn pushover_limits_are_enforced_at_startup() {
    let base = ["-i", "10.0.0.1", "-k", "user", "-t", "app"];
    let cases: [(&str, &[&str]); 3] = [
        ("retry_below_minimum", &["-c", "10"]),
        ("expire_above_maximum", &["-e", "20000"]),
        ("zero_polling", &["-p", "0"]),
    ];
    for (case, extra) in cases {
        let args: Vec<&str> = base.iter().chain(extra.iter()).copied().collect();
        let result = common::run_cli_case(case, &args);
        assert_eq!(
            result.status.code(),
            Some(1),
            "expected exit 1; log: {}",
            result.log_path.display()
        );
        assert!(
            result.stderr.contains("PWD-1001"),
            "expected invalid-config error; log: {}",
            result.log_path.display()
        );
    }
}

#[test]
fn unknown_flag_exits_one() {
    let result = common::run_cli_case("unknown_flag_exits_one", &["--bogus"]);
    assert_eq!(
        result.status.code(),
        Some(1),
        "usage errors exit 1; log: {}",
        result.log_path.display()
    );
}
