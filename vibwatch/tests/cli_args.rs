//! CLI arg parsing tests for vibwatch (client)
use assert_cmd::Command;

fn help_text(args: &[&str]) -> String {
    let out = Command::cargo_bin("vibwatch")
        .expect("vibwatch binary")
        .args(args)
        .output()
        .expect("run vibwatch");
    assert!(out.status.success(), "vibwatch {args:?} did not succeed");
    format!(
        "{}{}",
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    )
}

#[test]
fn test_help_mentions_flags() {
    let text = help_text(&["--help"]);
    for flag in [
        "--profile",
        "-P",
        "--http",
        "--save",
        "--poll",
        "--history-dir",
        "--demo",
        "--dry-run",
    ] {
        assert!(text.contains(flag), "help text missing {flag}\n{text}");
    }
}

#[test]
fn test_flags_accepted_with_help() {
    // --help short-circuits after parsing, so no connection is attempted
    assert!(help_text(&["--profile", "dev", "--help"]).contains("Usage:"));
    assert!(help_text(&["-P", "dev", "--poll", "--help"]).contains("Usage:"));
    assert!(help_text(&["--http", "http://127.0.0.1:8000", "--help"]).contains("Usage:"));
}

#[test]
fn test_unknown_flag_rejected() {
    Command::cargo_bin("vibwatch")
        .unwrap()
        .arg("--definitely-not-a-flag")
        .assert()
        .failure();
}

#[test]
fn test_dry_run_prints_resolved_url() {
    let td = tempfile::tempdir().unwrap();
    let out = Command::cargo_bin("vibwatch")
        .unwrap()
        .env("XDG_CONFIG_HOME", td.path())
        .args(["ws://127.0.0.1:8000/ws", "--dry-run"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(
        String::from_utf8_lossy(&out.stdout).trim(),
        "ws://127.0.0.1:8000/ws"
    );
}
