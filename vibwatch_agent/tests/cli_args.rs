//! CLI arg parsing tests for vibwatch_agent (server)
use std::process::Command;

#[test]
fn test_help_mentions_port_and_sim_flags() {
    let out = assert_cmd::Command::cargo_bin("vibwatch_agent")
        .unwrap()
        .arg("--help")
        .output()
        .expect("run vibwatch_agent --help");
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(
        text.contains("--port") && text.contains("-p") && text.contains("--no-sim"),
        "help text missing expected flags\n{text}"
    );
    assert!(text.contains("8000"), "default port not shown\n{text}");
}

#[test]
fn test_port_short_long() {
    // Flags are accepted when the process starts and binds (then we kill quickly).
    let exe = env!("CARGO_BIN_EXE_vibwatch_agent");
    for args in [["--port", "9565"], ["-p", "9566"]] {
        let mut child = Command::new(exe)
            .args(args)
            .arg("--no-sim")
            .spawn()
            .expect("spawn agent");
        std::thread::sleep(std::time::Duration::from_millis(150));
        // still running means parsing and binding went fine
        assert!(child.try_wait().unwrap().is_none(), "agent exited early with {args:?}");
        let _ = child.kill();
        let _ = child.wait();
    }
}

#[test]
fn test_bad_port_rejected() {
    assert_cmd::Command::cargo_bin("vibwatch_agent")
        .unwrap()
        .args(["--port", "not-a-port"])
        .assert()
        .failure();
}
