//! Argument handling of the xtr binary.
//!
//! None of these cases reach the network.

use std::process::Command;

fn xtr(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_xtr"))
        .args(args)
        .output()
        .expect("Failed to run xtr")
}

#[test]
fn test_missing_target_fails() {
    let output = xtr(&[]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("required"), "stderr: {}", stderr);
    assert!(output.stdout.is_empty());
}

#[test]
fn test_zero_max_hops_rejected() {
    let output = xtr(&["--max-hops", "0", "192.0.2.1"]);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_help() {
    let output = xtr(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--max-hops"));
    assert!(stdout.contains("--attempts"));
    assert!(stdout.contains("--json"));
}
