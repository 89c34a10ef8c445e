#![cfg(all(unix, feature = "cli"))]

use std::process::Command;

use serde_json::Value;

fn linerpc() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_linerpc"));
    command.arg("--log-level").arg("error");
    command
}

#[test]
fn invoke_against_serve_child_prints_result() {
    let output = linerpc()
        .args(["--format", "json", "invoke", "test2", "--arg", "\"hoge\"", "--"])
        .arg(env!("CARGO_BIN_EXE_linerpc"))
        .args(["--log-level", "error", "serve"])
        .output()
        .expect("invoke should run");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let value: Value = serde_json::from_slice(&output.stdout).expect("stdout is json");
    assert_eq!(value["channel"], "test2");
    assert_eq!(value["return"], "hello");
}

#[test]
fn invoke_unknown_channel_returns_124() {
    let output = linerpc()
        .args(["invoke", "missing", "--timeout", "200ms", "--"])
        .arg(env!("CARGO_BIN_EXE_linerpc"))
        .args(["--log-level", "error", "serve"])
        .output()
        .expect("invoke should run");

    assert_eq!(output.status.code(), Some(124));
    assert!(String::from_utf8_lossy(&output.stderr).contains("timed out"));
}

#[test]
fn invoke_with_invalid_json_arg_returns_64() {
    let output = linerpc()
        .args(["invoke", "echo", "--arg", "not-json", "--", "cat"])
        .output()
        .expect("invoke should run");

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn invoke_missing_program_returns_transport_error() {
    let output = linerpc()
        .args(["invoke", "echo", "--", "/nonexistent/linerpc-child"])
        .output()
        .expect("invoke should run");

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn invoke_against_closing_child_fails() {
    let output = linerpc()
        .args(["invoke", "echo", "--", "true"])
        .output()
        .expect("invoke should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("disconnected"));
}

#[test]
fn send_to_serve_child_exits_cleanly() {
    let output = linerpc()
        .args(["send", "ping", "--arg", "1", "--"])
        .arg(env!("CARGO_BIN_EXE_linerpc"))
        .args(["--log-level", "error", "serve"])
        .output()
        .expect("send should run");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn version_prints_package_version() {
    let output = linerpc().arg("version").output().expect("version should run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("linerpc {}", env!("CARGO_PKG_VERSION"))
    );
}
