//! Command line smoke tests

use std::process::Command;

use crate::common::Scripts;

fn scriptrt() -> Command {
    Command::new(env!("CARGO_BIN_EXE_scriptrt"))
}

#[test]
fn test_check_accepts_valid_script() {
    let scripts = Scripts::new();
    let path = scripts.write("ok", "push 1\npush 2\nadd\n");

    let output = scriptrt().arg("check").arg(&path).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("3 instructions"));
}

#[test]
fn test_check_rejects_invalid_script() {
    let scripts = Scripts::new();
    let path = scripts.write("bad", "jump nowhere\n");

    let output = scriptrt().arg("check").arg(&path).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_call_prints_result() {
    let scripts = Scripts::new();
    let path = scripts.write("answer", "push 6\npush 7\nmul\n");

    let output = scriptrt().arg("call").arg(&path).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "42");
}

#[test]
fn test_run_lists_as_json() {
    let scripts = Scripts::new();
    let path = scripts.write("quick", "push 1\n");

    let output = scriptrt()
        .args(["run", "--manual-clock", "--list", "--json"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listing[0]["status"], "finished");
}
