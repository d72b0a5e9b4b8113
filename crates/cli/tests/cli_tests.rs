//! CLI integration tests

use std::process::Command;

fn spd(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "spd-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = spd(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Scaling Policy Planner"),
        "Should show app name"
    );
    assert!(stdout.contains("policies"), "Should show policies command");
    assert!(stdout.contains("delete"), "Should show delete command");
    assert!(stdout.contains("forecast"), "Should show forecast command");
    assert!(stdout.contains("evaluate"), "Should show evaluate command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = spd(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("spd"), "Should show binary name");
}

#[test]
fn test_policies_help() {
    let output = spd(&["policies", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("list"));
    assert!(stdout.contains("get"));
    assert!(stdout.contains("selected"));
}

#[test]
fn test_delete_help_shows_force() {
    let output = spd(&["delete", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--force"), "Should show force flag");
}

#[test]
fn test_selected_requires_window() {
    let output = spd(&["policies", "selected"]);

    assert!(!output.status.success(), "Missing window bounds should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--start"));
}

#[test]
fn test_evaluate_missing_file_fails() {
    let output = spd(&["evaluate", "/nonexistent/batch.json"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read batch file"));
}
