//! CLI Integration Tests
//!
//! Runs the binary in an isolated data directory and checks the failure
//! paths that need no relay.

use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Helper to run CLI commands in an isolated data directory
struct CliTestContext {
    data_dir: TempDir,
}

impl CliTestContext {
    fn new() -> Self {
        Self {
            data_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_courier"));
        cmd.arg("--data-dir")
            .arg(self.data_dir.path())
            .arg("--server-key")
            .arg("11".repeat(32))
            .env_remove("COURIER_CONFIG");

        for arg in args {
            cmd.arg(arg);
        }

        cmd.output().expect("Failed to execute command")
    }

    /// Run a command and assert failure
    fn run_failure(&self, args: &[&str]) -> String {
        let output = self.run(args);
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        assert!(
            !output.status.success(),
            "Command {:?} should have failed",
            args
        );
        stderr
    }
}

#[test]
fn test_help_lists_commands() {
    let ctx = CliTestContext::new();
    let output = ctx.run(&["--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["backup-export", "backup-import", "listen", "send-text"] {
        assert!(stdout.contains(command), "missing {command} in help");
    }
}

#[test]
fn test_listen_without_identity_fails() {
    let ctx = CliTestContext::new();
    let stderr = ctx.run_failure(&["listen", "--seconds", "1"]);
    assert!(stderr.contains("No identity found"), "stderr: {stderr}");
}

#[test]
fn test_send_without_identity_fails() {
    let ctx = CliTestContext::new();
    let stderr = ctx.run_failure(&["send-text", "BOBBY002", "hello"]);
    assert!(stderr.contains("No identity found"), "stderr: {stderr}");
}

#[test]
fn test_import_malformed_backup_fails() {
    let ctx = CliTestContext::new();
    let stderr = ctx.run_failure(&["backup-import", "ABCD-EFGH"]);
    assert!(stderr.contains("Not a valid backup"), "stderr: {stderr}");
}

#[test]
fn test_import_refuses_to_overwrite_identity() {
    let ctx = CliTestContext::new();
    let identity = format!(
        r#"{{"identity": "ECHOECHO", "secret_key": "{}", "server_group": "00"}}"#,
        "22".repeat(32)
    );
    fs::write(ctx.data_dir.path().join("identity.json"), identity).unwrap();

    let stderr = ctx.run_failure(&["backup-import", "ABCD-EFGH"]);
    assert!(stderr.contains("--force"), "stderr: {stderr}");
}
