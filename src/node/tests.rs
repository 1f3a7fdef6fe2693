//! Unit tests for node command execution and file transfer.

use super::*;
use crate::test_support::ScriptedRunner;
use rstest::{fixture, rstest};
use tempfile::TempDir;

#[fixture]
fn host() -> HostInfo {
    HostInfo::new("self", "127.0.0.1", "vagrant").with_identity_file("/keys/id")
}

fn node_with(host: HostInfo, runner: &ScriptedRunner) -> Node<ScriptedRunner> {
    Node::new(host, TransportConfig::default(), runner.clone())
}

#[rstest]
fn run_command_succeeds_on_zero_exit(host: HostInfo) {
    let runner = ScriptedRunner::new();
    runner.push_success();
    let node = node_with(host, &runner);

    node.run_command("ls").expect("ls should succeed");

    let invocations = runner.invocations();
    let call = invocations.first().expect("ssh should be invoked");
    assert_eq!(call.program, "ssh");
    assert_eq!(call.last_arg().as_deref(), Some("ls"));
    assert!(call.command_string().contains("vagrant@127.0.0.1"));
}

#[rstest]
fn run_command_fails_on_non_zero_exit(host: HostInfo) {
    let runner = ScriptedRunner::new();
    runner.push_failure(1);
    let node = node_with(host, &runner);

    let err = node.run_command("exit 1").expect_err("exit 1 should fail");
    let NodeError::Execution {
        node: name,
        command,
        reason,
        ..
    } = err
    else {
        panic!("expected execution error, got {err:?}");
    };
    assert_eq!(name, "self");
    assert_eq!(command, "exit 1");
    assert!(reason.contains("status 1"), "reason: {reason}");
}

#[rstest]
fn run_command_with_output_returns_combined_streams(host: HostInfo) {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(0), "vagrant\n", "");
    let node = node_with(host, &runner);

    let out = node
        .run_command_with_output("whoami")
        .expect("whoami should succeed");
    assert_eq!(out.trim(), "vagrant");
}

#[rstest]
fn failed_output_is_kept_in_error(host: HostInfo) {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(2), "partial\n", "boom\n");
    let node = node_with(host, &runner);

    let err = node
        .run_command_with_output("make")
        .expect_err("non-zero exit should fail");
    assert_eq!(err.output(), Some("partial\nboom\n"));
    assert_eq!(err.node(), "self");
}

#[rstest]
fn signal_termination_is_an_execution_error(host: HostInfo) {
    let runner = ScriptedRunner::new();
    runner.push_output(None, "", "");
    let node = node_with(host, &runner);

    let err = node.run_command("sleep 100").expect_err("signal should fail");
    assert!(err.to_string().contains("terminated by signal"), "{err}");
}

#[rstest]
fn transport_spawn_failure_is_an_execution_error(host: HostInfo) {
    let runner = ScriptedRunner::new();
    let node = node_with(host, &runner);

    let err = node.run_command("ls").expect_err("spawn failure should fail");
    assert!(matches!(err, NodeError::Execution { .. }), "got {err:?}");
    assert!(err.to_string().contains("no scripted response"), "{err}");
}

#[rstest]
fn host_environment_is_exported_before_command(host: HostInfo) {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(0), "foo\n", "");
    let env = EnvAssignment::new("MYENV", "foo").expect("valid assignment");
    let node = node_with(host.with_env([env]), &runner);

    node.run_command_with_output("echo $MYENV")
        .expect("echo should succeed");

    let call = runner.invocations().pop().expect("ssh should be invoked");
    assert_eq!(
        call.last_arg().as_deref(),
        Some("export MYENV=foo; echo $MYENV")
    );
}

#[rstest]
fn remote_to_local_builds_remote_source(host: HostInfo) {
    let runner = ScriptedRunner::new();
    runner.push_success();
    let node = node_with(host, &runner);

    node.scp_from_remote_to_local("test_remote_to_local", "./self_test_local")
        .expect("copy should succeed");

    let call = runner.invocations().pop().expect("scp should be invoked");
    assert_eq!(call.program, "scp");
    let rendered = call.command_string();
    assert!(
        rendered.ends_with("vagrant@127.0.0.1:test_remote_to_local ./self_test_local"),
        "{rendered}"
    );
}

#[rstest]
fn colon_in_local_name_stays_local(host: HostInfo) {
    let runner = ScriptedRunner::new();
    runner.push_success();
    let node = node_with(host, &runner);

    node.scp_from_remote_to_local("test_remote_to_local", "node:1_test_local")
        .expect("copy should succeed");

    let call = runner.invocations().pop().expect("scp should be invoked");
    assert_eq!(call.last_arg().as_deref(), Some("./node:1_test_local"));
}

#[rstest]
fn remote_to_local_failure_reports_stderr(host: HostInfo) {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(1), "", "scp: missing: No such file or directory\n");
    let node = node_with(host, &runner);

    let err = node
        .scp_from_remote_to_local("missing", "/tmp/sshbed-never-written")
        .expect_err("copy should fail");
    let NodeError::Transfer { reason, from, .. } = err else {
        panic!("expected transfer error, got {err:?}");
    };
    assert_eq!(from, "vagrant@127.0.0.1:missing");
    assert!(reason.contains("No such file"), "reason: {reason}");
}

#[rstest]
fn local_to_remote_requires_existing_source(host: HostInfo) {
    let runner = ScriptedRunner::new();
    let node = node_with(host, &runner);
    let dir = TempDir::new().expect("temp dir");
    let missing = camino::Utf8PathBuf::from_path_buf(dir.path().join("absent"))
        .expect("utf8 path");

    let err = node
        .scp_from_local_to_remote(&missing, "test_local_to_remote")
        .expect_err("missing local file should fail");
    assert!(matches!(err, NodeError::Transfer { .. }), "got {err:?}");
    assert!(
        runner.invocations().is_empty(),
        "no transport should be spawned for a missing source"
    );
}

#[rstest]
fn local_to_remote_builds_remote_destination(host: HostInfo) {
    let runner = ScriptedRunner::new();
    runner.push_success();
    let node = node_with(host, &runner);
    let dir = TempDir::new().expect("temp dir");
    let local = camino::Utf8PathBuf::from_path_buf(dir.path().join("test_local"))
        .expect("utf8 path");
    std::fs::write(&local, "I am testing scp").expect("write local file");

    node.scp_from_local_to_remote(&local, "test_local_to_remote")
        .expect("copy should succeed");

    let call = runner.invocations().pop().expect("scp should be invoked");
    assert_eq!(
        call.last_arg().as_deref(),
        Some("vagrant@127.0.0.1:test_local_to_remote")
    );
}
