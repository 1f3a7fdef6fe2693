//! End-to-end checks for the static testbed.
//!
//! Two nodes point at the same machine, reached through the loopback
//! transport, so every remote operation really runs a shell command or
//! copies a file.

#[path = "common/loopback.rs"]
mod loopback;

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use sshbed::{
    HostInfo, NodeError, ProcessCommandRunner, ProvisionRequest, SetupArgs, StaticTestbed,
    Testbed, TestbedError, TestbedState,
};
use tempfile::TempDir;

#[fixture]
fn testbed() -> StaticTestbed<ProcessCommandRunner> {
    let user = loopback::local_user();
    let mut bed = StaticTestbed::new(loopback::transport(), ProcessCommandRunner);
    bed.setup(SetupArgs::Hosts(vec![
        HostInfo::new("self1", "127.0.0.1", user.as_str()),
        HostInfo::new("self2", "127.0.0.1", user.as_str()),
    ]))
    .expect("setup should succeed");
    bed
}

fn scratch_dir() -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
    (dir, path)
}

#[rstest]
fn run_command_reports_exit_status(testbed: StaticTestbed<ProcessCommandRunner>) {
    for node in testbed.nodes().expect("ready") {
        node.run_command("ls").expect("ls should succeed");
        let err = node.run_command("exit 1").expect_err("exit 1 should fail");
        assert!(matches!(err, NodeError::Execution { .. }), "got {err:?}");
    }
}

#[rstest]
fn whoami_matches_remote_user(testbed: StaticTestbed<ProcessCommandRunner>) {
    for node in testbed.nodes().expect("ready") {
        let output = node
            .run_command_with_output("whoami")
            .expect("whoami should succeed");
        assert_eq!(output.trim(), node.host().user);
    }
}

#[rstest]
fn failed_command_output_is_still_available(testbed: StaticTestbed<ProcessCommandRunner>) {
    let node = testbed
        .nodes()
        .expect("ready")
        .first()
        .expect("at least one node");
    let err = node
        .run_command_with_output("echo partial; exit 4")
        .expect_err("exit 4 should fail");
    assert_eq!(err.output().map(str::trim), Some("partial"));
}

#[rstest]
#[case::success("exit 0", true)]
#[case::failure("exit 1", false)]
#[tokio::test]
async fn iterate_visits_both_nodes(
    testbed: StaticTestbed<ProcessCommandRunner>,
    #[case] command: &'static str,
    #[case] succeeds: bool,
) {
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&counter);

    let result = testbed
        .iterate_nodes(move |node| {
            seen.fetch_add(1, Ordering::SeqCst);
            node.run_command(command)
        })
        .await;

    assert_eq!(counter.load(Ordering::SeqCst), 2);
    match result {
        Ok(()) => assert!(succeeds, "{command} should have failed"),
        Err(TestbedError::Iteration(err)) => {
            assert!(!succeeds, "{command} should have succeeded: {err}");
            assert_eq!(err.failed_nodes(), ["self1", "self2"]);
        }
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[rstest]
fn scp_round_trip_is_byte_identical(testbed: StaticTestbed<ProcessCommandRunner>) {
    let (_guard, dir) = scratch_dir();
    let local = dir.join("test_local");
    let remote = dir.join("test_local_to_remote");
    let back = dir.join("test_remote_to_local");
    let payload = b"I am testing scp\n\x00binary tail\xff";
    fs::write(&local, payload).expect("write local file");

    let node = testbed
        .nodes()
        .expect("ready")
        .first()
        .expect("at least one node");
    node.scp_from_local_to_remote(&local, remote.as_str())
        .expect("upload should succeed");
    node.scp_from_remote_to_local(remote.as_str(), &back)
        .expect("download should succeed");

    assert_eq!(fs::read(&back).expect("read copy"), payload);
}

#[rstest]
fn scp_from_missing_remote_fails(testbed: StaticTestbed<ProcessCommandRunner>) {
    let (_guard, dir) = scratch_dir();
    let node = testbed
        .nodes()
        .expect("ready")
        .first()
        .expect("at least one node");

    let err = node
        .scp_from_remote_to_local(dir.join("absent").as_str(), dir.join("copy"))
        .expect_err("missing remote file should fail");

    assert!(matches!(err, NodeError::Transfer { .. }), "got {err:?}");
    assert!(!dir.join("copy").exists());
}

#[rstest]
#[tokio::test]
async fn per_node_copies_do_not_collide(testbed: StaticTestbed<ProcessCommandRunner>) {
    let (_guard, dir) = scratch_dir();
    let root = dir.clone();

    testbed
        .iterate_nodes(move |node| {
            let remote = root.join(format!("remote_{}", node.name()));
            node.run_command(&format!("echo {} > {remote}", node.name()))?;
            node.scp_from_remote_to_local(
                remote.as_str(),
                root.join(format!("{}_test_local", node.name())),
            )
        })
        .await
        .expect("every node should copy its file");

    for name in ["self1", "self2"] {
        let copied = fs::read_to_string(dir.join(format!("{name}_test_local")))
            .expect("per-node copy should exist");
        assert_eq!(copied.trim(), name);
    }
}

#[rstest]
fn provisioning_arguments_are_rejected() {
    let mut bed = StaticTestbed::new(loopback::transport(), ProcessCommandRunner);

    let err = bed
        .setup(SetupArgs::Provision(ProvisionRequest::new(1)))
        .expect_err("foreign shape should fail");

    let message = err.to_string();
    assert!(
        message.starts_with("unexpected arguments to setup (expected:"),
        "{message}"
    );
    assert!(message.contains("received:"), "{message}");
    assert_eq!(bed.state(), TestbedState::Uninitialized);
    assert!(bed.nodes().is_err());
}
