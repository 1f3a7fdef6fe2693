//! End-to-end checks for the provisioned testbed.
//!
//! The `vagrant` CLI is scripted while the machines it "reports" are reached
//! through the loopback transport, so environment injection and teardown are
//! exercised without a hypervisor.

#[path = "common/loopback.rs"]
mod loopback;

use std::sync::mpsc;

use rstest::rstest;
use sshbed::test_support::ScriptedRunner;
use sshbed::{
    EnvAssignment, ProcessCommandRunner, ProvisionError, ProvisionRequest, ProvisionedTestbed,
    SetupArgs, Testbed, TestbedError, TestbedState, VagrantConfig, VagrantProvisioner,
};

type VagrantTestbed = ProvisionedTestbed<VagrantProvisioner<ScriptedRunner>, ProcessCommandRunner>;

fn ssh_config_for(names: &[&str], user: &str) -> String {
    names
        .iter()
        .enumerate()
        .map(|(offset, name)| {
            format!(
                "Host {name}\n  HostName 127.0.0.1\n  User {user}\n  Port {}\n",
                2222 + offset
            )
        })
        .collect()
}

fn testbed(vagrant: &ScriptedRunner) -> VagrantTestbed {
    let provisioner = VagrantProvisioner::new(VagrantConfig::default(), vagrant.clone());
    ProvisionedTestbed::new(provisioner, loopback::transport(), ProcessCommandRunner)
}

#[rstest]
#[tokio::test]
async fn provisioning_env_is_visible_on_every_node() {
    let vagrant = ScriptedRunner::new();
    vagrant.push_success();
    vagrant.push_output(
        Some(0),
        ssh_config_for(&["node1", "node2", "node3"], &loopback::local_user()),
        "",
    );
    vagrant.push_success();
    let mut bed = testbed(&vagrant);
    let env = EnvAssignment::new("MYENV", "foo").expect("valid assignment");

    bed.setup(SetupArgs::Provision(ProvisionRequest::new(3).with_env([env])))
        .expect("setup should succeed");

    let (sender, receiver) = mpsc::channel();
    bed.iterate_nodes(move |node| {
        let output = node.run_command_with_output("echo $MYENV")?;
        sender
            .send((node.name().to_owned(), output.trim().to_owned()))
            .ok();
        Ok::<(), sshbed::NodeError>(())
    })
    .await
    .expect("echo should succeed on every node");

    let mut seen: Vec<(String, String)> = receiver.try_iter().collect();
    seen.sort();
    assert_eq!(
        seen,
        [
            (String::from("node1"), String::from("foo")),
            (String::from("node2"), String::from("foo")),
            (String::from("node3"), String::from("foo")),
        ]
    );

    let up = vagrant.invocations().first().cloned().expect("vagrant up");
    assert_eq!(up.env("MYENV"), Some("foo"));
    assert_eq!(up.env("SSHBED_NODES"), Some("3"));

    bed.teardown().expect("teardown should succeed");
    let destroy = vagrant.invocations().pop().expect("vagrant destroy");
    assert_eq!(destroy.command_string(), "vagrant destroy -f node1 node2 node3");
    assert_eq!(bed.state(), TestbedState::Destroyed);
}

#[rstest]
fn short_machine_list_fails_setup_and_destroys_machines() {
    let vagrant = ScriptedRunner::new();
    vagrant.push_success();
    vagrant.push_output(Some(0), ssh_config_for(&["node1"], "vagrant"), "");
    vagrant.push_success();
    let mut bed = testbed(&vagrant);

    let err = bed
        .setup(SetupArgs::Provision(ProvisionRequest::new(2)))
        .expect_err("one machine cannot satisfy two");

    assert_eq!(
        err,
        TestbedError::Provisioning(ProvisionError::InsufficientNodes {
            requested: 2,
            available: 1,
        })
    );
    assert_eq!(bed.state(), TestbedState::Uninitialized);
    let calls: Vec<String> = vagrant
        .invocations()
        .iter()
        .map(|call| call.command_string())
        .collect();
    assert_eq!(
        calls,
        ["vagrant up", "vagrant ssh-config", "vagrant destroy -f"]
    );

    bed.teardown().expect("nothing left to destroy");
    assert_eq!(vagrant.invocations().len(), 3);
}

#[rstest]
fn host_list_is_rejected_without_calling_vagrant() {
    let vagrant = ScriptedRunner::new();
    let mut bed = testbed(&vagrant);

    let err = bed
        .setup(SetupArgs::Hosts(Vec::new()))
        .expect_err("foreign shape should fail");

    assert!(matches!(err, TestbedError::InvalidArguments { .. }), "got {err:?}");
    assert!(vagrant.invocations().is_empty());
}
