//! Testbed over machines created on setup and destroyed on teardown.

use std::fmt::Display;
use std::sync::Arc;

use tracing::{info, warn};

use super::lifecycle::{Lifecycle, TestbedState};
use super::{BackendKind, SetupArgs, Testbed, TestbedError, node_set};
use crate::config::TransportConfig;
use crate::node::{HostInfo, Node};
use crate::provision::{ProvisionError, ProvisionRequest, Provisioner};
use crate::transport::{CommandRunner, ProcessCommandRunner};

/// Testbed whose machines are owned by a [`Provisioner`].
#[derive(Debug)]
pub struct ProvisionedTestbed<P: Provisioner, R: CommandRunner = ProcessCommandRunner> {
    provisioner: P,
    transport: TransportConfig,
    runner: R,
    lifecycle: Lifecycle,
    nodes: Vec<Arc<Node<R>>>,
}

impl<P: Provisioner> ProvisionedTestbed<P, ProcessCommandRunner> {
    /// Creates a testbed whose nodes shell out to the real `ssh`/`scp`.
    #[must_use]
    pub const fn with_process_runner(provisioner: P, transport: TransportConfig) -> Self {
        Self::new(provisioner, transport, ProcessCommandRunner)
    }
}

impl<P: Provisioner, R: CommandRunner + Clone> ProvisionedTestbed<P, R> {
    /// Creates an uninitialized testbed.
    #[must_use]
    pub const fn new(provisioner: P, transport: TransportConfig, runner: R) -> Self {
        Self {
            provisioner,
            transport,
            runner,
            lifecycle: Lifecycle::new(BackendKind::Provisioned),
            nodes: Vec::new(),
        }
    }

    /// Provisioner backing the testbed.
    #[must_use]
    pub const fn provisioner(&self) -> &P {
        &self.provisioner
    }

    /// Strongly typed form of [`Testbed::setup`].
    ///
    /// When the provisioned machines cannot form a valid node set they are
    /// destroyed again before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`TestbedError::InvalidArguments`] for a zero count,
    /// [`TestbedError::InvalidState`] unless uninitialized, and
    /// [`TestbedError::Provisioning`] when provisioning fails.
    pub fn setup_provisioned(&mut self, request: &ProvisionRequest) -> Result<(), TestbedError> {
        self.lifecycle.require(TestbedState::Uninitialized, "set up")?;
        if request.count == 0 {
            return Err(TestbedError::InvalidArguments {
                expected: String::from("a node count of at least 1"),
                received: String::from("a node count of 0"),
            });
        }

        info!(count = request.count, reuse = request.reuse_existing, "provisioning testbed");
        let hosts = self.provisioner.provision(request)?;
        match node_set::build(hosts.clone(), &self.transport, &self.runner) {
            Ok(nodes) => {
                self.nodes = nodes;
                self.lifecycle.advance(TestbedState::Ready);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "provisioned hosts are unusable; destroying them");
                let message = self.destroy_with_note(&hosts, &err);
                Err(ProvisionError::InvalidHosts { message }.into())
            }
        }
    }

    fn destroy_with_note<E: Display>(&self, hosts: &[HostInfo], err: &E) -> String {
        let teardown_error = self.provisioner.destroy(hosts).err();
        append_teardown_note(err.to_string(), teardown_error.as_ref())
    }
}

pub(super) fn append_teardown_note<E: Display>(
    message: String,
    teardown_error: Option<&E>,
) -> String {
    if let Some(teardown) = teardown_error {
        format!("{message} (teardown also failed: {teardown})")
    } else {
        message
    }
}

impl<P: Provisioner, R: CommandRunner + Clone + 'static> Testbed for ProvisionedTestbed<P, R> {
    type Runner = R;

    fn setup(&mut self, args: SetupArgs) -> Result<(), TestbedError> {
        match args {
            SetupArgs::Provision(request) => self.setup_provisioned(&request),
            other @ SetupArgs::Hosts(_) => Err(TestbedError::InvalidArguments {
                expected: String::from("a provisioning request"),
                received: other.shape(),
            }),
        }
    }

    fn nodes(&self) -> Result<&[Arc<Node<R>>], TestbedError> {
        self.lifecycle.require(TestbedState::Ready, "list nodes of")?;
        Ok(&self.nodes)
    }

    fn teardown(&mut self) -> Result<(), TestbedError> {
        if self.lifecycle.state() == TestbedState::Destroyed {
            return Err(TestbedError::InvalidState {
                operation: "tear down",
                state: TestbedState::Destroyed,
            });
        }
        let hosts: Vec<HostInfo> = self.nodes.iter().map(|node| node.host().clone()).collect();
        self.nodes.clear();
        let outcome = self.provisioner.destroy(&hosts);
        self.lifecycle.advance(TestbedState::Destroyed);
        outcome.map_err(TestbedError::from)
    }

    fn state(&self) -> TestbedState {
        self.lifecycle.state()
    }

    fn backend(&self) -> BackendKind {
        self.lifecycle.backend()
    }
}
