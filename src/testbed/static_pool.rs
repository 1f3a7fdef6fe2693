//! Testbed over pre-existing hosts.

use std::sync::Arc;

use tracing::info;

use super::lifecycle::{Lifecycle, TestbedState};
use super::{BackendKind, SetupArgs, Testbed, TestbedError, node_set};
use crate::config::TransportConfig;
use crate::node::{HostInfo, Node};
use crate::transport::{CommandRunner, ProcessCommandRunner};

/// Testbed backed by hosts that already exist and stay up after teardown.
#[derive(Debug)]
pub struct StaticTestbed<R: CommandRunner = ProcessCommandRunner> {
    transport: TransportConfig,
    runner: R,
    lifecycle: Lifecycle,
    nodes: Vec<Arc<Node<R>>>,
}

impl StaticTestbed<ProcessCommandRunner> {
    /// Creates a testbed whose nodes shell out to the real `ssh`/`scp`.
    #[must_use]
    pub const fn with_process_runner(transport: TransportConfig) -> Self {
        Self::new(transport, ProcessCommandRunner)
    }
}

impl<R: CommandRunner + Clone> StaticTestbed<R> {
    /// Creates an uninitialized testbed.
    #[must_use]
    pub const fn new(transport: TransportConfig, runner: R) -> Self {
        Self {
            transport,
            runner,
            lifecycle: Lifecycle::new(BackendKind::Static),
            nodes: Vec::new(),
        }
    }

    /// Strongly typed form of [`Testbed::setup`].
    ///
    /// # Errors
    ///
    /// Returns [`TestbedError::InvalidArguments`] when the list is empty,
    /// a host is incomplete, or names repeat, and
    /// [`TestbedError::InvalidState`] unless uninitialized.
    pub fn setup_hosts(&mut self, hosts: Vec<HostInfo>) -> Result<(), TestbedError> {
        self.lifecycle.require(TestbedState::Uninitialized, "set up")?;
        self.nodes = node_set::build(hosts, &self.transport, &self.runner)?;
        info!(nodes = self.nodes.len(), "static testbed ready");
        self.lifecycle.advance(TestbedState::Ready);
        Ok(())
    }
}

impl<R: CommandRunner + Clone + 'static> Testbed for StaticTestbed<R> {
    type Runner = R;

    fn setup(&mut self, args: SetupArgs) -> Result<(), TestbedError> {
        match args {
            SetupArgs::Hosts(hosts) => self.setup_hosts(hosts),
            other @ SetupArgs::Provision(_) => Err(TestbedError::InvalidArguments {
                expected: String::from("a list of hosts"),
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
        self.nodes.clear();
        self.lifecycle.advance(TestbedState::Destroyed);
        Ok(())
    }

    fn state(&self) -> TestbedState {
        self.lifecycle.state()
    }

    fn backend(&self) -> BackendKind {
        self.lifecycle.backend()
    }
}
