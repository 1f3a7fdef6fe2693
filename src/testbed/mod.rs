//! Backend-agnostic testbeds.
//!
//! A [`Testbed`] owns a validated, name-ordered set of nodes and a
//! lifecycle (`Uninitialized -> Ready -> Destroyed`). Two variants exist:
//! [`StaticTestbed`] wraps pre-existing hosts and [`ProvisionedTestbed`]
//! creates its machines through a [`Provisioner`](crate::provision::Provisioner).
//! Callers that only use the trait cannot tell them apart; the backend
//! matters only at teardown.

mod lifecycle;
mod node_set;
mod provisioned;
mod static_pool;

use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::iterate::{self, IterationError};
use crate::node::{HostInfo, Node};
use crate::provision::{ProvisionError, ProvisionRequest};
use crate::transport::CommandRunner;

pub use lifecycle::TestbedState;
pub use provisioned::ProvisionedTestbed;
pub use static_pool::StaticTestbed;

/// Which kind of backend supplies a testbed's nodes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BackendKind {
    /// Pre-existing hosts; teardown releases nothing.
    Static,
    /// Machines created on setup and destroyed on teardown.
    Provisioned,
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Static => "static",
            Self::Provisioned => "provisioned",
        })
    }
}

/// Arguments accepted by [`Testbed::setup`].
///
/// Each variant accepts exactly one shape. The enum deserialises from
/// configuration as `{"backend": "hosts", "args": [...]}` or
/// `{"backend": "provision", "args": {"count": 3}}`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "backend", content = "args", rename_all = "snake_case")]
pub enum SetupArgs {
    /// Connection descriptors of pre-existing hosts.
    Hosts(Vec<HostInfo>),
    /// Parameters for provisioning new machines.
    Provision(ProvisionRequest),
}

impl SetupArgs {
    /// Short description of the argument shape, used in error messages.
    #[must_use]
    pub fn shape(&self) -> String {
        match self {
            Self::Hosts(hosts) => format!("a list of {} hosts", hosts.len()),
            Self::Provision(request) => format!(
                "a provisioning request (count {}, {} env assignments, reuse {})",
                request.count,
                request.env.len(),
                request.reuse_existing
            ),
        }
    }
}

/// Errors raised by testbed operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TestbedError {
    /// Setup received arguments of the wrong shape or failing validation.
    /// Raised before any side effect.
    #[error("unexpected arguments to setup (expected: {expected}; received: {received})")]
    InvalidArguments {
        /// Shape the variant accepts.
        expected: String,
        /// What was actually supplied.
        received: String,
    },
    /// The operation is not valid in the current lifecycle state.
    #[error("cannot {operation} a testbed that is {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State at the time of the attempt.
        state: TestbedState,
    },
    /// The provisioning tool failed during setup or teardown.
    #[error(transparent)]
    Provisioning(#[from] ProvisionError),
    /// A concurrent operation failed on one or more nodes.
    #[error(transparent)]
    Iteration(#[from] IterationError),
}

/// A set of nodes with a lifecycle, independent of where the nodes come
/// from.
pub trait Testbed {
    /// Runner used by every node of the testbed.
    type Runner: CommandRunner + 'static;

    /// Builds the node set from variant-specific arguments.
    ///
    /// # Errors
    ///
    /// Returns [`TestbedError::InvalidArguments`] for a foreign or invalid
    /// shape, [`TestbedError::InvalidState`] unless uninitialized, and
    /// [`TestbedError::Provisioning`] when machines cannot be created.
    fn setup(&mut self, args: SetupArgs) -> Result<(), TestbedError>;

    /// Nodes in name order. Stable until teardown.
    ///
    /// # Errors
    ///
    /// Returns [`TestbedError::InvalidState`] unless the testbed is ready.
    fn nodes(&self) -> Result<&[Arc<Node<Self::Runner>>], TestbedError>;

    /// Releases the testbed. The testbed ends up destroyed even when this
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns [`TestbedError::InvalidState`] on a destroyed testbed and
    /// [`TestbedError::Provisioning`] when machines cannot be destroyed.
    fn teardown(&mut self) -> Result<(), TestbedError>;

    /// Current lifecycle state.
    fn state(&self) -> TestbedState;

    /// Backend supplying the nodes.
    fn backend(&self) -> BackendKind;

    /// Applies `operation` to every node concurrently; see
    /// [`iterate::iterate_nodes`].
    ///
    /// # Errors
    ///
    /// Returns [`TestbedError::InvalidState`] unless the testbed is ready
    /// and [`TestbedError::Iteration`] when any node fails.
    fn iterate_nodes<F, E>(
        &self,
        operation: F,
    ) -> impl Future<Output = Result<(), TestbedError>> + Send
    where
        F: Fn(&Node<Self::Runner>) -> Result<(), E> + Send + Sync + 'static,
        E: Display + Send + 'static,
    {
        let snapshot = self.nodes().map(<[_]>::to_vec);
        async move {
            let nodes = snapshot?;
            iterate::iterate_nodes(&nodes, operation).await?;
            Ok(())
        }
    }
}
