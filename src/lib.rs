//! Multi-node SSH testbeds for integration tests.
//!
//! A [`Testbed`] owns a set of [`Node`]s reachable over SSH, either
//! pre-existing hosts ([`StaticTestbed`]) or machines created by a
//! [`Provisioner`] such as [`VagrantProvisioner`] ([`ProvisionedTestbed`]).
//! Nodes run shell commands and copy files through the system `ssh` and
//! `scp` clients, and [`iterate_nodes`] fans one operation out across every
//! node concurrently, reporting every failing node at once.

pub mod config;
pub mod hosts_file;
pub mod iterate;
pub mod logging;
pub mod node;
pub mod provision;
pub mod test_support;
pub mod testbed;
pub mod transport;
pub mod util;

pub use config::{ConfigError, TransportConfig, VagrantConfig};
pub use hosts_file::{HostsFileError, load_hosts};
pub use iterate::{IterationError, NodeFailure, iterate_nodes};
pub use node::{EnvAssignment, EnvAssignmentError, HostInfo, HostInfoError, Node, NodeError};
pub use provision::{ProvisionError, ProvisionRequest, Provisioner, VagrantProvisioner};
pub use testbed::{
    BackendKind, ProvisionedTestbed, SetupArgs, StaticTestbed, Testbed, TestbedError,
    TestbedState,
};
pub use transport::{CommandOutput, CommandRunner, ProcessCommandRunner, TransportError};
