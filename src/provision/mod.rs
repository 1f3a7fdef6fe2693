//! Provisioning of ephemeral machines for the provisioned testbed.
//!
//! A [`Provisioner`] turns a [`ProvisionRequest`] into connection
//! descriptors and later destroys the machines behind them. The only
//! implementation shipped here drives the `vagrant` CLI.

mod vagrant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node::{EnvAssignment, HostInfo};
use crate::transport::TransportError;

pub use vagrant::VagrantProvisioner;

/// Parameters for creating a set of machines.
///
/// Consumed by setup and not retained; teardown works from the hosts the
/// provisioner returned.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ProvisionRequest {
    /// Number of machines required. Must be positive.
    pub count: usize,
    /// Assignments handed to the provisioning tool and exported on every
    /// node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvAssignment>,
    /// Reuse already running machines instead of creating new ones when
    /// enough of them exist.
    #[serde(default)]
    pub reuse_existing: bool,
}

impl ProvisionRequest {
    /// Requests `count` fresh machines with no extra environment.
    #[must_use]
    pub const fn new(count: usize) -> Self {
        Self {
            count,
            env: Vec::new(),
            reuse_existing: false,
        }
    }

    /// Appends environment assignments.
    #[must_use]
    pub fn with_env(mut self, env: impl IntoIterator<Item = EnvAssignment>) -> Self {
        self.env.extend(env);
        self
    }

    /// Sets whether running machines may be reused.
    #[must_use]
    pub const fn with_reuse_existing(mut self, reuse_existing: bool) -> Self {
        self.reuse_existing = reuse_existing;
        self
    }
}

/// Errors raised by provisioning adapters.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Raised when the provisioning tool exits non-zero.
    #[error("{program} {action} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Program that failed (typically `vagrant`).
        program: String,
        /// Subcommand that was running.
        action: String,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the command.
        stderr: String,
    },
    /// Raised when tool output cannot be interpreted.
    #[error("failed to parse {source_name} output: {message}")]
    Parse {
        /// Output being parsed (for example `ssh-config`).
        source_name: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when a machine is reported without a required connection
    /// field.
    #[error("machine '{host}' is missing {field}")]
    MissingField {
        /// Machine name as reported by the tool.
        host: String,
        /// Field that was absent.
        field: String,
    },
    /// Raised when fewer machines are reported than were requested.
    #[error("requested {requested} machines but only {available} are available")]
    InsufficientNodes {
        /// Requested machine count.
        requested: usize,
        /// Machines actually reported.
        available: usize,
    },
    /// Raised when provisioned machines cannot form a usable node set.
    #[error("provisioned hosts are unusable: {message}")]
    InvalidHosts {
        /// Validation failure, with any teardown failure appended.
        message: String,
    },
    /// Raised when machines left behind by a failed provisioning attempt
    /// could not be destroyed either.
    #[error("{error} (teardown also failed: {cleanup})")]
    CleanupFailed {
        /// Failure that aborted provisioning.
        error: Box<ProvisionError>,
        /// Failure of the cleanup attempt.
        cleanup: Box<ProvisionError>,
    },
    /// Raised when the tool cannot be spawned.
    #[error(transparent)]
    Runner(#[from] TransportError),
}

/// Creates and destroys machines for a provisioned testbed.
pub trait Provisioner {
    /// Brings up the requested machines and returns one descriptor per
    /// node, carrying the request's environment assignments.
    ///
    /// Machines created by a call that then fails are destroyed before the
    /// error is returned; the caller has nothing to clean up.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the tool fails, its output cannot be
    /// parsed, or too few machines are available.
    fn provision(&self, request: &ProvisionRequest) -> Result<Vec<HostInfo>, ProvisionError>;

    /// Destroys the machines behind `hosts`. Not retried.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the tool fails.
    fn destroy(&self, hosts: &[HostInfo]) -> Result<(), ProvisionError>;
}
