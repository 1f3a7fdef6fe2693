//! A single remote machine reachable over SSH.
//!
//! Each operation spawns a fresh `ssh` or `scp` process, so a node never
//! holds a long-lived connection and concurrent workers never share one.
//! Nothing is retried; every call reports its single attempt.

mod host;

use camino::Utf8Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::TransportConfig;
use crate::transport::{CommandOutput, CommandRunner, ssh};

pub use host::{DEFAULT_SSH_PORT, EnvAssignment, EnvAssignmentError, HostInfo, HostInfoError};

/// Errors raised by node operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum NodeError {
    /// The remote command exited non-zero, died by signal, or the transport
    /// could not deliver it.
    #[error("command `{command}` failed on node {node}: {reason}")]
    Execution {
        /// Node the command ran on.
        node: String,
        /// Command as supplied by the caller.
        command: String,
        /// Exit status or transport failure description.
        reason: String,
        /// Combined stdout and stderr captured before the failure.
        output: String,
    },
    /// A file copy failed in either direction.
    #[error("transfer {from} -> {to} failed on node {node}: {reason}")]
    Transfer {
        /// Node involved in the copy.
        node: String,
        /// Source path (remote paths are rendered as `user@host:path`).
        from: String,
        /// Destination path.
        to: String,
        /// Exit status, stderr, or transport failure description.
        reason: String,
    },
}

impl NodeError {
    /// Name of the node the error originated from.
    #[must_use]
    pub fn node(&self) -> &str {
        match self {
            Self::Execution { node, .. } | Self::Transfer { node, .. } => node,
        }
    }

    /// Output captured from a failed command, if any.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Execution { output, .. } => Some(output),
            Self::Transfer { .. } => None,
        }
    }
}

/// One remote machine and the transport settings used to reach it.
///
/// The descriptor and transport settings are fixed at construction.
#[derive(Clone, Debug)]
pub struct Node<R: CommandRunner> {
    host: HostInfo,
    transport: TransportConfig,
    runner: R,
}

impl<R: CommandRunner> Node<R> {
    /// Creates a node. Testbeds validate descriptors before calling this.
    #[must_use]
    pub const fn new(host: HostInfo, transport: TransportConfig, runner: R) -> Self {
        Self {
            host,
            transport,
            runner,
        }
    }

    /// Identity of the node, used to disambiguate per-node artifacts.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.host.name
    }

    /// Connection descriptor of the node.
    #[must_use]
    pub const fn host(&self) -> &HostInfo {
        &self.host
    }

    /// Runs `command` and reports only whether it succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Execution`] when the command exits non-zero or
    /// the transport fails.
    pub fn run_command(&self, command: &str) -> Result<(), NodeError> {
        self.run_command_with_output(command).map(|_| ())
    }

    /// Runs `command` and returns its stdout followed by its stderr.
    ///
    /// On failure the captured output travels inside the error; see
    /// [`NodeError::output`].
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Execution`] when the command exits non-zero or
    /// the transport fails.
    pub fn run_command_with_output(&self, command: &str) -> Result<String, NodeError> {
        debug!(node = %self.host.name, command, "running remote command");
        let wrapped = ssh::wrap_with_env(&self.host.env, command);
        let args = ssh::ssh_args(&self.transport, &self.host, &wrapped);
        let output = self
            .runner
            .run(&self.transport.ssh_bin, &args)
            .map_err(|err| self.execution_error(command, err.to_string(), String::new()))?;

        if output.is_success() {
            return Ok(output.combined());
        }

        let reason = format!(
            "{} exited with status {}",
            self.transport.ssh_bin,
            output.status_text()
        );
        warn!(node = %self.host.name, command, %reason, "remote command failed");
        Err(self.execution_error(command, reason, output.combined()))
    }

    /// Copies `remote_path` on the node to `local_path`, creating or
    /// overwriting the local file.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Transfer`] when the remote file is unreadable,
    /// the transport fails, or the local path cannot be written.
    pub fn scp_from_remote_to_local(
        &self,
        remote_path: &str,
        local_path: impl AsRef<Utf8Path>,
    ) -> Result<(), NodeError> {
        let from = ssh::remote_target(&self.host, remote_path);
        let to = ssh::local_target(local_path.as_ref());
        self.transfer(&from, &to)
    }

    /// Copies `local_path` to `remote_path` on the node, creating or
    /// overwriting the remote file.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Transfer`] when the local file is unreadable,
    /// the transport fails, or the remote path cannot be written.
    pub fn scp_from_local_to_remote(
        &self,
        local_path: impl AsRef<Utf8Path>,
        remote_path: &str,
    ) -> Result<(), NodeError> {
        let local = local_path.as_ref();
        let to = ssh::remote_target(&self.host, remote_path);
        if !local.is_file() {
            return Err(self.transfer_error(
                local.as_str(),
                &to,
                String::from("local file does not exist or is not a regular file"),
            ));
        }
        self.transfer(&ssh::local_target(local), &to)
    }

    fn transfer(&self, from: &str, to: &str) -> Result<(), NodeError> {
        debug!(node = %self.host.name, from, to, "copying file");
        let args = ssh::scp_args(&self.transport, &self.host, from, to);
        let output = self
            .runner
            .run(&self.transport.scp_bin, &args)
            .map_err(|err| self.transfer_error(from, to, err.to_string()))?;

        if output.is_success() {
            return Ok(());
        }

        let reason = self.transfer_failure_reason(&output);
        warn!(node = %self.host.name, from, to, %reason, "file transfer failed");
        Err(self.transfer_error(from, to, reason))
    }

    fn transfer_failure_reason(&self, output: &CommandOutput) -> String {
        let stderr = output.stderr.trim();
        if stderr.is_empty() {
            format!(
                "{} exited with status {}",
                self.transport.scp_bin,
                output.status_text()
            )
        } else {
            format!(
                "{} exited with status {}: {stderr}",
                self.transport.scp_bin,
                output.status_text()
            )
        }
    }

    fn execution_error(&self, command: &str, reason: String, output: String) -> NodeError {
        NodeError::Execution {
            node: self.host.name.clone(),
            command: command.to_owned(),
            reason,
            output,
        }
    }

    fn transfer_error(&self, from: &str, to: &str, reason: String) -> NodeError {
        NodeError::Transfer {
            node: self.host.name.clone(),
            from: from.to_owned(),
            to: to.to_owned(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests;
