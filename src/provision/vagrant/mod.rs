//! Vagrant-backed provisioner.
//!
//! Shells out to the `vagrant` CLI: `status --machine-readable` to find
//! reusable machines, `up` to create them, `ssh-config` to learn how to
//! reach them, and `destroy -f` to remove them. The node count reaches the
//! Vagrantfile through an environment variable.
//!
//! Machines brought up by a failed `provision` call are destroyed before it
//! returns; reused machines are left alone.

mod ssh_config;
mod status;

use std::ffi::OsString;

use tracing::{debug, info, warn};

use super::{ProvisionError, ProvisionRequest, Provisioner};
use crate::config::VagrantConfig;
use crate::node::HostInfo;
use crate::transport::{CommandOutput, CommandRunner, ProcessCommandRunner};

use ssh_config::SshConfigEntry;

/// Environment variable `vagrant` reads to locate the Vagrantfile.
const VAGRANT_CWD_ENV: &str = "VAGRANT_CWD";

/// Creates and destroys machines by driving the `vagrant` CLI.
#[derive(Clone, Debug)]
pub struct VagrantProvisioner<R: CommandRunner = ProcessCommandRunner> {
    config: VagrantConfig,
    runner: R,
}

impl VagrantProvisioner<ProcessCommandRunner> {
    /// Creates a provisioner wired to the real process runner.
    #[must_use]
    pub const fn with_process_runner(config: VagrantConfig) -> Self {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> VagrantProvisioner<R> {
    /// Creates a provisioner using the provided configuration and runner.
    #[must_use]
    pub const fn new(config: VagrantConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Returns the configuration in use.
    #[must_use]
    pub const fn config(&self) -> &VagrantConfig {
        &self.config
    }

    fn base_env(&self) -> Vec<(String, String)> {
        self.config
            .cwd
            .iter()
            .map(|cwd| (String::from(VAGRANT_CWD_ENV), cwd.clone()))
            .collect()
    }

    fn run_vagrant(
        &self,
        action: &str,
        args: &[OsString],
        envs: &[(String, String)],
    ) -> Result<CommandOutput, ProvisionError> {
        debug!(program = %self.config.bin, action, "running provisioning tool");
        let output = self.runner.run_with_env(&self.config.bin, args, envs)?;
        if output.is_success() {
            return Ok(output);
        }
        Err(ProvisionError::CommandFailure {
            program: self.config.bin.clone(),
            action: action.to_owned(),
            status_text: output.status_text(),
            stderr: output.stderr.trim().to_owned(),
        })
    }

    fn running_machines(&self) -> Result<Vec<String>, ProvisionError> {
        let args = [OsString::from("status"), OsString::from("--machine-readable")];
        let output = self.run_vagrant("status", &args, &self.base_env())?;
        status::running_machines(&output.stdout)
    }

    fn up(&self, request: &ProvisionRequest) -> Result<(), ProvisionError> {
        let mut envs = self.base_env();
        envs.push((self.config.node_count_env.clone(), request.count.to_string()));
        envs.extend(request.env.iter().map(|assignment| assignment.to_pair()));
        info!(count = request.count, "bringing up vagrant machines");
        self.run_vagrant("up", &[OsString::from("up")], &envs)?;
        Ok(())
    }

    fn ssh_config(&self, machines: &[String]) -> Result<Vec<SshConfigEntry>, ProvisionError> {
        let mut args = vec![OsString::from("ssh-config")];
        args.extend(machines.iter().map(OsString::from));
        let output = self.run_vagrant("ssh-config", &args, &self.base_env())?;
        ssh_config::parse(&output.stdout)
    }

    /// Reads connection details for `machines` (all machines when empty)
    /// and keeps the first `request.count` in name order.
    fn describe(
        &self,
        request: &ProvisionRequest,
        machines: &[String],
    ) -> Result<Vec<HostInfo>, ProvisionError> {
        let mut entries = self.ssh_config(machines)?;
        if entries.len() < request.count {
            return Err(ProvisionError::InsufficientNodes {
                requested: request.count,
                available: entries.len(),
            });
        }
        entries.sort_by(|left, right| left.name.cmp(&right.name));
        entries.truncate(request.count);

        Ok(entries
            .into_iter()
            .map(|entry| HostInfo {
                identity_file: entry.identity_file,
                ..HostInfo::new(entry.name, entry.hostname, entry.user)
                    .with_port(entry.port)
                    .with_env(request.env.iter().cloned())
            })
            .collect())
    }

    /// Destroys every machine of the Vagrantfile after `up` succeeded but
    /// the machines could not be described.
    fn destroy_after_failed_setup(&self, err: ProvisionError) -> ProvisionError {
        warn!(error = %err, "machines were brought up but are unusable; destroying them");
        let args = [OsString::from("destroy"), OsString::from("-f")];
        match self.run_vagrant("destroy", &args, &self.base_env()) {
            Ok(_) => err,
            Err(cleanup) => ProvisionError::CleanupFailed {
                error: Box::new(err),
                cleanup: Box::new(cleanup),
            },
        }
    }

    /// Finds enough running machines to satisfy the request, if reuse is
    /// allowed.
    fn reusable_machines(
        &self,
        request: &ProvisionRequest,
    ) -> Result<Option<Vec<String>>, ProvisionError> {
        if !request.reuse_existing {
            return Ok(None);
        }
        let running = self.running_machines()?;
        if running.len() >= request.count {
            info!(running = running.len(), "reusing running vagrant machines");
            return Ok(Some(running));
        }
        debug!(
            running = running.len(),
            requested = request.count,
            "not enough running machines to reuse"
        );
        Ok(None)
    }
}

impl<R: CommandRunner> Provisioner for VagrantProvisioner<R> {
    fn provision(&self, request: &ProvisionRequest) -> Result<Vec<HostInfo>, ProvisionError> {
        if let Some(machines) = self.reusable_machines(request)? {
            return self.describe(request, &machines);
        }
        self.up(request)?;
        self.describe(request, &[])
            .map_err(|err| self.destroy_after_failed_setup(err))
    }

    fn destroy(&self, hosts: &[HostInfo]) -> Result<(), ProvisionError> {
        if hosts.is_empty() {
            return Ok(());
        }
        let mut args = vec![OsString::from("destroy"), OsString::from("-f")];
        args.extend(hosts.iter().map(|host| OsString::from(&host.name)));
        info!(machines = hosts.len(), "destroying vagrant machines");
        self.run_vagrant("destroy", &args, &self.base_env())?;
        Ok(())
    }
}
