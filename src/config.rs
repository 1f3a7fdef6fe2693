//! Configuration loading via `ortho-config`.
//!
//! Two layers are exposed: [`TransportConfig`] controls how the `ssh` and
//! `scp` clients are invoked for every node, and [`VagrantConfig`] controls
//! how the provisioning adapter drives the `vagrant` CLI. Both merge
//! defaults, configuration files, and environment variables.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default connect timeout handed to `ssh`/`scp`, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default environment variable through which the node count reaches the
/// Vagrantfile.
pub const DEFAULT_NODE_COUNT_ENV: &str = "SSHBED_NODES";

/// Remote-shell transport settings shared by every node of a testbed.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SSHBED",
    discovery(
        app_name = "sshbed",
        env_var = "SSHBED_CONFIG_PATH",
        config_file_name = "sshbed.toml",
        dotfile_name = ".sshbed.toml",
        project_file_name = "sshbed.toml"
    )
)]
pub struct TransportConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `scp` executable.
    #[ortho_config(default = "scp".to_owned())]
    pub scp_bin: String,
    /// Whether to force batch mode to avoid password prompts.
    #[ortho_config(default = true)]
    pub ssh_batch_mode: bool,
    /// Whether to enforce host key checking; defaults to disabling it since
    /// testbed hosts are frequently recreated.
    #[ortho_config(default = false)]
    pub ssh_strict_host_key_checking: bool,
    /// Known hosts file override. An empty value leaves the client default.
    #[ortho_config(default = "/dev/null".to_owned())]
    pub ssh_known_hosts_file: String,
    /// Seconds allowed for establishing each connection. Zero disables the
    /// option and falls back to the client default.
    #[ortho_config(default = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ssh_bin: String::from("ssh"),
            scp_bin: String::from("scp"),
            ssh_batch_mode: true,
            ssh_strict_host_key_checking: false,
            ssh_known_hosts_file: String::from("/dev/null"),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl TransportConfig {
    /// Loads configuration from defaults, configuration files, and
    /// environment variables without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("sshbed")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Ensures the client binaries are configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a binary path is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(&self.ssh_bin, "ssh_bin", "SSHBED_SSH_BIN")?;
        require_field(&self.scp_bin, "scp_bin", "SSHBED_SCP_BIN")?;
        Ok(())
    }
}

/// Settings for the Vagrant provisioning adapter.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "SSHBED_VAGRANT")]
pub struct VagrantConfig {
    /// Path to the `vagrant` executable.
    #[ortho_config(default = "vagrant".to_owned())]
    pub bin: String,
    /// Directory holding the Vagrantfile. When unset, `vagrant` searches
    /// from the current working directory.
    pub cwd: Option<String>,
    /// Environment variable used to hand the requested node count to the
    /// Vagrantfile.
    #[ortho_config(default = DEFAULT_NODE_COUNT_ENV.to_owned())]
    pub node_count_env: String,
}

impl Default for VagrantConfig {
    fn default() -> Self {
        Self {
            bin: String::from("vagrant"),
            cwd: None,
            node_count_env: String::from(DEFAULT_NODE_COUNT_ENV),
        }
    }
}

impl VagrantConfig {
    /// Loads configuration from defaults, configuration files, and
    /// environment variables without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("sshbed")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(&self.bin, "bin", "SSHBED_VAGRANT_BIN")?;
        require_field(
            &self.node_count_env,
            "node_count_env",
            "SSHBED_VAGRANT_NODE_COUNT_ENV",
        )?;
        if let Some(cwd) = self.cwd.as_deref() {
            require_field(cwd, "cwd", "SSHBED_VAGRANT_CWD")?;
        }
        Ok(())
    }
}

fn require_field(value: &str, field: &str, env_var: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(format!(
            "{field}: set {env_var} or add {field} to sshbed.toml"
        )));
    }
    Ok(())
}

/// Errors raised during configuration loading and validation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
