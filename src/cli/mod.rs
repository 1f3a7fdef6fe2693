//! Command-line interface definitions for the `sshbed` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `sshbed` binary.
#[derive(Debug, Parser)]
#[command(
    name = "sshbed",
    about = "Run a shell command on every node of an SSH testbed at once",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Run a command on every host listed in a hosts file.
    #[command(name = "exec", about = "Run a command on every host in a hosts file")]
    Exec(ExecCommand),
    /// Bring up Vagrant machines and run a command on each of them.
    #[command(
        name = "vagrant",
        about = "Bring up Vagrant machines and run a command on each of them"
    )]
    Vagrant(VagrantCommand),
}

/// Arguments for the `sshbed exec` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ExecCommand {
    /// JSON file listing the hosts (an array of objects with `name`,
    /// `address`, `user`, and optional `port`, `identity_file`, `env`).
    #[arg(long, value_name = "FILE")]
    pub(crate) hosts: String,
    /// Export `KEY=VALUE` on every node before running the command. May be
    /// repeated.
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub(crate) env: Vec<String>,
    /// Override the `ssh` executable for this run.
    #[arg(long, value_name = "BIN")]
    pub(crate) ssh_bin: Option<String>,
    /// Command to execute on each node (use -- to separate flags).
    #[arg(required = true, trailing_var_arg = true)]
    pub(crate) command: Vec<String>,
}

/// Arguments for the `sshbed vagrant` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct VagrantCommand {
    /// Number of machines to bring up.
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub(crate) count: usize,
    /// Pass `KEY=VALUE` to `vagrant up` and export it on every node. May be
    /// repeated.
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub(crate) env: Vec<String>,
    /// Reuse running machines when enough of them exist.
    #[arg(long)]
    pub(crate) reuse: bool,
    /// Leave the machines running after the command finishes.
    #[arg(long)]
    pub(crate) keep: bool,
    /// Command to execute on each node (use -- to separate flags).
    #[arg(required = true, trailing_var_arg = true)]
    pub(crate) command: Vec<String>,
}
