//! Test support utilities shared across unit and integration tests.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};

use crate::config::{TransportConfig, VagrantConfig};
use crate::transport::{CommandOutput, CommandRunner, TransportError};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Clones share the same queue and invocation log, so one runner can back
/// every node of a testbed.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Extra environment variables passed to the program.
    pub envs: Vec<(String, String)>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Returns the value passed for `key`, if any.
    #[must_use]
    pub fn env(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the final argument rendered as a string.
    #[must_use]
    pub fn last_arg(&self) -> Option<String> {
        self.args
            .last()
            .map(|arg| arg.to_string_lossy().into_owned())
    }
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        locked(&self.invocations).clone()
    }

    /// Number of responses not yet consumed.
    #[must_use]
    pub fn pending(&self) -> usize {
        locked(&self.responses).len()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        locked(&self.responses).push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        envs: &[(String, String)],
    ) -> Result<CommandOutput, TransportError> {
        locked(&self.invocations).push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
            envs: envs.to_vec(),
        });
        locked(&self.responses)
            .pop_front()
            .ok_or_else(|| TransportError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

const LOOPBACK_SSH: &str = r#"#!/bin/sh
# Loopback stand-in for ssh: runs the final argument with the local shell.
for last; do :; done
exec /bin/sh -c "$last"
"#;

const LOOPBACK_SCP: &str = r#"#!/bin/sh
# Loopback stand-in for scp: copies between the last two arguments locally.
src=""
dst=""
for arg; do src="$dst"; dst="$arg"; done
case "$src" in *@*:*) src="${src#*:}" ;; esac
case "$dst" in *@*:*) dst="${dst#*:}" ;; esac
exec cp "$src" "$dst"
"#;

const LOOPBACK_VAGRANT: &str = r#"#!/bin/sh
# Loopback stand-in for vagrant: reports LOOPBACK_VAGRANT_MACHINES machines,
# all reachable on 127.0.0.1 as the current user.
if [ -n "$LOOPBACK_VAGRANT_LOG" ]; then
    echo "vagrant $*" >> "$LOOPBACK_VAGRANT_LOG"
fi
count="${LOOPBACK_VAGRANT_MACHINES:-1}"
case "$1" in
    up|destroy) ;;
    status)
        i=1
        while [ "$i" -le "$count" ]; do
            echo "1,node$i,state,running"
            i=$((i + 1))
        done ;;
    ssh-config)
        user="$(whoami)"
        i=1
        while [ "$i" -le "$count" ]; do
            printf 'Host node%s\n  HostName 127.0.0.1\n  User %s\n  Port 22\n' "$i" "$user"
            i=$((i + 1))
        done ;;
    *)
        echo "unsupported vagrant command: $1" >&2
        exit 1 ;;
esac
"#;

/// Writes `ssh`/`scp` stand-ins into `dir` that execute locally, and returns
/// a transport configuration pointing at them.
///
/// Nodes built with this configuration and a
/// [`ProcessCommandRunner`](crate::transport::ProcessCommandRunner) behave
/// like nodes whose remote side is the local machine, which lets the
/// end-to-end properties run without an SSH daemon.
///
/// # Errors
///
/// Returns the I/O error raised while writing the scripts.
#[cfg(unix)]
pub fn install_loopback_transport(dir: &Utf8Path) -> std::io::Result<TransportConfig> {
    let ssh_bin = write_executable(dir, "ssh", LOOPBACK_SSH)?;
    let scp_bin = write_executable(dir, "scp", LOOPBACK_SCP)?;
    Ok(TransportConfig {
        ssh_bin: ssh_bin.into_string(),
        scp_bin: scp_bin.into_string(),
        ..TransportConfig::default()
    })
}

/// Writes a `vagrant` stand-in into `dir` and returns a configuration
/// pointing at it.
///
/// The stand-in reports `LOOPBACK_VAGRANT_MACHINES` machines (default one)
/// named `node1`, `node2`, ... on `127.0.0.1` as the current user, so it
/// pairs with [`install_loopback_transport`]. Each invocation is appended to
/// the file named by `LOOPBACK_VAGRANT_LOG` when that variable is set.
///
/// # Errors
///
/// Returns the I/O error raised while writing the script.
#[cfg(unix)]
pub fn install_loopback_vagrant(dir: &Utf8Path) -> std::io::Result<VagrantConfig> {
    let bin = write_executable(dir, "vagrant", LOOPBACK_VAGRANT)?;
    Ok(VagrantConfig {
        bin: bin.into_string(),
        ..VagrantConfig::default()
    })
}

#[cfg(unix)]
fn write_executable(dir: &Utf8Path, name: &str, contents: &str) -> std::io::Result<Utf8PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, contents)?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path)
}
