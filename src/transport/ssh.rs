//! Argument builders for the `ssh` and `scp` clients.
//!
//! Both clients share the same option set; only the port flag differs
//! (`-p` for `ssh`, `-P` for `scp`).

use std::ffi::OsString;

use camino::Utf8Path;
use shell_escape::unix::escape;

use crate::config::TransportConfig;
use crate::node::{EnvAssignment, HostInfo};
use crate::util::expand_tilde;

/// Builds the argument vector executing `remote_command` on `host`.
pub(crate) fn ssh_args(
    config: &TransportConfig,
    host: &HostInfo,
    remote_command: &str,
) -> Vec<OsString> {
    let mut args = common_options(config, host, "-p");
    args.push(OsString::from(format!("{}@{}", host.user, host.address)));
    args.push(OsString::from(remote_command));
    args
}

/// Builds the argument vector copying `from` to `to`; either side may be a
/// remote target produced by [`remote_target`].
pub(crate) fn scp_args(
    config: &TransportConfig,
    host: &HostInfo,
    from: &str,
    to: &str,
) -> Vec<OsString> {
    let mut args = common_options(config, host, "-P");
    args.push(OsString::from(from));
    args.push(OsString::from(to));
    args
}

/// Renders `user@host:path`, bracketing IPv6 literals as `scp` requires.
pub(crate) fn remote_target(host: &HostInfo, path: &str) -> String {
    if host.address.contains(':') && !host.address.starts_with('[') {
        format!("{}@[{}]:{path}", host.user, host.address)
    } else {
        format!("{}@{}:{path}", host.user, host.address)
    }
}

/// Renders a local path so `scp` cannot read it as `host:path`.
///
/// `scp` treats any argument with a `:` before its first `/` as remote, so
/// such relative paths are anchored with `./`.
pub(crate) fn local_target(path: &Utf8Path) -> String {
    let text = path.as_str();
    let colon_before_slash = text
        .find(':')
        .is_some_and(|colon| text.find('/').is_none_or(|slash| colon < slash));
    if colon_before_slash {
        format!("./{text}")
    } else {
        text.to_owned()
    }
}

/// Prefixes `command` with `export` statements for the host environment.
pub(crate) fn wrap_with_env(env: &[EnvAssignment], command: &str) -> String {
    if env.is_empty() {
        return command.to_owned();
    }

    let mut wrapped = String::new();
    for assignment in env {
        let escaped_value = escape(assignment.value().into());
        wrapped.push_str("export ");
        wrapped.push_str(assignment.key());
        wrapped.push('=');
        wrapped.push_str(escaped_value.as_ref());
        wrapped.push_str("; ");
    }
    wrapped.push_str(command);
    wrapped
}

fn common_options(config: &TransportConfig, host: &HostInfo, port_flag: &str) -> Vec<OsString> {
    let mut args = vec![OsString::from(port_flag), OsString::from(host.port.to_string())];

    if let Some(ref identity_file) = host.identity_file {
        args.push(OsString::from("-i"));
        args.push(OsString::from(expand_tilde(identity_file)));
    }

    if config.ssh_batch_mode {
        args.push(OsString::from("-o"));
        args.push(OsString::from("BatchMode=yes"));
    }

    if !config.ssh_strict_host_key_checking {
        args.push(OsString::from("-o"));
        args.push(OsString::from("StrictHostKeyChecking=no"));
        // Keeps "Permanently added" warnings out of captured output.
        args.push(OsString::from("-o"));
        args.push(OsString::from("LogLevel=ERROR"));
    }

    if !config.ssh_known_hosts_file.trim().is_empty() {
        args.push(OsString::from("-o"));
        args.push(OsString::from(format!(
            "UserKnownHostsFile={}",
            config.ssh_known_hosts_file
        )));
    }

    if config.connect_timeout_secs > 0 {
        args.push(OsString::from("-o"));
        args.push(OsString::from(format!(
            "ConnectTimeout={}",
            config.connect_timeout_secs
        )));
    }

    args
}
