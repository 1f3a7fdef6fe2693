//! Binary entry point for the sshbed CLI.

mod cli;

use std::io::{self, Write};
use std::process;
use std::sync::mpsc;

use clap::Parser;
use shell_escape::unix::escape;
use thiserror::Error;
use tracing::info;

use sshbed::logging::init_tracing;
use sshbed::{
    ConfigError, EnvAssignment, EnvAssignmentError, HostsFileError, ProvisionRequest,
    ProvisionedTestbed, SetupArgs, StaticTestbed, Testbed, TestbedError, TransportConfig,
    VagrantConfig, VagrantProvisioner, load_hosts,
};

use cli::{Cli, ExecCommand, VagrantCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Hosts(#[from] HostsFileError),
    #[error(transparent)]
    Env(#[from] EnvAssignmentError),
    #[error("invalid command argument: {0}")]
    InvalidCommand(String),
    #[error(transparent)]
    Testbed(#[from] TestbedError),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Exec(command) => exec_static(command).await,
        Cli::Vagrant(command) => exec_vagrant(&command).await,
    }
}

async fn exec_static(args: ExecCommand) -> Result<(), CliError> {
    validate_command_args(&args.command)?;
    let env = parse_env_assignments(&args.env)?;

    let mut transport = TransportConfig::load_without_cli_args()?;
    if let Some(ssh_bin) = args.ssh_bin {
        transport.ssh_bin = ssh_bin;
    }
    transport.validate()?;

    let hosts = load_hosts(&args.hosts)?
        .into_iter()
        .map(|host| host.with_env(env.iter().cloned()))
        .collect();

    let mut testbed = StaticTestbed::with_process_runner(transport);
    testbed.setup(SetupArgs::Hosts(hosts))?;
    let outcome = run_everywhere(&testbed, render_remote_command(&args.command)).await;
    let released = testbed.teardown();
    settle(outcome, released)
}

async fn exec_vagrant(args: &VagrantCommand) -> Result<(), CliError> {
    validate_command_args(&args.command)?;
    let env = parse_env_assignments(&args.env)?;

    let transport = TransportConfig::load_without_cli_args()?;
    transport.validate()?;
    let vagrant = VagrantConfig::load_without_cli_args()?;
    vagrant.validate()?;

    let request = ProvisionRequest::new(args.count)
        .with_env(env)
        .with_reuse_existing(args.reuse);
    let provisioner = VagrantProvisioner::with_process_runner(vagrant);
    let mut testbed = ProvisionedTestbed::with_process_runner(provisioner, transport);
    testbed.setup(SetupArgs::Provision(request))?;

    let outcome = run_everywhere(&testbed, render_remote_command(&args.command)).await;
    let released = if args.keep {
        info!("leaving vagrant machines running");
        Ok(())
    } else {
        testbed.teardown()
    };
    settle(outcome, released)
}

/// Runs `remote_command` on every node and prints each node's output,
/// prefixed with its name, in node order.
async fn run_everywhere<T: Testbed>(
    testbed: &T,
    remote_command: String,
) -> Result<(), TestbedError> {
    let (sender, receiver) = mpsc::channel();
    let outcome = testbed
        .iterate_nodes(move |node| {
            let result = node.run_command_with_output(&remote_command);
            let output = result.as_ref().map_or_else(
                |err| err.output().unwrap_or_default().to_owned(),
                Clone::clone,
            );
            sender.send((node.name().to_owned(), output)).ok();
            result.map(|_| ())
        })
        .await;

    let mut outputs: Vec<(String, String)> = receiver.try_iter().collect();
    outputs.sort_by(|left, right| left.0.cmp(&right.0));
    let mut stdout = io::stdout().lock();
    for (name, output) in &outputs {
        stdout.write_all(prefix_lines(name, output).as_bytes()).ok();
    }
    outcome
}

fn prefix_lines(name: &str, output: &str) -> String {
    output
        .lines()
        .map(|line| format!("[{name}] {line}\n"))
        .collect()
}

/// Combines the command outcome with the teardown outcome, reporting a
/// teardown failure separately when both failed.
fn settle(
    outcome: Result<(), TestbedError>,
    released: Result<(), TestbedError>,
) -> Result<(), CliError> {
    match (outcome, released) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err.into()),
        (Err(err), Err(teardown)) => {
            report_error(&CliError::Testbed(teardown));
            Err(err.into())
        }
    }
}

fn parse_env_assignments(raw: &[String]) -> Result<Vec<EnvAssignment>, EnvAssignmentError> {
    raw.iter().map(|text| text.parse()).collect()
}

fn render_remote_command(args: &[String]) -> String {
    let mut result = String::new();
    let mut first = true;

    for arg in args {
        if first {
            first = false;
        } else {
            result.push(' ');
        }

        let escaped = escape(arg.as_str().into());
        result.push_str(escaped.as_ref());
    }

    result
}

fn validate_command_args(args: &[String]) -> Result<(), CliError> {
    for arg in args {
        if arg
            .chars()
            .any(|ch| matches!(ch, '\n' | '\r' | '\u{0000}'..='\u{001F}' | '\u{007F}'))
        {
            return Err(CliError::InvalidCommand(String::from(concat!(
                "command arguments must not contain control characters (ASCII ",
                "0x00-0x1F or 0x7F, e.g. newline, carriage return, tab, NUL)"
            ))));
        }
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use sshbed::TestbedState;

    #[rstest]
    fn validate_command_args_rejects_control_characters() {
        let err = validate_command_args(&[String::from("echo\tbad")])
            .expect_err("tab should be rejected");

        assert!(
            matches!(err, CliError::InvalidCommand(ref message) if message.contains("control characters")),
            "unexpected error: {err}"
        );
    }

    #[rstest]
    fn validate_command_args_accepts_safe_arguments() {
        assert!(validate_command_args(&[String::from("echo"), String::from("ok")]).is_ok());
    }

    #[rstest]
    fn render_remote_command_escapes_arguments() {
        let args = vec![
            String::from("echo"),
            String::from("a b"),
            String::from("c'd"),
        ];
        let rendered = render_remote_command(&args);

        assert_eq!(rendered, "echo 'a b' 'c'\\''d'");
    }

    #[rstest]
    #[case("node1", "a\nb\n", "[node1] a\n[node1] b\n")]
    #[case("node2", "no newline", "[node2] no newline\n")]
    #[case("node3", "", "")]
    fn prefix_lines_tags_every_line(
        #[case] name: &str,
        #[case] output: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(prefix_lines(name, output), expected);
    }

    #[rstest]
    fn parse_env_assignments_rejects_malformed_entries() {
        let parsed = parse_env_assignments(&[String::from("MYENV=foo")]).expect("valid");
        assert_eq!(parsed.first().map(EnvAssignment::key), Some("MYENV"));

        let err = parse_env_assignments(&[String::from("MYENV")]).expect_err("missing value");
        assert!(err.to_string().contains("KEY=VALUE"), "{err}");
    }

    #[rstest]
    fn settle_prefers_command_failure_over_teardown_failure() {
        let teardown = TestbedError::InvalidState {
            operation: "tear down",
            state: TestbedState::Destroyed,
        };
        let outcome = TestbedError::InvalidArguments {
            expected: String::from("x"),
            received: String::from("y"),
        };

        let err = settle(Err(outcome.clone()), Err(teardown.clone())).expect_err("both failed");
        assert!(matches!(err, CliError::Testbed(ref inner) if *inner == outcome));

        let err = settle(Ok(()), Err(teardown.clone())).expect_err("teardown failed");
        assert!(matches!(err, CliError::Testbed(ref inner) if *inner == teardown));

        assert!(settle(Ok(()), Ok(())).is_ok());
    }

    #[tokio::test]
    async fn run_everywhere_requires_ready_testbed() {
        let testbed = StaticTestbed::with_process_runner(TransportConfig::default());
        let err = run_everywhere(&testbed, String::from("true"))
            .await
            .expect_err("uninitialized testbed");
        assert!(matches!(err, TestbedError::InvalidState { .. }), "got {err:?}");
    }

    #[rstest]
    fn write_error_writes_cli_error() {
        let mut buf = Vec::new();
        let err = CliError::InvalidCommand(String::from("bad"));
        write_error(&mut buf, &err);
        let rendered = String::from_utf8(buf).expect("utf8");
        assert!(
            rendered.contains("invalid command argument: bad"),
            "rendered: {rendered}"
        );
    }
}
