//! Concurrent fan-out of one operation across every node of a testbed.
//!
//! One blocking worker is spawned per node and the call resolves only once
//! all of them have finished, so side effects are fully applied even when
//! some nodes fail. Outcomes travel back through the join set rather than a
//! shared collection, and failures are reported in node order.

use std::any::Any;
use std::fmt::{self, Display};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::node::Node;
use crate::transport::CommandRunner;

/// One node's failure within an iteration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeFailure {
    /// Name of the node whose operation failed.
    pub node: String,
    /// Rendered error (or panic message) from the operation.
    pub message: String,
}

impl Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.node, self.message)
    }
}

/// Raised when the operation failed on at least one node.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error(
    "{failed} of {total} nodes failed: {details}",
    failed = .failures.len(),
    details = render_failures(.failures)
)]
pub struct IterationError {
    total: usize,
    failures: Vec<NodeFailure>,
}

impl IterationError {
    /// Number of nodes the operation was applied to.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Failures in node order. Never empty.
    #[must_use]
    pub fn failures(&self) -> &[NodeFailure] {
        &self.failures
    }

    /// Names of the failed nodes, in node order.
    #[must_use]
    pub fn failed_nodes(&self) -> Vec<&str> {
        self.failures
            .iter()
            .map(|failure| failure.node.as_str())
            .collect()
    }
}

fn render_failures(failures: &[NodeFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Applies `operation` to every node concurrently and waits for all of them.
///
/// Every node is visited exactly once, no matter how many fail. A panic
/// inside `operation` is recorded as a failure of that node.
///
/// # Errors
///
/// Returns [`IterationError`] listing each node whose operation failed.
pub async fn iterate_nodes<R, F, E>(
    nodes: &[Arc<Node<R>>],
    operation: F,
) -> Result<(), IterationError>
where
    R: CommandRunner + 'static,
    F: Fn(&Node<R>) -> Result<(), E> + Send + Sync + 'static,
    E: Display + Send + 'static,
{
    debug!(nodes = nodes.len(), "starting concurrent iteration");
    let shared_operation = Arc::new(operation);
    let mut workers = JoinSet::new();
    for (index, node) in nodes.iter().enumerate() {
        let worker_node = Arc::clone(node);
        let worker_operation = Arc::clone(&shared_operation);
        workers.spawn_blocking(move || {
            let outcome = run_guarded(&worker_node, worker_operation.as_ref());
            (index, outcome)
        });
    }

    let mut failures: Vec<(usize, NodeFailure)> = Vec::new();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((index, Err(message))) => {
                let node = nodes
                    .get(index)
                    .map_or_else(|| String::from("<unknown>"), |n| n.name().to_owned());
                warn!(node = %node, error = %message, "node operation failed");
                failures.push((index, NodeFailure { node, message }));
            }
            Err(join_error) => {
                warn!(error = %join_error, "node worker did not complete");
                failures.push((
                    usize::MAX,
                    NodeFailure {
                        node: String::from("<unknown>"),
                        message: join_error.to_string(),
                    },
                ));
            }
        }
    }

    if failures.is_empty() {
        info!(nodes = nodes.len(), "operation succeeded on every node");
        return Ok(());
    }

    failures.sort_by_key(|(index, _)| *index);
    Err(IterationError {
        total: nodes.len(),
        failures: failures.into_iter().map(|(_, failure)| failure).collect(),
    })
}

fn run_guarded<R, F, E>(node: &Node<R>, operation: &F) -> Result<(), String>
where
    R: CommandRunner,
    F: Fn(&Node<R>) -> Result<(), E>,
    E: Display,
{
    match panic::catch_unwind(AssertUnwindSafe(|| operation(node))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return format!("operation panicked: {message}");
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return format!("operation panicked: {message}");
    }
    String::from("operation panicked")
}
