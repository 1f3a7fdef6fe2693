//! Validation and construction of a testbed's node set.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::TestbedError;
use crate::config::TransportConfig;
use crate::node::{HostInfo, Node};
use crate::transport::CommandRunner;

/// Validates `hosts` and builds one node per host, ordered by name.
///
/// Nothing is contacted; an error leaves no partially built set behind.
pub(super) fn build<R: CommandRunner + Clone>(
    mut hosts: Vec<HostInfo>,
    transport: &TransportConfig,
    runner: &R,
) -> Result<Vec<Arc<Node<R>>>, TestbedError> {
    if hosts.is_empty() {
        return Err(TestbedError::InvalidArguments {
            expected: String::from("at least one host"),
            received: String::from("an empty host list"),
        });
    }

    let mut seen = BTreeSet::new();
    for host in &hosts {
        host.validate()
            .map_err(|err| TestbedError::InvalidArguments {
                expected: String::from("hosts with a name, address, user, and non-zero port"),
                received: err.to_string(),
            })?;
        if !seen.insert(host.name.as_str()) {
            return Err(TestbedError::InvalidArguments {
                expected: String::from("unique host names"),
                received: format!("duplicate host name '{}'", host.name),
            });
        }
    }

    hosts.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(hosts
        .into_iter()
        .map(|host| Arc::new(Node::new(host, transport.clone(), runner.clone())))
        .collect())
}
