//! Parser for `vagrant status --machine-readable` output.
//!
//! Each line is `timestamp,target,type,data...`; only `state` lines with a
//! target are of interest.

use crate::provision::ProvisionError;

/// State reported for running machines.
const RUNNING: &str = "running";

/// Names of machines whose state is `running`, sorted by name.
pub(super) fn running_machines(output: &str) -> Result<Vec<String>, ProvisionError> {
    let mut running = Vec::new();
    for line in output.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let mut fields = line.splitn(4, ',');
        let (Some(_timestamp), Some(target), Some(kind), Some(data)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(ProvisionError::Parse {
                source_name: String::from("status"),
                message: format!("malformed machine-readable line '{line}'"),
            });
        };
        if kind == "state" && !target.is_empty() && data == RUNNING {
            running.push(target.to_owned());
        }
    }
    running.sort();
    running.dedup();
    Ok(running)
}
