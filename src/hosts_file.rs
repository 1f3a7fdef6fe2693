//! Loading static host lists from JSON files.
//!
//! The file holds a JSON array of host descriptors:
//!
//! ```json
//! [
//!   {"name": "node1", "address": "10.0.0.11", "user": "ci",
//!    "identity_file": "~/.ssh/ci", "env": ["ROLE=primary"]},
//!   {"name": "node2", "address": "10.0.0.12", "port": 2222, "user": "ci"}
//! ]
//! ```

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

use crate::node::HostInfo;
use crate::util::expand_tilde;

/// Errors raised while loading a hosts file.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum HostsFileError {
    /// Raised when the file cannot be read.
    #[error("failed to read hosts file {path}: {message}")]
    Read {
        /// Path after tilde expansion.
        path: String,
        /// Underlying I/O error.
        message: String,
    },
    /// Raised when the contents are not a JSON array of hosts.
    #[error("failed to parse hosts file {path}: {message}")]
    Parse {
        /// Path after tilde expansion.
        path: String,
        /// Deserialiser error.
        message: String,
    },
    /// Raised when the file lists no hosts.
    #[error("hosts file {path} lists no hosts")]
    Empty {
        /// Path after tilde expansion.
        path: String,
    },
}

/// Reads and parses the hosts file at `path`.
///
/// Host-level validation (blank fields, duplicate names) is left to the
/// testbed so the same rules apply to every source of hosts.
///
/// # Errors
///
/// Returns [`HostsFileError`] when the file is unreadable, malformed, or
/// empty.
pub fn load_hosts(path: &str) -> Result<Vec<HostInfo>, HostsFileError> {
    let expanded = expand_tilde(path);
    let content = read_to_string_ambient(&expanded).map_err(|message| HostsFileError::Read {
        path: expanded.clone(),
        message,
    })?;
    let hosts: Vec<HostInfo> =
        serde_json::from_str(&content).map_err(|err| HostsFileError::Parse {
            path: expanded.clone(),
            message: err.to_string(),
        })?;
    if hosts.is_empty() {
        return Err(HostsFileError::Empty { path: expanded });
    }
    Ok(hosts)
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let full_path = Utf8Path::new(path);
    let (dir_path, file_path) = if full_path.is_absolute() {
        let parent = full_path
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {full_path}"))?;
        let file_name = full_path
            .file_name()
            .ok_or_else(|| format!("path has no file name: {full_path}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), full_path)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_path).map_err(|err| err.to_string())
}
