//! Connection descriptors for testbed nodes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default TCP port for SSH.
pub const DEFAULT_SSH_PORT: u16 = 22;

const fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

/// Everything needed to reach one node over SSH.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HostInfo {
    /// Identity of the node, unique within its testbed.
    pub name: String,
    /// Hostname, IPv4, or IPv6 address of the SSH daemon.
    pub address: String,
    /// TCP port of the SSH daemon.
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// User to authenticate as.
    pub user: String,
    /// Private key used for authentication. Supports `~/` expansion; when
    /// absent the client falls back to its default identities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
    /// Variables exported before every command run on the node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvAssignment>,
}

impl HostInfo {
    /// Creates a descriptor on the default SSH port without an explicit
    /// identity or environment.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port: DEFAULT_SSH_PORT,
            user: user.into(),
            identity_file: None,
            env: Vec::new(),
        }
    }

    /// Sets the SSH port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the private key file.
    #[must_use]
    pub fn with_identity_file(mut self, path: impl Into<String>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Appends environment assignments exported on the node.
    #[must_use]
    pub fn with_env(mut self, env: impl IntoIterator<Item = EnvAssignment>) -> Self {
        self.env.extend(env);
        self
    }

    /// Checks that the descriptor can address a node.
    ///
    /// # Errors
    ///
    /// Returns [`HostInfoError`] naming the first blank field, or a zero
    /// port.
    pub fn validate(&self) -> Result<(), HostInfoError> {
        for (field, value) in [
            ("name", &self.name),
            ("address", &self.address),
            ("user", &self.user),
        ] {
            if value.trim().is_empty() {
                return Err(self.invalid(field));
            }
        }
        if self.port == 0 {
            return Err(self.invalid("port"));
        }
        if self
            .identity_file
            .as_deref()
            .is_some_and(|path| path.trim().is_empty())
        {
            return Err(self.invalid("identity_file"));
        }
        Ok(())
    }

    fn invalid(&self, field: &str) -> HostInfoError {
        HostInfoError {
            host: self.name.clone(),
            field: field.to_owned(),
        }
    }
}

/// Raised when a host descriptor is missing a usable value.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("host '{host}' has an empty or invalid {field}")]
pub struct HostInfoError {
    /// Name of the offending host (may itself be blank).
    pub host: String,
    /// Field that failed validation.
    pub field: String,
}

/// A validated `KEY=VALUE` environment assignment.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct EnvAssignment {
    key: String,
    value: String,
}

impl EnvAssignment {
    /// Builds an assignment after validating the key.
    ///
    /// # Errors
    ///
    /// Returns [`EnvAssignmentError`] when the key is empty or is not a valid
    /// shell identifier.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, EnvAssignmentError> {
        let key_text = key.into();
        if !is_shell_identifier(&key_text) {
            return Err(EnvAssignmentError {
                assignment: key_text,
                reason: String::from("key must match [A-Za-z_][A-Za-z0-9_]*"),
            });
        }
        Ok(Self {
            key: key_text,
            value: value.into(),
        })
    }

    /// Variable name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Unescaped value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Key/value pair suitable for `Command::envs`.
    #[must_use]
    pub fn to_pair(&self) -> (String, String) {
        (self.key.clone(), self.value.clone())
    }
}

fn is_shell_identifier(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

impl FromStr for EnvAssignment {
    type Err = EnvAssignmentError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let Some((key, value)) = text.split_once('=') else {
            return Err(EnvAssignmentError {
                assignment: text.to_owned(),
                reason: String::from("expected KEY=VALUE"),
            });
        };
        Self::new(key, value).map_err(|err| EnvAssignmentError {
            assignment: text.to_owned(),
            reason: err.reason,
        })
    }
}

impl TryFrom<String> for EnvAssignment {
    type Error = EnvAssignmentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EnvAssignment> for String {
    fn from(value: EnvAssignment) -> Self {
        value.to_string()
    }
}

impl fmt::Display for EnvAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Raised when an environment assignment cannot be parsed.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("invalid environment assignment '{assignment}': {reason}")]
pub struct EnvAssignmentError {
    /// Text that failed to parse.
    pub assignment: String,
    /// Why it was rejected.
    pub reason: String,
}
