//! Parser for `vagrant ssh-config` output.

use crate::provision::ProvisionError;

/// Connection details of one machine as reported by `vagrant ssh-config`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) struct SshConfigEntry {
    pub(super) name: String,
    pub(super) hostname: String,
    pub(super) port: u16,
    pub(super) user: String,
    pub(super) identity_file: Option<String>,
}

#[derive(Default)]
struct PartialEntry {
    name: String,
    hostname: Option<String>,
    port: Option<String>,
    user: Option<String>,
    identity_file: Option<String>,
}

impl PartialEntry {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    fn apply(&mut self, key: &str, value: &str) {
        let slot = match key.to_ascii_lowercase().as_str() {
            "hostname" => &mut self.hostname,
            "port" => &mut self.port,
            "user" => &mut self.user,
            "identityfile" => &mut self.identity_file,
            _ => return,
        };
        // First occurrence wins, matching ssh's own precedence.
        if slot.is_none() {
            *slot = Some(unquote(value).to_owned());
        }
    }

    fn finish(self) -> Result<SshConfigEntry, ProvisionError> {
        let hostname = required(&self.name, self.hostname, "HostName")?;
        let user = required(&self.name, self.user, "User")?;
        let raw_port = required(&self.name, self.port, "Port")?;
        let port = raw_port.parse::<u16>().map_err(|err| ProvisionError::Parse {
            source_name: String::from("ssh-config"),
            message: format!("port '{raw_port}' of machine '{}': {err}", self.name),
        })?;
        Ok(SshConfigEntry {
            name: self.name,
            hostname,
            port,
            user,
            identity_file: self.identity_file,
        })
    }
}

fn required(host: &str, value: Option<String>, field: &str) -> Result<String, ProvisionError> {
    value
        .filter(|found| !found.is_empty())
        .ok_or_else(|| ProvisionError::MissingField {
            host: host.to_owned(),
            field: field.to_owned(),
        })
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}

/// Parses every `Host` block, in the order reported.
pub(super) fn parse(output: &str) -> Result<Vec<SshConfigEntry>, ProvisionError> {
    let mut entries = Vec::new();
    let mut current: Option<PartialEntry> = None;

    for raw_line in output.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(key, value)| (key, value.trim()));

        if key.eq_ignore_ascii_case("host") {
            if let Some(done) = current.take() {
                entries.push(done.finish()?);
            }
            current = Some(PartialEntry::named(value));
            continue;
        }

        let Some(entry) = current.as_mut() else {
            return Err(ProvisionError::Parse {
                source_name: String::from("ssh-config"),
                message: format!("'{line}' appears before any Host line"),
            });
        };
        entry.apply(key, value);
    }

    if let Some(done) = current {
        entries.push(done.finish()?);
    }
    Ok(entries)
}
