//! Stored text fields to runtime parameters
//!
//! Descriptors keep ports, volumes and environment variables as free text, the
//! way users type them. The functions here turn that text into structured values
//! for the runtime adapter and back. All of them are pure and either return a
//! complete result or a `ValidationError` naming the offending token or line.

use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `hostPort:containerPort` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
}

impl PortMapping {
    /// Runtime port key, e.g. `8080/tcp`
    pub fn key(&self) -> String {
        format!("{}/tcp", self.container_port)
    }

    /// `-p` argument form, e.g. `8443:8080`
    pub fn publish_arg(&self) -> String {
        format!("{}:{}", self.host_port, self.container_port)
    }
}

/// One `source:target` volume line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMapping {
    /// Named volume or host path
    pub source: String,
    /// Everything after the first `:` (container path plus optional mode)
    pub target: String,
}

impl VolumeMapping {
    /// `-v` argument form
    pub fn bind_arg(&self) -> String {
        format!("{}:{}", self.source, self.target)
    }
}

fn parse_port_number(token: &str, side: &str, raw: &str) -> Result<u16, ValidationError> {
    let value: i64 = raw.trim().parse().map_err(|_| ValidationError::Ports {
        token: token.to_string(),
        reason: format!("{} port '{}' is not a number", side, raw.trim()),
    })?;

    if !(1..=65535).contains(&value) {
        return Err(ValidationError::Ports {
            token: token.to_string(),
            reason: format!("{} port {} is out of range (1-65535)", side, value),
        });
    }

    Ok(value as u16)
}

/// Parse a comma-separated `host:container` list.
///
/// Empty (or whitespace-only) text yields no mappings. A container port may
/// appear only once so the resulting binding map stays one-to-one with the
/// entries.
pub fn parse_ports(text: &str) -> Result<Vec<PortMapping>, ValidationError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut mappings: Vec<PortMapping> = Vec::new();
    for raw_token in text.split(',') {
        let token = raw_token.trim();
        if token.is_empty() {
            return Err(ValidationError::Ports {
                token: raw_token.to_string(),
                reason: "empty entry".to_string(),
            });
        }

        let parts: Vec<&str> = token.split(':').collect();
        if parts.len() != 2 {
            return Err(ValidationError::Ports {
                token: token.to_string(),
                reason: "expected exactly one ':' (hostPort:containerPort)".to_string(),
            });
        }

        let host_port = parse_port_number(token, "host", parts[0])?;
        let container_port = parse_port_number(token, "container", parts[1])?;

        if mappings.iter().any(|m| m.container_port == container_port) {
            return Err(ValidationError::Ports {
                token: token.to_string(),
                reason: format!("container port {} is mapped more than once", container_port),
            });
        }

        mappings.push(PortMapping {
            host_port,
            container_port,
        });
    }

    Ok(mappings)
}

/// Port bindings keyed by `containerPort/tcp`, valued by host port
pub fn port_bindings(mappings: &[PortMapping]) -> BTreeMap<String, u16> {
    mappings.iter().map(|m| (m.key(), m.host_port)).collect()
}

/// First host port of a ports field, used as the environment's UI port
pub fn ui_port(text: &str) -> Option<u16> {
    parse_ports(text)
        .ok()
        .and_then(|mappings| mappings.first().map(|m| m.host_port))
}

/// Parse newline-separated `source:target` volume lines. Blank lines are skipped.
pub fn parse_volumes(text: &str) -> Result<Vec<VolumeMapping>, ValidationError> {
    let mut volumes = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (source, target) = line.split_once(':').ok_or_else(|| ValidationError::Volumes {
            line: line.to_string(),
        })?;

        volumes.push(VolumeMapping {
            source: source.trim().to_string(),
            target: target.trim().to_string(),
        });
    }
    Ok(volumes)
}

/// Names of the volumes referenced by a volumes field.
///
/// Lenient counterpart of [`parse_volumes`] used during teardown: lines without
/// a `:` or with an empty source are ignored instead of rejected.
pub fn referenced_volume_names(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(source, _)| source.trim())
        .filter(|source| !source.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `KEY=value` lines.
///
/// Blank lines and lines whose first non-whitespace character is `#` are
/// skipped. The key is everything before the first `=`, the value everything
/// after it, both trimmed. A repeated key keeps its last value.
pub fn parse_env_vars(text: &str) -> Result<BTreeMap<String, String>, ValidationError> {
    let mut vars = BTreeMap::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (key, value) = trimmed
            .split_once('=')
            .ok_or_else(|| ValidationError::EnvVars {
                line: trimmed.to_string(),
                reason: "expected KEY=value".to_string(),
            })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(ValidationError::EnvVars {
                line: trimmed.to_string(),
                reason: "variable name is empty".to_string(),
            });
        }

        vars.insert(key.to_string(), value.trim().to_string());
    }
    Ok(vars)
}

/// Render variables back into `KEY=value` lines, sorted by key
pub fn format_env_vars(vars: &BTreeMap<String, String>) -> String {
    vars.iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}
