//! Environment descriptors
//!
//! An [`EnvironmentDescriptor`] is the persisted record of one user-defined
//! development environment: its container configuration as typed text, the
//! derived volume name and the last known runtime state.

use crate::errors::ValidationError;
use crate::naming;
use crate::translate::{self, PortMapping, VolumeMapping};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Longest accepted descriptor name
pub const MAX_NAME_LEN: usize = 100;

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("valid regex"));

/// Supported environment flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentType {
    /// Browser-based VS Code (code-server)
    Vscode,
    /// Full desktop in the browser
    Webtop,
    /// Caller-supplied image
    Custom,
}

/// Field values a new descriptor of a given type starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDefaults {
    pub image: &'static str,
    pub ports: &'static str,
    pub env_vars: &'static str,
    pub volumes: &'static str,
    pub cpu_limit: &'static str,
    pub memory_limit: &'static str,
    pub auto_start: bool,
}

impl EnvironmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vscode => "vscode",
            Self::Webtop => "webtop",
            Self::Custom => "custom",
        }
    }

    pub fn defaults(&self) -> TypeDefaults {
        match self {
            Self::Vscode => TypeDefaults {
                image: "codercom/code-server:latest",
                ports: "8443:8080",
                env_vars: "PASSWORD=password123\nTZ=UTC",
                volumes: "vscode_data:/home/coder",
                cpu_limit: "1.0",
                memory_limit: "2g",
                auto_start: true,
            },
            Self::Webtop => TypeDefaults {
                image: "linuxserver/webtop:ubuntu-kde",
                ports: "3000:3000",
                env_vars: "PUID=1000\nPGID=1000\nTZ=UTC",
                volumes: "webtop_config:/config\nwebtop_home:/config/home",
                cpu_limit: "2.0",
                memory_limit: "4g",
                auto_start: true,
            },
            Self::Custom => TypeDefaults {
                image: "",
                ports: "",
                env_vars: "TZ=UTC",
                volumes: "",
                cpu_limit: "1.0",
                memory_limit: "2g",
                auto_start: false,
            },
        }
    }
}

impl std::str::FromStr for EnvironmentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vscode" => Ok(Self::Vscode),
            "webtop" => Ok(Self::Webtop),
            "custom" => Ok(Self::Custom),
            _ => Err(ValidationError::EnvironmentType {
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for EnvironmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted environment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub environment_type: EnvironmentType,
    pub owner: String,
    pub image: String,
    /// Comma-separated `hostPort:containerPort` pairs
    #[serde(default)]
    pub ports: String,
    /// `source:target` lines
    #[serde(default)]
    pub volumes: String,
    /// `KEY=value` lines
    #[serde(default)]
    pub env_vars: String,
    #[serde(default)]
    pub cpu_limit: String,
    #[serde(default)]
    pub memory_limit: String,
    #[serde(default)]
    pub auto_start: bool,
    /// Assigned once on first persistence
    #[serde(default)]
    pub volume_name: String,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub container_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EnvironmentDescriptor {
    /// Build an unsaved descriptor from caller fields.
    ///
    /// Unset fields take the environment type's defaults; an explicit empty
    /// value is kept. The id and the volume name are assigned by the store.
    pub fn from_fields(owner: &str, fields: DescriptorFields) -> Result<Self, ValidationError> {
        let environment_type = fields
            .environment_type
            .ok_or_else(|| ValidationError::Required {
                field: "environment_type".to_string(),
            })?;
        let defaults = environment_type.defaults();
        let or_default =
            |value: Option<String>, default: &str| value.unwrap_or_else(|| default.to_string());

        let now = Utc::now();
        Ok(Self {
            id: 0,
            name: fields.name.unwrap_or_default().trim().to_string(),
            description: fields.description.unwrap_or_default(),
            environment_type,
            owner: owner.to_string(),
            image: or_default(fields.image, defaults.image).trim().to_string(),
            ports: or_default(fields.ports, defaults.ports),
            volumes: or_default(fields.volumes, defaults.volumes),
            env_vars: or_default(fields.env_vars, defaults.env_vars),
            cpu_limit: or_default(fields.cpu_limit, defaults.cpu_limit),
            memory_limit: or_default(fields.memory_limit, defaults.memory_limit),
            auto_start: fields.auto_start.unwrap_or(defaults.auto_start),
            volume_name: String::new(),
            is_running: false,
            container_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Overwrite the fields the caller supplied. Runtime state, ownership and
    /// the volume name are never touched here.
    pub fn apply(&mut self, fields: DescriptorFields) {
        if let Some(name) = fields.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = fields.description {
            self.description = description;
        }
        if let Some(environment_type) = fields.environment_type {
            self.environment_type = environment_type;
        }
        if let Some(image) = fields.image {
            self.image = image.trim().to_string();
        }
        if let Some(ports) = fields.ports {
            self.ports = ports;
        }
        if let Some(volumes) = fields.volumes {
            self.volumes = volumes;
        }
        if let Some(env_vars) = fields.env_vars {
            self.env_vars = env_vars;
        }
        if let Some(cpu_limit) = fields.cpu_limit {
            self.cpu_limit = cpu_limit;
        }
        if let Some(memory_limit) = fields.memory_limit {
            self.memory_limit = memory_limit;
        }
        if let Some(auto_start) = fields.auto_start {
            self.auto_start = auto_start;
        }
        self.updated_at = Utc::now();
    }

    /// Check every field-level invariant. Uniqueness is the store's job.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        if self.owner.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "owner".to_string(),
            });
        }
        if self.image.is_empty() {
            return Err(ValidationError::Required {
                field: "image".to_string(),
            });
        }
        translate::parse_ports(&self.ports)?;
        translate::parse_volumes(&self.volumes)?;
        translate::parse_env_vars(&self.env_vars)?;
        naming::validate_container_name(&self.container_name())
    }

    pub fn container_name(&self) -> String {
        naming::container_name(&self.owner, &self.name)
    }

    pub fn port_mappings(&self) -> Result<Vec<PortMapping>, ValidationError> {
        translate::parse_ports(&self.ports)
    }

    pub fn volume_mappings(&self) -> Result<Vec<VolumeMapping>, ValidationError> {
        translate::parse_volumes(&self.volumes)
    }

    pub fn env_var_map(&self) -> Result<BTreeMap<String, String>, ValidationError> {
        translate::parse_env_vars(&self.env_vars)
    }

    /// First host port, where the environment's UI is served
    pub fn ui_port(&self) -> Option<u16> {
        translate::ui_port(&self.ports)
    }

    /// Restart policy handed to the runtime
    pub fn restart_policy(&self) -> &'static str {
        if self.auto_start {
            "unless-stopped"
        } else {
            "no"
        }
    }

    pub fn mark_running(&mut self, container_id: String) {
        self.container_id = Some(container_id);
        self.is_running = true;
        self.updated_at = Utc::now();
    }

    pub fn mark_stopped(&mut self) {
        self.container_id = None;
        self.is_running = false;
        self.updated_at = Utc::now();
    }
}

/// Reject names outside `[A-Za-z0-9][A-Za-z0-9_.-]*` or longer than [`MAX_NAME_LEN`]
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }
    if name.len() > MAX_NAME_LEN || !NAME_RE.is_match(name) {
        return Err(ValidationError::Name {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Caller-supplied descriptor fields for create and update.
///
/// `None` means "not provided": on create the type default applies, on update
/// the stored value is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptorFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub environment_type: Option<EnvironmentType>,
    pub image: Option<String>,
    pub ports: Option<String>,
    pub volumes: Option<String>,
    pub env_vars: Option<String>,
    pub cpu_limit: Option<String>,
    pub memory_limit: Option<String>,
    pub auto_start: Option<bool>,
}
