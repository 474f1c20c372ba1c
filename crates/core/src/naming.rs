//! Deterministic runtime names and labels
//!
//! Container names are derived from the owner and the descriptor name, volume
//! names are generated once per descriptor, and the label set carries both the
//! reverse-proxy routing groups and the identity labels used to recognise
//! containers created by this tool.

use crate::descriptor::{EnvironmentDescriptor, EnvironmentType};
use crate::errors::ValidationError;
use crate::settings::ProxySettings;
use crate::translate::PortMapping;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

/// Identity label schema
pub const LABEL_SOURCE: &str = "envhelper.source";
pub const LABEL_DESCRIPTOR: &str = "envhelper.descriptor";
pub const LABEL_OWNER: &str = "envhelper.owner";

/// Source identifier for containers created by envhelper
pub const ENVHELPER_SOURCE: &str = "envhelper";

/// Prefix of every generated volume name
pub const VOLUME_PREFIX: &str = "env_helper";

static CONTAINER_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").expect("valid regex"));

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Container name for an owner's environment: `env-{owner}-{name}`
pub fn container_name(owner: &str, name: &str) -> String {
    format!("env-{}-{}", sanitize(owner), sanitize(name))
}

/// Whether `value` satisfies the runtime's container-name syntax
pub fn is_valid_container_name(value: &str) -> bool {
    CONTAINER_NAME_RE.is_match(value)
}

/// Reject a derived container name the runtime would refuse
pub fn validate_container_name(value: &str) -> Result<(), ValidationError> {
    if is_valid_container_name(value) {
        Ok(())
    } else {
        Err(ValidationError::ContainerName {
            container_name: value.to_string(),
        })
    }
}

/// Fresh volume name `env_helper_{type}_{8 hex digits}`
pub fn generate_volume_name(environment_type: EnvironmentType) -> String {
    format!(
        "{}_{}_{:08x}",
        VOLUME_PREFIX,
        environment_type.as_str(),
        fastrand::u32(..)
    )
}

/// Reverse-proxy routing labels, one group per port mapping.
///
/// Each group is keyed by `{container_name}-{container_port}` and routes
/// `{container_name}-{container_port}.{domain}` to the container port.
pub fn routing_labels(
    container_name: &str,
    mappings: &[PortMapping],
    proxy: &ProxySettings,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("traefik.enable".to_string(), "true".to_string());

    for mapping in mappings {
        let key = format!("{}-{}", container_name, mapping.container_port);
        let router = format!("traefik.http.routers.{}", key);

        labels.insert(
            format!("{}.rule", router),
            format!("Host(`{}.{}`)", key, proxy.domain),
        );
        labels.insert(format!("{}.entrypoints", router), proxy.entrypoint.clone());
        labels.insert(
            format!("traefik.http.services.{}.loadbalancer.server.port", key),
            mapping.container_port.to_string(),
        );
        labels.insert(format!("{}.tls", router), proxy.tls.to_string());
        if proxy.tls {
            labels.insert(
                format!("{}.tls.certresolver", router),
                proxy.cert_resolver.clone(),
            );
        }
    }

    labels
}

/// Identity of the container backing a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerIdentity {
    pub descriptor_id: u64,
    pub owner: String,
    pub container_name: String,
}

impl ContainerIdentity {
    pub fn new(descriptor: &EnvironmentDescriptor) -> Self {
        let identity = Self {
            descriptor_id: descriptor.id,
            owner: descriptor.owner.clone(),
            container_name: container_name(&descriptor.owner, &descriptor.name),
        };
        debug!(
            descriptor_id = identity.descriptor_id,
            container_name = %identity.container_name,
            "Derived container identity"
        );
        identity
    }

    /// Identity labels attached at creation
    pub fn labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_SOURCE.to_string(), ENVHELPER_SOURCE.to_string());
        labels.insert(LABEL_DESCRIPTOR.to_string(), self.descriptor_id.to_string());
        labels.insert(LABEL_OWNER.to_string(), self.owner.clone());
        labels
    }
}
