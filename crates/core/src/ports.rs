//! Host port availability
//!
//! A port is available when no other descriptor publishes it as a host port
//! and nothing on the host accepts connections on it at the loopback address.

use crate::errors::{Result, ValidationError};
use crate::store::DescriptorStore;
use serde::Serialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, instrument};

/// How long the loopback probe waits for a connection
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Outcome of a port availability check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PortStatus {
    Available,
    /// Another descriptor already publishes this host port
    ClaimedByEnvironment { id: u64, name: String },
    /// Something on the host accepted a connection
    InUseOnHost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortCheck {
    pub port: u16,
    pub available: bool,
    #[serde(flatten)]
    pub status: PortStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PortCheck {
    fn new(port: u16, status: PortStatus) -> Self {
        let error = match &status {
            PortStatus::Available => None,
            PortStatus::ClaimedByEnvironment { .. } => Some(format!(
                "Port {} is already in use by another environment",
                port
            )),
            PortStatus::InUseOnHost => Some(format!(
                "Port {} is already in use by another application",
                port
            )),
        };
        Self {
            port,
            available: status == PortStatus::Available,
            status,
            error,
        }
    }
}

/// Range-check a raw port number
pub fn validate_port(port: i64) -> std::result::Result<u16, ValidationError> {
    if (1..=65535).contains(&port) {
        Ok(port as u16)
    } else {
        Err(ValidationError::PortRange { port })
    }
}

/// Whether something accepts TCP connections on `127.0.0.1:port`
pub async fn is_port_open(port: u16) -> bool {
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(("127.0.0.1", port))).await,
        Ok(Ok(_))
    )
}

/// Check `port` against stored descriptors and the host.
///
/// `exclude` skips one descriptor, typically the one being edited.
#[instrument(skip(store))]
pub async fn check_port<S: DescriptorStore + ?Sized>(
    store: &S,
    port: i64,
    exclude: Option<u64>,
) -> Result<PortCheck> {
    let port = validate_port(port)?;

    for descriptor in store.list()? {
        if Some(descriptor.id) == exclude {
            continue;
        }
        // Unparsable legacy entries cannot claim anything
        let claimed = descriptor
            .port_mappings()
            .map(|mappings| mappings.iter().any(|m| m.host_port == port))
            .unwrap_or(false);
        if claimed {
            debug!(descriptor_id = descriptor.id, "Port claimed by descriptor");
            return Ok(PortCheck::new(
                port,
                PortStatus::ClaimedByEnvironment {
                    id: descriptor.id,
                    name: descriptor.name,
                },
            ));
        }
    }

    if is_port_open(port).await {
        debug!("Port accepts connections on loopback");
        return Ok(PortCheck::new(port, PortStatus::InUseOnHost));
    }

    Ok(PortCheck::new(port, PortStatus::Available))
}
