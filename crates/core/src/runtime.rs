//! Container runtime abstraction for Docker/Podman
//!
//! [`ContainerRuntime`] is the single adapter interface the lifecycle controller
//! talks to. "Not found" is reported as `RuntimeError::NotFound` so callers can
//! tolerate missing objects during teardown; everything else is a generic
//! runtime failure.

use crate::docker::CliRuntime;
use crate::errors::{Result, RuntimeError};
use crate::translate::{self, PortMapping};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Everything needed to create and start one environment container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub ports: Vec<PortMapping>,
    /// `source:target[:mode]` binds, primary volume first
    pub binds: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub restart_policy: String,
    pub labels: BTreeMap<String, String>,
    pub network: Option<String>,
    pub cpu_limit: Option<String>,
    pub memory_limit: Option<String>,
}

impl ContainerSpec {
    /// Port bindings keyed by `containerPort/tcp`
    pub fn port_bindings(&self) -> BTreeMap<String, u16> {
        translate::port_bindings(&self.ports)
    }
}

/// Subset of container inspect output the controller cares about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    /// Runtime state string, e.g. `running` or `exited`
    pub state: String,
}

impl ContainerInfo {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub name: String,
    pub driver: String,
}

/// Container runtime adapter
#[allow(async_fn_in_trait)]
pub trait ContainerRuntime: Send + Sync {
    /// Name of this runtime (e.g. "docker", "podman")
    fn runtime_name(&self) -> &'static str;

    /// Check that the daemon is reachable
    async fn ping(&self) -> Result<()>;

    /// Create and start a container, returning its id
    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<String>;

    /// Inspect a container by id or name
    async fn get_container(&self, id: &str) -> Result<ContainerInfo>;

    async fn stop_container(&self, id: &str, timeout: Option<u32>) -> Result<()>;

    async fn remove_container(&self, id: &str) -> Result<()>;

    async fn get_volume(&self, name: &str) -> Result<VolumeInfo>;

    async fn create_volume(&self, name: &str) -> Result<VolumeInfo>;

    async fn remove_volume(&self, name: &str) -> Result<()>;
}

impl<T: ContainerRuntime> ContainerRuntime for &T {
    fn runtime_name(&self) -> &'static str {
        (**self).runtime_name()
    }

    async fn ping(&self) -> Result<()> {
        (**self).ping().await
    }

    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<String> {
        (**self).create_and_start(spec).await
    }

    async fn get_container(&self, id: &str) -> Result<ContainerInfo> {
        (**self).get_container(id).await
    }

    async fn stop_container(&self, id: &str, timeout: Option<u32>) -> Result<()> {
        (**self).stop_container(id, timeout).await
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        (**self).remove_container(id).await
    }

    async fn get_volume(&self, name: &str) -> Result<VolumeInfo> {
        (**self).get_volume(name).await
    }

    async fn create_volume(&self, name: &str) -> Result<VolumeInfo> {
        (**self).create_volume(name).await
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        (**self).remove_volume(name).await
    }
}

/// Probe the daemon, reporting any failure as `RuntimeError::Unavailable`
#[instrument(skip(runtime), fields(runtime = runtime.runtime_name()))]
pub async fn connect<R: ContainerRuntime>(runtime: &R) -> Result<()> {
    match runtime.ping().await {
        Ok(()) => {
            debug!("Runtime reachable");
            Ok(())
        }
        Err(e) if e.is_unavailable() => Err(e),
        Err(e) => Err(RuntimeError::Unavailable {
            reason: e.to_string(),
        }
        .into()),
    }
}

/// Runtime selection options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Docker,
    Podman,
}

impl RuntimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

impl std::str::FromStr for RuntimeKind {
    type Err = RuntimeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            _ => Err(RuntimeError::Cli(format!(
                "Unknown runtime: {}. Supported runtimes: docker, podman",
                s
            ))),
        }
    }
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime factory for creating container runtime instances
pub struct RuntimeFactory;

impl RuntimeFactory {
    /// Pick the runtime kind.
    ///
    /// Precedence: CLI flag > ENVHELPER_RUNTIME env var > settings > docker
    pub fn detect_runtime(
        cli_runtime: Option<RuntimeKind>,
        configured: Option<RuntimeKind>,
    ) -> RuntimeKind {
        if let Some(runtime) = cli_runtime {
            return runtime;
        }

        if let Ok(env_runtime) = std::env::var("ENVHELPER_RUNTIME") {
            if let Ok(runtime) = env_runtime.parse() {
                return runtime;
            }
        }

        configured.unwrap_or(RuntimeKind::Docker)
    }

    /// Create a CLI-backed runtime, optionally with a custom binary path
    pub fn create_runtime(kind: RuntimeKind, runtime_path: Option<String>) -> CliRuntime {
        match runtime_path {
            Some(path) => CliRuntime::with_runtime_path(kind, path),
            None => CliRuntime::new(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::mock::{MockRuntime, MockRuntimeConfig};
    use serial_test::serial;

    #[test]
    fn test_runtime_kind_parse_and_display() {
        assert_eq!("docker".parse::<RuntimeKind>().unwrap(), RuntimeKind::Docker);
        assert_eq!("Podman".parse::<RuntimeKind>().unwrap(), RuntimeKind::Podman);
        assert!("containerd".parse::<RuntimeKind>().is_err());
        assert_eq!(RuntimeKind::Podman.to_string(), "podman");
    }

    #[test]
    #[serial]
    fn test_detect_runtime_precedence() {
        std::env::remove_var("ENVHELPER_RUNTIME");
        assert_eq!(RuntimeFactory::detect_runtime(None, None), RuntimeKind::Docker);
        assert_eq!(
            RuntimeFactory::detect_runtime(None, Some(RuntimeKind::Podman)),
            RuntimeKind::Podman
        );

        std::env::set_var("ENVHELPER_RUNTIME", "podman");
        assert_eq!(RuntimeFactory::detect_runtime(None, None), RuntimeKind::Podman);
        assert_eq!(
            RuntimeFactory::detect_runtime(Some(RuntimeKind::Docker), None),
            RuntimeKind::Docker
        );
        std::env::remove_var("ENVHELPER_RUNTIME");
    }

    #[test]
    fn test_create_runtime() {
        let runtime = RuntimeFactory::create_runtime(RuntimeKind::Podman, None);
        assert_eq!(runtime.runtime_name(), "podman");

        let runtime =
            RuntimeFactory::create_runtime(RuntimeKind::Docker, Some("/opt/bin/docker".into()));
        assert_eq!(runtime.runtime_name(), "docker");
        assert_eq!(runtime.runtime_path(), "/opt/bin/docker");
    }

    #[tokio::test]
    async fn test_connect_maps_ping_failure_to_unavailable() {
        let runtime = MockRuntime::with_config(MockRuntimeConfig {
            ping_success: false,
            ..Default::default()
        });
        let err = connect(&runtime).await.unwrap_err();
        assert!(err.is_unavailable());

        let runtime = MockRuntime::new();
        assert!(connect(&runtime).await.is_ok());
    }
}
