//! Docker/Podman CLI integration
//!
//! [`CliRuntime`] implements [`ContainerRuntime`] by invoking the runtime binary.
//! Commands run on the blocking pool; stderr of failed commands is classified
//! into "not found", "daemon unavailable" and generic failures.

use crate::errors::{ObjectKind, Result, RuntimeError};
use crate::runtime::{ContainerInfo, ContainerRuntime, ContainerSpec, RuntimeKind, VolumeInfo};
use serde::Deserialize;
use std::process::Command;
use tracing::{debug, instrument};

/// Whether runtime stderr reports a missing container or volume
pub fn is_not_found_error(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no such container")
        || lower.contains("no such volume")
        || lower.contains("no such object")
}

/// Whether runtime stderr reports an unreachable daemon
pub fn is_daemon_unavailable_error(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("cannot connect to the docker daemon")
        || lower.contains("is the docker daemon running")
        || lower.contains("unable to connect to podman")
        || lower.contains("connection refused")
}

/// Build the `run` argument list for a container spec
pub fn run_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.name.clone(),
    ];

    for mapping in &spec.ports {
        args.push("-p".to_string());
        args.push(mapping.publish_arg());
    }

    for bind in &spec.binds {
        args.push("-v".to_string());
        args.push(bind.clone());
    }

    for (key, value) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }

    if !spec.restart_policy.is_empty() {
        args.push("--restart".to_string());
        args.push(spec.restart_policy.clone());
    }

    for (key, value) in &spec.labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }

    if let Some(network) = &spec.network {
        args.push("--network".to_string());
        args.push(network.clone());
    }

    if let Some(cpus) = &spec.cpu_limit {
        args.push("--cpus".to_string());
        args.push(cpus.clone());
    }

    if let Some(memory) = &spec.memory_limit {
        args.push("--memory".to_string());
        args.push(memory.clone());
    }

    args.push(spec.image.clone());
    args
}

/// Generic CLI-based container runtime implementation
///
/// Docker and Podman share a compatible CLI, so one implementation serves both.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    kind: RuntimeKind,
    /// Container runtime CLI binary path (e.g. "docker" or "podman")
    runtime_path: String,
}

impl CliRuntime {
    /// Runtime using the binary named after its kind
    pub fn new(kind: RuntimeKind) -> Self {
        Self {
            kind,
            runtime_path: kind.as_str().to_string(),
        }
    }

    pub fn docker() -> Self {
        Self::new(RuntimeKind::Docker)
    }

    pub fn podman() -> Self {
        Self::new(RuntimeKind::Podman)
    }

    /// Runtime with a custom binary path
    pub fn with_runtime_path(kind: RuntimeKind, runtime_path: String) -> Self {
        Self { kind, runtime_path }
    }

    pub fn runtime_path(&self) -> &str {
        &self.runtime_path
    }

    /// Run a runtime command on the blocking pool and return its stdout.
    ///
    /// `target` names the object the command acts on so that a "no such ..."
    /// failure can be reported as `RuntimeError::NotFound`.
    async fn execute(
        &self,
        args: Vec<String>,
        operation: &'static str,
        target: Option<(ObjectKind, String)>,
    ) -> Result<String> {
        debug!(
            "Executing runtime command: {} {}",
            self.runtime_path,
            args.join(" ")
        );

        let runtime_path = self.runtime_path.clone();
        tokio::task::spawn_blocking(move || -> std::result::Result<String, RuntimeError> {
            let output = Command::new(&runtime_path)
                .args(&args)
                .output()
                .map_err(|e| RuntimeError::Unavailable {
                    reason: format!("failed to execute {}: {}", runtime_path, e),
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                if let Some((kind, id)) = target {
                    if is_not_found_error(&stderr) {
                        return Err(RuntimeError::NotFound { kind, id });
                    }
                }
                if is_daemon_unavailable_error(&stderr) {
                    return Err(RuntimeError::Unavailable { reason: stderr });
                }
                return Err(RuntimeError::Cli(format!("{} failed: {}", operation, stderr)));
            }

            String::from_utf8(output.stdout)
                .map_err(|e| RuntimeError::Cli(format!("Invalid UTF-8 in runtime output: {}", e)))
        })
        .await
        .map_err(|e| RuntimeError::Cli(format!("Task join error: {}", e)))?
        .map_err(Into::into)
    }
}

impl Default for CliRuntime {
    fn default() -> Self {
        Self::docker()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    image: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectContainer {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    config: Option<InspectConfig>,
    state: Option<InspectState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectVolume {
    name: String,
    #[serde(default)]
    driver: String,
}

/// Parse `container inspect` output (a JSON array)
fn parse_container_inspect(json_output: &str, id: &str) -> Result<ContainerInfo> {
    let containers: Vec<InspectContainer> = serde_json::from_str(json_output.trim())
        .map_err(|e| RuntimeError::Cli(format!("Failed to parse container inspect JSON: {}", e)))?;

    let container = containers.into_iter().next().ok_or_else(|| RuntimeError::NotFound {
        kind: ObjectKind::Container,
        id: id.to_string(),
    })?;

    Ok(ContainerInfo {
        id: container.id,
        name: container.name.trim_start_matches('/').to_string(),
        image: container.config.unwrap_or_default().image,
        state: container.state.map(|s| s.status).unwrap_or_default(),
    })
}

/// Parse `volume inspect` output (a JSON array)
fn parse_volume_inspect(json_output: &str, name: &str) -> Result<VolumeInfo> {
    let volumes: Vec<InspectVolume> = serde_json::from_str(json_output.trim())
        .map_err(|e| RuntimeError::Cli(format!("Failed to parse volume inspect JSON: {}", e)))?;

    volumes
        .into_iter()
        .next()
        .map(|v| VolumeInfo {
            name: v.name,
            driver: v.driver,
        })
        .ok_or_else(|| {
            RuntimeError::NotFound {
                kind: ObjectKind::Volume,
                id: name.to_string(),
            }
            .into()
        })
}

impl ContainerRuntime for CliRuntime {
    fn runtime_name(&self) -> &'static str {
        self.kind.as_str()
    }

    #[instrument(skip(self))]
    async fn ping(&self) -> Result<()> {
        debug!("Pinging container runtime daemon");
        let args = vec!["version".to_string(), "--format".to_string(), "json".to_string()];
        self.execute(args, "Runtime ping", None).await?;
        debug!("Container runtime daemon is available");
        Ok(())
    }

    #[instrument(skip(self, spec), fields(container_name = %spec.name, image = %spec.image))]
    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<String> {
        let stdout = self.execute(run_args(spec), "Run command", None).await?;

        // `run -d` prints the container id; pull noise may precede it
        let container_id = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .unwrap_or_default()
            .to_string();

        if container_id.is_empty() {
            return Err(RuntimeError::Cli("Run command returned no container id".to_string()).into());
        }

        debug!(container_id = %container_id, "Container started");
        Ok(container_id)
    }

    #[instrument(skip(self))]
    async fn get_container(&self, id: &str) -> Result<ContainerInfo> {
        let args = vec!["container".to_string(), "inspect".to_string(), id.to_string()];
        let stdout = self
            .execute(
                args,
                "Container inspect",
                Some((ObjectKind::Container, id.to_string())),
            )
            .await?;
        parse_container_inspect(&stdout, id)
    }

    #[instrument(skip(self))]
    async fn stop_container(&self, id: &str, timeout: Option<u32>) -> Result<()> {
        let mut args = vec!["stop".to_string()];
        if let Some(timeout) = timeout {
            args.push("-t".to_string());
            args.push(timeout.to_string());
        }
        args.push(id.to_string());

        self.execute(
            args,
            "Runtime stop command",
            Some((ObjectKind::Container, id.to_string())),
        )
        .await?;
        debug!("Container {} stopped successfully", id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_container(&self, id: &str) -> Result<()> {
        let args = vec!["rm".to_string(), id.to_string()];
        self.execute(
            args,
            "Remove command",
            Some((ObjectKind::Container, id.to_string())),
        )
        .await?;
        debug!("Container {} removed", id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_volume(&self, name: &str) -> Result<VolumeInfo> {
        let args = vec!["volume".to_string(), "inspect".to_string(), name.to_string()];
        let stdout = self
            .execute(
                args,
                "Volume inspect",
                Some((ObjectKind::Volume, name.to_string())),
            )
            .await?;
        parse_volume_inspect(&stdout, name)
    }

    #[instrument(skip(self))]
    async fn create_volume(&self, name: &str) -> Result<VolumeInfo> {
        let args = vec!["volume".to_string(), "create".to_string(), name.to_string()];
        let stdout = self.execute(args, "Volume create", None).await?;
        let created = stdout.trim();
        debug!("Volume {} created", created);
        Ok(VolumeInfo {
            name: if created.is_empty() {
                name.to_string()
            } else {
                created.to_string()
            },
            driver: "local".to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn remove_volume(&self, name: &str) -> Result<()> {
        let args = vec!["volume".to_string(), "rm".to_string(), name.to_string()];
        self.execute(
            args,
            "Volume remove",
            Some((ObjectKind::Volume, name.to_string())),
        )
        .await?;
        debug!("Volume {} removed", name);
        Ok(())
    }
}

pub mod mock {
    //! In-memory runtime for exercising lifecycle flows without a daemon
    //!
    //! Records every call, keeps simulated containers and volumes, and can be
    //! told to fail individual operations.

    use crate::errors::{ObjectKind, Result, RuntimeError};
    use crate::runtime::{ContainerInfo, ContainerRuntime, ContainerSpec, VolumeInfo};
    use std::collections::{BTreeSet, HashSet};
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
    use tracing::{debug, instrument};

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Operations that can be told to fail
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum MockOperation {
        CreateAndStart,
        GetContainer,
        StopContainer,
        RemoveContainer,
        GetVolume,
        CreateVolume,
        RemoveVolume,
    }

    /// A recorded runtime call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MockCall {
        Ping,
        CreateAndStart(ContainerSpec),
        GetContainer(String),
        StopContainer(String),
        RemoveContainer(String),
        GetVolume(String),
        CreateVolume(String),
        RemoveVolume(String),
    }

    /// Simulated container
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct MockContainer {
        pub id: String,
        pub name: String,
        pub image: String,
        pub state: String,
        pub spec: ContainerSpec,
    }

    impl MockContainer {
        pub fn running(id: &str, name: &str) -> Self {
            Self {
                id: id.to_string(),
                name: name.to_string(),
                image: "mock-image:latest".to_string(),
                state: "running".to_string(),
                spec: ContainerSpec::default(),
            }
        }
    }

    /// Configuration for the mock runtime
    #[derive(Debug, Clone)]
    pub struct MockRuntimeConfig {
        /// Whether ping should succeed
        pub ping_success: bool,
        /// Every call fails as if the daemon were down
        pub daemon_unavailable: bool,
        /// Operations that fail with a generic runtime error
        pub failing_operations: HashSet<MockOperation>,
        /// Volumes whose removal fails with a generic runtime error
        pub failing_volume_removals: HashSet<String>,
    }

    impl Default for MockRuntimeConfig {
        fn default() -> Self {
            Self {
                ping_success: true,
                daemon_unavailable: false,
                failing_operations: HashSet::new(),
                failing_volume_removals: HashSet::new(),
            }
        }
    }

    #[derive(Debug, Default)]
    pub struct MockRuntime {
        config: Arc<Mutex<MockRuntimeConfig>>,
        containers: Arc<Mutex<Vec<MockContainer>>>,
        volumes: Arc<Mutex<BTreeSet<String>>>,
        calls: Arc<Mutex<Vec<MockCall>>>,
    }

    impl MockRuntime {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_config(config: MockRuntimeConfig) -> Self {
            Self {
                config: Arc::new(Mutex::new(config)),
                ..Self::default()
            }
        }

        pub fn update_config<F>(&self, f: F)
        where
            F: FnOnce(&mut MockRuntimeConfig),
        {
            f(&mut lock(&self.config));
        }

        /// Make `operation` fail with a generic runtime error
        pub fn fail(&self, operation: MockOperation) {
            lock(&self.config).failing_operations.insert(operation);
        }

        /// Undo a previous [`MockRuntime::fail`]
        pub fn recover(&self, operation: MockOperation) {
            lock(&self.config).failing_operations.remove(&operation);
        }

        pub fn add_container(&self, container: MockContainer) {
            lock(&self.containers).push(container);
        }

        pub fn container(&self, id: &str) -> Option<MockContainer> {
            lock(&self.containers)
                .iter()
                .find(|c| c.id == id || c.name == id)
                .cloned()
        }

        pub fn containers(&self) -> Vec<MockContainer> {
            lock(&self.containers).clone()
        }

        pub fn add_volume(&self, name: &str) {
            lock(&self.volumes).insert(name.to_string());
        }

        pub fn has_volume(&self, name: &str) -> bool {
            lock(&self.volumes).contains(name)
        }

        pub fn volumes(&self) -> Vec<String> {
            lock(&self.volumes).iter().cloned().collect()
        }

        /// All calls made so far, in order
        pub fn calls(&self) -> Vec<MockCall> {
            lock(&self.calls).clone()
        }

        /// Number of recorded calls matching `predicate`
        pub fn count_calls<F>(&self, predicate: F) -> usize
        where
            F: Fn(&MockCall) -> bool,
        {
            lock(&self.calls).iter().filter(|c| predicate(c)).count()
        }

        pub fn clear_calls(&self) {
            lock(&self.calls).clear();
        }

        fn record(&self, call: MockCall) {
            lock(&self.calls).push(call);
        }

        fn check(&self, operation: MockOperation) -> Result<()> {
            let config = lock(&self.config);
            if config.daemon_unavailable {
                return Err(RuntimeError::Unavailable {
                    reason: "mock daemon unavailable".to_string(),
                }
                .into());
            }
            if config.failing_operations.contains(&operation) {
                return Err(RuntimeError::Cli(format!("mock {:?} failure", operation)).into());
            }
            Ok(())
        }

        fn container_not_found(id: &str) -> crate::errors::EnvHelperError {
            RuntimeError::NotFound {
                kind: ObjectKind::Container,
                id: id.to_string(),
            }
            .into()
        }

        fn volume_not_found(name: &str) -> crate::errors::EnvHelperError {
            RuntimeError::NotFound {
                kind: ObjectKind::Volume,
                id: name.to_string(),
            }
            .into()
        }
    }

    impl ContainerRuntime for MockRuntime {
        fn runtime_name(&self) -> &'static str {
            "mock"
        }

        #[instrument(skip(self))]
        async fn ping(&self) -> Result<()> {
            self.record(MockCall::Ping);
            let config = lock(&self.config);
            if config.daemon_unavailable {
                return Err(RuntimeError::Unavailable {
                    reason: "mock daemon unavailable".to_string(),
                }
                .into());
            }
            if !config.ping_success {
                return Err(RuntimeError::Cli("Mock ping failure".to_string()).into());
            }
            Ok(())
        }

        #[instrument(skip(self, spec))]
        async fn create_and_start(&self, spec: &ContainerSpec) -> Result<String> {
            self.record(MockCall::CreateAndStart(spec.clone()));
            self.check(MockOperation::CreateAndStart)?;

            let mut containers = lock(&self.containers);
            if containers.iter().any(|c| c.name == spec.name) {
                return Err(RuntimeError::Cli(format!(
                    "Conflict. The container name \"/{}\" is already in use",
                    spec.name
                ))
                .into());
            }

            let id = format!("mock-container-{:016x}", fastrand::u64(..));
            containers.push(MockContainer {
                id: id.clone(),
                name: spec.name.clone(),
                image: spec.image.clone(),
                state: "running".to_string(),
                spec: spec.clone(),
            });
            debug!("MockRuntime created container: {}", id);
            Ok(id)
        }

        #[instrument(skip(self))]
        async fn get_container(&self, id: &str) -> Result<ContainerInfo> {
            self.record(MockCall::GetContainer(id.to_string()));
            self.check(MockOperation::GetContainer)?;

            self.container(id)
                .map(|c| ContainerInfo {
                    id: c.id,
                    name: c.name,
                    image: c.image,
                    state: c.state,
                })
                .ok_or_else(|| Self::container_not_found(id))
        }

        #[instrument(skip(self))]
        async fn stop_container(&self, id: &str, _timeout: Option<u32>) -> Result<()> {
            self.record(MockCall::StopContainer(id.to_string()));
            self.check(MockOperation::StopContainer)?;

            let mut containers = lock(&self.containers);
            let container = containers
                .iter_mut()
                .find(|c| c.id == id || c.name == id)
                .ok_or_else(|| Self::container_not_found(id))?;
            container.state = "exited".to_string();
            Ok(())
        }

        #[instrument(skip(self))]
        async fn remove_container(&self, id: &str) -> Result<()> {
            self.record(MockCall::RemoveContainer(id.to_string()));
            self.check(MockOperation::RemoveContainer)?;

            let mut containers = lock(&self.containers);
            let before = containers.len();
            containers.retain(|c| c.id != id && c.name != id);
            if containers.len() == before {
                return Err(Self::container_not_found(id));
            }
            Ok(())
        }

        #[instrument(skip(self))]
        async fn get_volume(&self, name: &str) -> Result<VolumeInfo> {
            self.record(MockCall::GetVolume(name.to_string()));
            self.check(MockOperation::GetVolume)?;

            if self.has_volume(name) {
                Ok(VolumeInfo {
                    name: name.to_string(),
                    driver: "local".to_string(),
                })
            } else {
                Err(Self::volume_not_found(name))
            }
        }

        #[instrument(skip(self))]
        async fn create_volume(&self, name: &str) -> Result<VolumeInfo> {
            self.record(MockCall::CreateVolume(name.to_string()));
            self.check(MockOperation::CreateVolume)?;

            self.add_volume(name);
            Ok(VolumeInfo {
                name: name.to_string(),
                driver: "local".to_string(),
            })
        }

        #[instrument(skip(self))]
        async fn remove_volume(&self, name: &str) -> Result<()> {
            self.record(MockCall::RemoveVolume(name.to_string()));
            self.check(MockOperation::RemoveVolume)?;

            if lock(&self.config).failing_volume_removals.contains(name) {
                return Err(RuntimeError::Cli(format!("volume {} is in use", name)).into());
            }
            if !lock(&self.volumes).remove(name) {
                return Err(Self::volume_not_found(name));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use crate::translate::PortMapping;
    use std::collections::BTreeMap;

    #[test]
    fn test_cli_runtime_constructors() {
        assert_eq!(CliRuntime::docker().runtime_path(), "docker");
        assert_eq!(CliRuntime::podman().runtime_name(), "podman");
        let custom = CliRuntime::with_runtime_path(RuntimeKind::Docker, "/usr/local/bin/docker".into());
        assert_eq!(custom.runtime_path(), "/usr/local/bin/docker");
    }

    #[test]
    fn test_error_classifiers() {
        assert!(is_not_found_error("Error: No such container: env-alice-dev"));
        assert!(is_not_found_error(
            "Error response from daemon: get env_helper_vscode_1234abcd: no such volume"
        ));
        assert!(!is_not_found_error("Error response from daemon: conflict"));

        assert!(is_daemon_unavailable_error(
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?"
        ));
        assert!(!is_daemon_unavailable_error("No such container: x"));
    }

    #[test]
    fn test_run_args() {
        let mut env = BTreeMap::new();
        env.insert("TZ".to_string(), "UTC".to_string());
        let mut labels = BTreeMap::new();
        labels.insert("traefik.enable".to_string(), "true".to_string());

        let spec = ContainerSpec {
            name: "env-alice-dev".to_string(),
            image: "codercom/code-server:latest".to_string(),
            ports: vec![PortMapping {
                host_port: 8443,
                container_port: 8080,
            }],
            binds: vec!["env_helper_vscode_0000beef:/config:rw".to_string()],
            env,
            restart_policy: "unless-stopped".to_string(),
            labels,
            network: Some("env-helper-network".to_string()),
            cpu_limit: Some("1.0".to_string()),
            memory_limit: None,
        };

        let args = run_args(&spec);
        assert_eq!(
            args,
            vec![
                "run",
                "-d",
                "--name",
                "env-alice-dev",
                "-p",
                "8443:8080",
                "-v",
                "env_helper_vscode_0000beef:/config:rw",
                "-e",
                "TZ=UTC",
                "--restart",
                "unless-stopped",
                "--label",
                "traefik.enable=true",
                "--network",
                "env-helper-network",
                "--cpus",
                "1.0",
                "codercom/code-server:latest",
            ]
        );
    }

    #[test]
    fn test_parse_container_inspect() {
        let json = r#"[{"Id":"abc123","Name":"/env-alice-dev","Config":{"Image":"nginx"},"State":{"Status":"running"}}]"#;
        let info = parse_container_inspect(json, "abc123").unwrap();
        assert_eq!(info.id, "abc123");
        assert_eq!(info.name, "env-alice-dev");
        assert_eq!(info.image, "nginx");
        assert!(info.is_running());

        let err = parse_container_inspect("[]", "gone").unwrap_err();
        assert!(err.is_not_found());
        assert!(parse_container_inspect("not json", "x").is_err());
    }

    #[test]
    fn test_parse_volume_inspect() {
        let json = r#"[{"Name":"env_helper_webtop_0badf00d","Driver":"local","Mountpoint":"/var/lib/docker/volumes/x"}]"#;
        let info = parse_volume_inspect(json, "env_helper_webtop_0badf00d").unwrap();
        assert_eq!(info.driver, "local");
        assert!(parse_volume_inspect("[]", "v").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_cli_runtime_missing_binary_is_unavailable() {
        let runtime = CliRuntime::with_runtime_path(
            RuntimeKind::Docker,
            "/nonexistent/envhelper-test-docker".to_string(),
        );
        let err = runtime.ping().await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_mock_volume_lifecycle() {
        let runtime = MockRuntime::new();
        assert!(runtime.get_volume("v1").await.unwrap_err().is_not_found());
        runtime.create_volume("v1").await.unwrap();
        assert!(runtime.get_volume("v1").await.is_ok());
        runtime.remove_volume("v1").await.unwrap();
        assert!(runtime.remove_volume("v1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_mock_container_lifecycle() {
        let runtime = MockRuntime::new();
        let spec = ContainerSpec {
            name: "env-a-b".to_string(),
            image: "img".to_string(),
            ..Default::default()
        };
        let id = runtime.create_and_start(&spec).await.unwrap();
        assert!(runtime.get_container(&id).await.unwrap().is_running());

        // Name conflict surfaces to the second caller
        assert!(runtime.create_and_start(&spec).await.is_err());

        runtime.stop_container(&id, None).await.unwrap();
        assert_eq!(runtime.container(&id).unwrap().state, "exited");
        runtime.remove_container(&id).await.unwrap();
        assert!(runtime.get_container(&id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let runtime = MockRuntime::new();
        runtime.add_container(MockContainer::running("c1", "env-a-b"));
        runtime.fail(MockOperation::StopContainer);

        let err = runtime.stop_container("c1", None).await.unwrap_err();
        assert!(!err.is_not_found());
        assert_eq!(runtime.container("c1").unwrap().state, "running");

        runtime.recover(MockOperation::StopContainer);
        assert!(runtime.stop_container("c1", None).await.is_ok());
        assert_eq!(
            runtime.count_calls(|c| matches!(c, MockCall::StopContainer(_))),
            2
        );
    }

    #[tokio::test]
    async fn test_mock_daemon_unavailable() {
        let runtime = MockRuntime::with_config(MockRuntimeConfig {
            daemon_unavailable: true,
            ..Default::default()
        });
        assert!(runtime.ping().await.unwrap_err().is_unavailable());
        assert!(runtime.get_volume("v").await.unwrap_err().is_unavailable());
    }
}
