//! Integration tests for the lifecycle controller without a container daemon
//!
//! The controller is driven with the mock runtime and the JSON file store so
//! every transition is checked against what actually lands on disk.

use anyhow::Result;
use envhelper_core::descriptor::{DescriptorFields, EnvironmentDescriptor, EnvironmentType};
use envhelper_core::docker::mock::{MockCall, MockOperation, MockRuntime};
use envhelper_core::errors::{EnvHelperError, RuntimeError, StoreError, ValidationError};
use envhelper_core::lifecycle::{LifecycleController, StartOutcome, StopOutcome};
use envhelper_core::naming::{LABEL_DESCRIPTOR, LABEL_OWNER};
use envhelper_core::runtime::ContainerRuntime;
use envhelper_core::settings::Settings;
use envhelper_core::store::{DescriptorStore, JsonFileStore, MemoryStore};
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

fn file_controller<'a>(
    runtime: &'a MockRuntime,
    temp_dir: &TempDir,
) -> LifecycleController<&'a MockRuntime, JsonFileStore> {
    let store = JsonFileStore::new(temp_dir.path().join("environments.json"));
    LifecycleController::new(runtime, store, Settings::default())
}

fn custom_fields(name: &str) -> DescriptorFields {
    DescriptorFields {
        name: Some(name.to_string()),
        environment_type: Some(EnvironmentType::Custom),
        image: Some("nginx:alpine".to_string()),
        ports: Some("18080:80, 18443:443".to_string()),
        env_vars: Some("KEY1=value1\n# comment\n\nKEY2=a=b".to_string()),
        volumes: Some("site_data:/usr/share/nginx/html".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_start_with_absent_volume() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let runtime = MockRuntime::new();
    let controller = file_controller(&runtime, &temp_dir);

    let descriptor = controller.create_descriptor("alice", custom_fields("web"))?;
    let outcome = controller.start(descriptor.id, "alice").await?;

    let started = match outcome {
        StartOutcome::Started(d) => d,
        other => panic!("unexpected outcome: {:?}", other),
    };
    assert!(started.is_running);

    assert_eq!(
        runtime.count_calls(|c| matches!(c, MockCall::CreateVolume(v) if *v == descriptor.volume_name)),
        1
    );
    assert_eq!(
        runtime.count_calls(|c| matches!(c, MockCall::CreateAndStart(_))),
        1
    );

    // Running state survives a fresh store handle
    let reopened = JsonFileStore::new(temp_dir.path().join("environments.json"));
    let persisted = reopened.get(descriptor.id)?;
    assert!(persisted.is_running);
    assert_eq!(persisted.container_id, started.container_id);
    Ok(())
}

#[tokio::test]
async fn test_start_passes_translated_parameters() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let runtime = MockRuntime::new();
    let controller = file_controller(&runtime, &temp_dir);

    let descriptor = controller.create_descriptor("alice", custom_fields("web"))?;
    let outcome = controller.start(descriptor.id, "alice").await?;
    let container_id = outcome.descriptor().container_id.clone().unwrap();

    let container = runtime.container(&container_id).unwrap();
    let spec = container.spec;
    assert_eq!(spec.name, "env-alice-web");
    assert_eq!(spec.image, "nginx:alpine");
    assert_eq!(spec.restart_policy, "no");

    let bindings = spec.port_bindings();
    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings.get("80/tcp"), Some(&18080));
    assert_eq!(bindings.get("443/tcp"), Some(&18443));

    assert_eq!(spec.env.get("KEY1").map(String::as_str), Some("value1"));
    assert_eq!(spec.env.get("KEY2").map(String::as_str), Some("a=b"));
    assert_eq!(spec.env.len(), 2);

    assert_eq!(spec.binds[0], format!("{}:/config:rw", descriptor.volume_name));
    assert_eq!(spec.binds[1], "site_data:/usr/share/nginx/html");

    assert_eq!(spec.labels.get("traefik.enable").map(String::as_str), Some("true"));
    assert_eq!(
        spec.labels
            .get("traefik.http.routers.env-alice-web-443.rule")
            .map(String::as_str),
        Some("Host(`env-alice-web-443.localhost`)")
    );
    assert_eq!(
        spec.labels
            .get("traefik.http.services.env-alice-web-80.loadbalancer.server.port")
            .map(String::as_str),
        Some("80")
    );
    assert_eq!(spec.labels.get(LABEL_OWNER).map(String::as_str), Some("alice"));
    assert_eq!(
        spec.labels.get(LABEL_DESCRIPTOR).map(String::as_str),
        Some(descriptor.id.to_string().as_str())
    );
    Ok(())
}

#[tokio::test]
async fn test_stop_with_failing_runtime_stop() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let runtime = MockRuntime::new();
    let controller = file_controller(&runtime, &temp_dir);

    let descriptor = controller.create_descriptor("alice", custom_fields("web"))?;
    let started = controller.start(descriptor.id, "alice").await?;
    let container_id = started.descriptor().container_id.clone();

    runtime.fail(MockOperation::StopContainer);
    let err = controller.stop(descriptor.id, "alice").await.unwrap_err();
    assert!(matches!(err, EnvHelperError::Runtime(RuntimeError::Cli(_))));

    let persisted = controller.store().get(descriptor.id)?;
    assert!(persisted.is_running);
    assert_eq!(persisted.container_id, container_id);

    // Once the runtime recovers the same record can be stopped
    runtime.recover(MockOperation::StopContainer);
    let outcome = controller.stop(descriptor.id, "alice").await?;
    assert!(matches!(outcome, StopOutcome::Stopped(_)));
    assert!(runtime.containers().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_start_stop_start_reuses_volume() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let runtime = MockRuntime::new();
    let controller = file_controller(&runtime, &temp_dir);

    let descriptor = controller.create_descriptor("alice", custom_fields("web"))?;
    controller.start(descriptor.id, "alice").await?;
    let stopped = controller.stop(descriptor.id, "alice").await?;
    assert!(!stopped.descriptor().is_running);
    assert!(stopped.descriptor().container_id.is_none());

    controller.start(descriptor.id, "alice").await?;
    assert_eq!(
        runtime.count_calls(|c| matches!(c, MockCall::CreateVolume(_))),
        1
    );
    assert_eq!(
        runtime.count_calls(|c| matches!(c, MockCall::CreateAndStart(_))),
        2
    );
    assert!(runtime.has_volume(&descriptor.volume_name));
    Ok(())
}

#[tokio::test]
async fn test_destroy_with_container_already_absent() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let runtime = MockRuntime::new();
    let controller = file_controller(&runtime, &temp_dir);

    let descriptor = controller.create_descriptor("alice", custom_fields("web"))?;
    let started = controller.start(descriptor.id, "alice").await?;
    runtime.add_volume("site_data");

    let container_id = started.descriptor().container_id.clone().unwrap();
    runtime.remove_container(&container_id).await?;

    let report = controller.destroy(descriptor.id, "alice").await?;
    assert!(!report.container_removed);
    assert!(report.primary_volume_removed);
    assert_eq!(report.removed_volumes, vec!["site_data".to_string()]);
    assert!(report.volume_errors.is_empty());

    assert!(runtime.volumes().is_empty());
    assert!(matches!(
        controller.store().get(descriptor.id),
        Err(EnvHelperError::Store(StoreError::NotFound { .. }))
    ));
    Ok(())
}

#[tokio::test]
async fn test_destroy_primary_volume_failure_is_reported() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let runtime = MockRuntime::new();
    let controller = file_controller(&runtime, &temp_dir);

    let descriptor = controller.create_descriptor("alice", custom_fields("web"))?;
    controller.start(descriptor.id, "alice").await?;
    runtime.add_volume("site_data");
    runtime.update_config(|config| {
        config
            .failing_volume_removals
            .insert(descriptor.volume_name.clone());
    });

    let report = controller.destroy(descriptor.id, "alice").await?;
    assert!(report.container_removed);
    assert!(!report.primary_volume_removed);
    assert_eq!(report.volume_errors.len(), 1);
    assert_eq!(report.volume_errors[0].volume, descriptor.volume_name);
    assert!(report.volume_errors[0].error.contains("in use"));

    // Later volumes and the record are still removed
    assert_eq!(report.removed_volumes, vec!["site_data".to_string()]);
    assert!(runtime.containers().is_empty());
    assert!(matches!(
        controller.store().get(descriptor.id),
        Err(EnvHelperError::Store(StoreError::NotFound { .. }))
    ));
    Ok(())
}

#[tokio::test]
async fn test_duplicate_name_is_rejected_per_owner() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let runtime = MockRuntime::new();
    let controller = file_controller(&runtime, &temp_dir);

    controller.create_descriptor("alice", custom_fields("web"))?;
    let err = controller
        .create_descriptor("alice", custom_fields("web"))
        .unwrap_err();
    assert!(matches!(
        err,
        EnvHelperError::Validation(ValidationError::Duplicate { .. })
    ));

    // Same name under another owner is fine
    controller.create_descriptor("bob", custom_fields("web"))?;
    assert_eq!(controller.list_descriptors("alice")?.len(), 1);
    assert_eq!(controller.list_descriptors("bob")?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_update_keeps_runtime_state() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let runtime = MockRuntime::new();
    let controller = file_controller(&runtime, &temp_dir);

    let descriptor = controller.create_descriptor("alice", custom_fields("web"))?;
    let started = controller.start(descriptor.id, "alice").await?;

    let updated = controller.update_descriptor(
        descriptor.id,
        "alice",
        DescriptorFields {
            description: Some("static site".to_string()),
            ports: Some("18081:80".to_string()),
            ..Default::default()
        },
    )?;

    assert_eq!(updated.description, "static site");
    assert_eq!(updated.ports, "18081:80");
    assert!(updated.is_running);
    assert_eq!(updated.container_id, started.descriptor().container_id);
    assert_eq!(updated.volume_name, descriptor.volume_name);
    assert_eq!(updated.created_at, descriptor.created_at);
    Ok(())
}

#[tokio::test]
async fn test_foreign_owner_cannot_operate() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let runtime = MockRuntime::new();
    let controller = file_controller(&runtime, &temp_dir);

    let descriptor = controller.create_descriptor("alice", custom_fields("web"))?;

    for result in [
        controller.start(descriptor.id, "mallory").await.map(|_| ()),
        controller.stop(descriptor.id, "mallory").await.map(|_| ()),
        controller.destroy(descriptor.id, "mallory").await.map(|_| ()),
    ] {
        assert!(matches!(
            result,
            Err(EnvHelperError::Store(StoreError::NotFound { .. }))
        ));
    }
    assert!(runtime.calls().is_empty());
    Ok(())
}

/// Store whose updates can be switched off to simulate a persistence failure
struct FlakyStore {
    inner: MemoryStore,
    fail_updates: AtomicBool,
}

impl DescriptorStore for FlakyStore {
    fn insert(&self, descriptor: EnvironmentDescriptor) -> envhelper_core::errors::Result<EnvironmentDescriptor> {
        self.inner.insert(descriptor)
    }

    fn get(&self, id: u64) -> envhelper_core::errors::Result<EnvironmentDescriptor> {
        self.inner.get(id)
    }

    fn list(&self) -> envhelper_core::errors::Result<Vec<EnvironmentDescriptor>> {
        self.inner.list()
    }

    fn update(
        &self,
        descriptor: &EnvironmentDescriptor,
    ) -> envhelper_core::errors::Result<EnvironmentDescriptor> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: "environments.json".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            }
            .into());
        }
        self.inner.update(descriptor)
    }

    fn delete(&self, id: u64) -> envhelper_core::errors::Result<()> {
        self.inner.delete(id)
    }
}

#[tokio::test]
async fn test_start_persist_failure_removes_container() -> Result<()> {
    let runtime = MockRuntime::new();
    let store = FlakyStore {
        inner: MemoryStore::new(),
        fail_updates: AtomicBool::new(false),
    };
    let controller = LifecycleController::new(&runtime, store, Settings::default());

    let descriptor = controller.create_descriptor("alice", custom_fields("web"))?;
    controller.store().fail_updates.store(true, Ordering::SeqCst);

    let err = controller.start(descriptor.id, "alice").await.unwrap_err();
    assert!(matches!(err, EnvHelperError::Store(StoreError::Io { .. })));
    assert!(runtime.containers().is_empty());
    assert!(!controller.store().get(descriptor.id)?.is_running);
    Ok(())
}
