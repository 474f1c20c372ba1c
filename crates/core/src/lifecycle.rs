//! Environment lifecycle controller
//!
//! Reconciles a persisted descriptor with the container runtime. A descriptor is
//! either `Stopped` (`is_running == false`, no container id) or `Running`
//! (`is_running == true`, container id set); there is no persisted intermediate
//! state. Every operation validates its input before touching the runtime,
//! probes the runtime before doing any work, runs its runtime steps strictly in
//! sequence, and persists only after the runtime side succeeded.

use crate::descriptor::{DescriptorFields, EnvironmentDescriptor};
use crate::errors::{Result, StoreError, ValidationError};
use crate::naming::{self, ContainerIdentity};
use crate::runtime::{self, ContainerRuntime, ContainerSpec};
use crate::settings::Settings;
use crate::store::DescriptorStore;
use crate::translate::{self, VolumeMapping};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Result of a start request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "environment", rename_all = "snake_case")]
pub enum StartOutcome {
    Started(EnvironmentDescriptor),
    /// The descriptor was already running; nothing was done
    AlreadyRunning(EnvironmentDescriptor),
}

impl StartOutcome {
    pub fn descriptor(&self) -> &EnvironmentDescriptor {
        match self {
            Self::Started(d) | Self::AlreadyRunning(d) => d,
        }
    }
}

/// Result of a stop request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "environment", rename_all = "snake_case")]
pub enum StopOutcome {
    Stopped(EnvironmentDescriptor),
    /// The container had already disappeared; the record was marked stopped
    ContainerMissing(EnvironmentDescriptor),
    /// The descriptor was not running; nothing was done
    NotRunning(EnvironmentDescriptor),
}

impl StopOutcome {
    pub fn descriptor(&self) -> &EnvironmentDescriptor {
        match self {
            Self::Stopped(d) | Self::ContainerMissing(d) | Self::NotRunning(d) => d,
        }
    }
}

/// A volume that could not be removed during destroy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeFailure {
    pub volume: String,
    pub error: String,
}

/// What a destroy actually removed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DestroyReport {
    /// The descriptor as it was before deletion
    pub environment: EnvironmentDescriptor,
    pub container_removed: bool,
    pub primary_volume_removed: bool,
    pub removed_volumes: Vec<String>,
    /// Volumes that were already gone
    pub missing_volumes: Vec<String>,
    pub volume_errors: Vec<VolumeFailure>,
}

/// Drives start/stop/destroy for descriptors owned by callers
pub struct LifecycleController<R, S> {
    runtime: R,
    store: S,
    settings: Settings,
}

impl<R, S> LifecycleController<R, S>
where
    R: ContainerRuntime,
    S: DescriptorStore,
{
    pub fn new(runtime: R, store: S, settings: Settings) -> Self {
        Self {
            runtime,
            store,
            settings,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Validate and persist a new descriptor for `owner`
    #[instrument(skip(self, fields))]
    pub fn create_descriptor(
        &self,
        owner: &str,
        fields: DescriptorFields,
    ) -> Result<EnvironmentDescriptor> {
        let descriptor = EnvironmentDescriptor::from_fields(owner, fields)?;
        let stored = self.store.insert(descriptor)?;
        info!(
            descriptor_id = stored.id,
            name = %stored.name,
            volume = %stored.volume_name,
            "Environment created"
        );
        Ok(stored)
    }

    /// Apply caller edits to an owned descriptor. Runtime state is preserved;
    /// configuration changes take effect on the next start.
    #[instrument(skip(self, fields))]
    pub fn update_descriptor(
        &self,
        id: u64,
        owner: &str,
        fields: DescriptorFields,
    ) -> Result<EnvironmentDescriptor> {
        let mut descriptor = self.get_descriptor(id, owner)?;
        descriptor.apply(fields);
        let stored = self.store.update(&descriptor)?;
        info!(descriptor_id = id, "Environment updated");
        Ok(stored)
    }

    /// Load a descriptor; descriptors of other owners are reported as absent
    pub fn get_descriptor(&self, id: u64, owner: &str) -> Result<EnvironmentDescriptor> {
        let descriptor = self.store.get(id)?;
        if descriptor.owner != owner {
            debug!(descriptor_id = id, "Descriptor belongs to another owner");
            return Err(StoreError::NotFound { id }.into());
        }
        Ok(descriptor)
    }

    /// The owner's descriptors, newest first
    pub fn list_descriptors(&self, owner: &str) -> Result<Vec<EnvironmentDescriptor>> {
        self.store.list_for_owner(owner)
    }

    /// Runtime parameters for a descriptor
    pub fn container_spec(
        &self,
        descriptor: &EnvironmentDescriptor,
    ) -> std::result::Result<ContainerSpec, ValidationError> {
        let ports = descriptor.port_mappings()?;
        let env = descriptor.env_var_map()?;
        let volumes = descriptor.volume_mappings()?;

        let name = descriptor.container_name();
        naming::validate_container_name(&name)?;

        if descriptor.volume_name.is_empty() {
            return Err(ValidationError::Required {
                field: "volume_name".to_string(),
            });
        }

        let mut binds = vec![format!(
            "{}:{}:rw",
            descriptor.volume_name, self.settings.config_mount
        )];
        binds.extend(volumes.iter().map(VolumeMapping::bind_arg));

        let mut labels = naming::routing_labels(&name, &ports, &self.settings.proxy);
        labels.extend(ContainerIdentity::new(descriptor).labels());

        let non_empty = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };

        Ok(ContainerSpec {
            name,
            image: descriptor.image.clone(),
            ports,
            binds,
            env,
            restart_policy: descriptor.restart_policy().to_string(),
            labels,
            network: non_empty(&self.settings.network),
            cpu_limit: non_empty(&descriptor.cpu_limit),
            memory_limit: non_empty(&descriptor.memory_limit),
        })
    }

    /// `Stopped -> Running`
    #[instrument(skip(self))]
    pub async fn start(&self, id: u64, owner: &str) -> Result<StartOutcome> {
        let mut descriptor = self.get_descriptor(id, owner)?;
        if descriptor.is_running {
            info!(descriptor_id = id, "Environment already running");
            return Ok(StartOutcome::AlreadyRunning(descriptor));
        }

        let spec = self.container_spec(&descriptor)?;
        runtime::connect(&self.runtime).await?;

        self.ensure_volume(&descriptor.volume_name).await?;

        let container_id = self.runtime.create_and_start(&spec).await?;
        info!(
            descriptor_id = id,
            container_id = %container_id,
            container_name = %spec.name,
            "Container started"
        );

        descriptor.mark_running(container_id.clone());
        match self.store.update(&descriptor) {
            Ok(stored) => Ok(StartOutcome::Started(stored)),
            Err(e) => {
                warn!(
                    descriptor_id = id,
                    "Failed to persist running state, removing container {}: {}", container_id, e
                );
                self.discard_container(&container_id).await;
                Err(e)
            }
        }
    }

    /// `Running -> Stopped`
    #[instrument(skip(self))]
    pub async fn stop(&self, id: u64, owner: &str) -> Result<StopOutcome> {
        let mut descriptor = self.get_descriptor(id, owner)?;
        if !descriptor.is_running {
            info!(descriptor_id = id, "Environment is not running");
            return Ok(StopOutcome::NotRunning(descriptor));
        }

        runtime::connect(&self.runtime).await?;

        let target = self.container_ref(&descriptor);
        let removed = self.teardown_container(&target).await?;

        descriptor.mark_stopped();
        let stored = self.store.update(&descriptor)?;
        info!(descriptor_id = id, "Environment stopped");

        Ok(if removed {
            StopOutcome::Stopped(stored)
        } else {
            StopOutcome::ContainerMissing(stored)
        })
    }

    /// Tear down runtime objects, then delete the record.
    ///
    /// A container failure other than "not found" aborts with the descriptor
    /// intact. Volume failures are collected in the report and do not block
    /// deletion.
    #[instrument(skip(self))]
    pub async fn destroy(&self, id: u64, owner: &str) -> Result<DestroyReport> {
        let mut descriptor = self.get_descriptor(id, owner)?;
        runtime::connect(&self.runtime).await?;

        let environment = descriptor.clone();
        let mut container_removed = false;

        if descriptor.is_running {
            let target = self.container_ref(&descriptor);
            container_removed = self.teardown_container(&target).await?;

            descriptor.mark_stopped();
            self.store.update(&descriptor)?;
        }

        let mut removed_volumes = Vec::new();
        let mut missing_volumes = Vec::new();
        let mut volume_errors = Vec::new();

        let primary_volume_removed = if descriptor.volume_name.is_empty() {
            false
        } else {
            match self.runtime.remove_volume(&descriptor.volume_name).await {
                Ok(()) => {
                    info!(volume = %descriptor.volume_name, "Volume removed");
                    true
                }
                Err(e) if e.is_not_found() => {
                    warn!(volume = %descriptor.volume_name, "Volume not found");
                    false
                }
                Err(e) => {
                    warn!(volume = %descriptor.volume_name, "Failed to remove volume: {}", e);
                    volume_errors.push(VolumeFailure {
                        volume: descriptor.volume_name.clone(),
                        error: e.to_string(),
                    });
                    false
                }
            }
        };

        for volume in translate::referenced_volume_names(&descriptor.volumes) {
            if volume == descriptor.volume_name {
                continue;
            }
            match self.runtime.remove_volume(&volume).await {
                Ok(()) => {
                    info!(volume = %volume, "Additional volume removed");
                    removed_volumes.push(volume);
                }
                Err(e) if e.is_not_found() => {
                    warn!(volume = %volume, "Additional volume not found");
                    missing_volumes.push(volume);
                }
                Err(e) => {
                    warn!(volume = %volume, "Failed to remove additional volume: {}", e);
                    volume_errors.push(VolumeFailure {
                        volume,
                        error: e.to_string(),
                    });
                }
            }
        }

        self.store.delete(id)?;
        info!(descriptor_id = id, "Environment destroyed");

        Ok(DestroyReport {
            environment,
            container_removed,
            primary_volume_removed,
            removed_volumes,
            missing_volumes,
            volume_errors,
        })
    }

    /// Reference used to address the descriptor's container
    fn container_ref(&self, descriptor: &EnvironmentDescriptor) -> String {
        match &descriptor.container_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => {
                warn!(
                    descriptor_id = descriptor.id,
                    "Running descriptor has no container id, falling back to container name"
                );
                descriptor.container_name()
            }
        }
    }

    /// Get, stop and remove a container. Returns false when it was already gone.
    async fn teardown_container(&self, target: &str) -> Result<bool> {
        let info = match self.runtime.get_container(target).await {
            Ok(info) => info,
            Err(e) if e.is_not_found() => {
                warn!(container = %target, "Container not found");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        tolerate_missing(
            self.runtime
                .stop_container(&info.id, self.settings.stop_timeout)
                .await,
        )?;
        debug!(container_id = %info.id, "Container stopped");

        let removed = tolerate_missing(self.runtime.remove_container(&info.id).await)?;
        debug!(container_id = %info.id, "Container removed");
        Ok(removed)
    }

    async fn ensure_volume(&self, volume_name: &str) -> Result<()> {
        match self.runtime.get_volume(volume_name).await {
            Ok(_) => {
                debug!(volume = %volume_name, "Volume found");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!(volume = %volume_name, "Creating volume");
                self.runtime.create_volume(volume_name).await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn discard_container(&self, container_id: &str) {
        if let Err(e) = self.runtime.stop_container(container_id, Some(0)).await {
            warn!("Cleanup stop of {} failed: {}", container_id, e);
        }
        if let Err(e) = self.runtime.remove_container(container_id).await {
            warn!("Cleanup removal of {} failed: {}", container_id, e);
        }
    }
}

/// Map "not found" to `Ok(false)`, success to `Ok(true)`
fn tolerate_missing(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => {
            warn!("Container disappeared during teardown: {}", e);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
