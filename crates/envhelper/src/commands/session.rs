//! Shared command plumbing: settings, store, controller and output

use crate::cli::{CliContext, OutputFormat};
use crate::runtime_utils::create_runtime_from_context;
use anyhow::Result;
use envhelper_core::descriptor::EnvironmentDescriptor;
use envhelper_core::docker::CliRuntime;
use envhelper_core::errors::EnvHelperError;
use envhelper_core::lifecycle::LifecycleController;
use envhelper_core::settings::Settings;
use envhelper_core::store::JsonFileStore;
use serde::Serialize;
use tracing::debug;

pub type Controller = LifecycleController<CliRuntime, JsonFileStore>;

/// Load settings and apply CLI overrides
pub fn load_settings(context: &CliContext) -> Result<Settings> {
    let mut settings =
        Settings::load(context.settings.as_deref()).map_err(EnvHelperError::from)?;
    if let Some(store) = &context.store {
        settings.store_path = Some(store.clone());
    }
    Ok(settings)
}

/// Controller over the JSON store and the selected runtime
pub fn controller(context: &CliContext) -> Result<Controller> {
    let settings = load_settings(context)?;
    let store = JsonFileStore::new(settings.store_path());
    debug!("Using descriptor store {}", store.path().display());
    let runtime = create_runtime_from_context(context, &settings);
    Ok(LifecycleController::new(runtime, store, settings))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn status_label(descriptor: &EnvironmentDescriptor) -> &'static str {
    if descriptor.is_running {
        "running"
    } else {
        "stopped"
    }
}

/// Multi-line text rendering of one descriptor
pub fn render_descriptor(descriptor: &EnvironmentDescriptor) -> String {
    let mut lines = vec![
        format!("ID:          {}", descriptor.id),
        format!("Name:        {}", descriptor.name),
        format!("Type:        {}", descriptor.environment_type),
        format!("Status:      {}", status_label(descriptor)),
        format!("Image:       {}", descriptor.image),
        format!("Container:   {}", descriptor.container_name()),
        format!("Volume:      {}", descriptor.volume_name),
    ];
    if !descriptor.description.is_empty() {
        lines.insert(2, format!("Description: {}", descriptor.description));
    }
    if !descriptor.ports.is_empty() {
        lines.push(format!("Ports:       {}", descriptor.ports));
    }
    if let Some(port) = descriptor.ui_port() {
        lines.push(format!("UI port:     {}", port));
    }
    if let Some(id) = &descriptor.container_id {
        lines.push(format!("Container ID: {}", id));
    }
    lines.push(format!(
        "Created:     {}",
        descriptor.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines.join("\n")
}

/// Print a descriptor in the requested format
pub fn emit_descriptor(output: OutputFormat, descriptor: &EnvironmentDescriptor) -> Result<()> {
    match output {
        OutputFormat::Json => print_json(descriptor),
        OutputFormat::Text => {
            println!("{}", render_descriptor(descriptor));
            Ok(())
        }
    }
}
