//! Descriptor commands: create, update, list, show
//!
//! None of these talk to the container runtime.

use super::session::{controller, emit_descriptor, print_json, status_label};
use crate::cli::{CliContext, OutputFormat};
use anyhow::Result;
use envhelper_core::descriptor::{DescriptorFields, EnvironmentDescriptor};
use tracing::instrument;

#[instrument(skip(context, fields), fields(owner = %context.owner))]
pub fn execute_create(context: &CliContext, fields: DescriptorFields) -> Result<()> {
    let controller = controller(context)?;
    let descriptor = controller.create_descriptor(&context.owner, fields)?;

    match context.output {
        OutputFormat::Json => print_json(&descriptor),
        OutputFormat::Text => {
            println!(
                "Created environment {} ({})",
                descriptor.id, descriptor.name
            );
            Ok(())
        }
    }
}

#[instrument(skip(context, fields), fields(owner = %context.owner))]
pub fn execute_update(context: &CliContext, id: u64, fields: DescriptorFields) -> Result<()> {
    let controller = controller(context)?;
    let descriptor = controller.update_descriptor(id, &context.owner, fields)?;

    match context.output {
        OutputFormat::Json => print_json(&descriptor),
        OutputFormat::Text => {
            println!("Updated environment {} ({})", descriptor.id, descriptor.name);
            if descriptor.is_running {
                println!("Restart the environment to apply configuration changes.");
            }
            Ok(())
        }
    }
}

#[instrument(skip(context), fields(owner = %context.owner))]
pub fn execute_list(context: &CliContext) -> Result<()> {
    let controller = controller(context)?;
    let descriptors = controller.list_descriptors(&context.owner)?;

    match context.output {
        OutputFormat::Json => print_json(&descriptors),
        OutputFormat::Text => {
            if descriptors.is_empty() {
                println!("No environments found.");
            } else {
                println!("{}", render_table(&descriptors));
            }
            Ok(())
        }
    }
}

#[instrument(skip(context), fields(owner = %context.owner))]
pub fn execute_show(context: &CliContext, id: u64) -> Result<()> {
    let controller = controller(context)?;
    let descriptor = controller.get_descriptor(id, &context.owner)?;
    emit_descriptor(context.output, &descriptor)
}

fn render_table(descriptors: &[EnvironmentDescriptor]) -> String {
    let name_width = descriptors
        .iter()
        .map(|d| d.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut lines = vec![format!(
        "{:<6} {:<name_width$} {:<8} {:<8} {}",
        "ID", "NAME", "TYPE", "STATUS", "UI PORT"
    )];
    for descriptor in descriptors {
        let ui_port = descriptor
            .ui_port()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!(
            "{:<6} {:<name_width$} {:<8} {:<8} {}",
            descriptor.id,
            descriptor.name,
            descriptor.environment_type.as_str(),
            status_label(descriptor),
            ui_port
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use envhelper_core::descriptor::EnvironmentType;

    #[test]
    fn test_render_table() {
        let mut descriptor = EnvironmentDescriptor::from_fields(
            "alice",
            DescriptorFields {
                name: Some("desktop".to_string()),
                environment_type: Some(EnvironmentType::Webtop),
                ..Default::default()
            },
        )
        .unwrap();
        descriptor.id = 3;

        let table = render_table(&[descriptor]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].starts_with("3 "));
        assert!(lines[1].contains("webtop"));
        assert!(lines[1].contains("stopped"));
        assert!(lines[1].ends_with("3000"));
    }
}
