//! Runtime-backed commands: start, stop, delete

use super::session::{controller, print_json};
use crate::cli::{CliContext, OutputFormat};
use crate::runtime_utils::check_forced_unavailable;
use anyhow::Result;
use envhelper_core::lifecycle::{StartOutcome, StopOutcome};
use tracing::instrument;

#[instrument(skip(context), fields(owner = %context.owner))]
pub async fn execute_start(context: &CliContext, id: u64) -> Result<()> {
    check_forced_unavailable()?;
    let controller = controller(context)?;
    let outcome = controller.start(id, &context.owner).await?;

    match context.output {
        OutputFormat::Json => print_json(&outcome),
        OutputFormat::Text => {
            let descriptor = outcome.descriptor();
            match &outcome {
                StartOutcome::Started(_) => println!(
                    "Started environment {} ({})",
                    descriptor.id, descriptor.name
                ),
                StartOutcome::AlreadyRunning(_) => println!(
                    "Environment {} ({}) is already running",
                    descriptor.id, descriptor.name
                ),
            }
            if let Some(port) = descriptor.ui_port() {
                println!("UI available on host port {}", port);
            }
            Ok(())
        }
    }
}

#[instrument(skip(context), fields(owner = %context.owner))]
pub async fn execute_stop(context: &CliContext, id: u64) -> Result<()> {
    check_forced_unavailable()?;
    let controller = controller(context)?;
    let outcome = controller.stop(id, &context.owner).await?;

    match context.output {
        OutputFormat::Json => print_json(&outcome),
        OutputFormat::Text => {
            let descriptor = outcome.descriptor();
            match &outcome {
                StopOutcome::Stopped(_) => println!(
                    "Stopped environment {} ({})",
                    descriptor.id, descriptor.name
                ),
                StopOutcome::ContainerMissing(_) => println!(
                    "Environment {} ({}) had no container; marked as stopped",
                    descriptor.id, descriptor.name
                ),
                StopOutcome::NotRunning(_) => println!(
                    "Environment {} ({}) is not running",
                    descriptor.id, descriptor.name
                ),
            }
            Ok(())
        }
    }
}

#[instrument(skip(context), fields(owner = %context.owner))]
pub async fn execute_delete(context: &CliContext, id: u64) -> Result<()> {
    check_forced_unavailable()?;
    let controller = controller(context)?;
    let report = controller.destroy(id, &context.owner).await?;

    match context.output {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            println!(
                "Deleted environment {} ({})",
                report.environment.id, report.environment.name
            );
            for failure in &report.volume_errors {
                eprintln!(
                    "Warning: volume {} was not removed: {}",
                    failure.volume, failure.error
                );
            }
            Ok(())
        }
    }
}
