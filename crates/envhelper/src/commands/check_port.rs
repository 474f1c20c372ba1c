//! Host port availability command

use super::session::{load_settings, print_json};
use crate::cli::{CliContext, OutputFormat};
use anyhow::Result;
use envhelper_core::ports::check_port;
use envhelper_core::store::JsonFileStore;
use tracing::instrument;

#[instrument(skip(context))]
pub async fn execute_check_port(context: &CliContext, port: i64, exclude: Option<u64>) -> Result<()> {
    let settings = load_settings(context)?;
    let store = JsonFileStore::new(settings.store_path());
    let check = check_port(&store, port, exclude).await?;

    match context.output {
        OutputFormat::Json => print_json(&check),
        OutputFormat::Text => {
            match &check.error {
                None => println!("Port {} is available", check.port),
                Some(message) => println!("{}", message),
            }
            Ok(())
        }
    }
}
