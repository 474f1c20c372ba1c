use anyhow::Result;
use clap::Parser;
use envhelper_core::errors::EnvHelperError;

mod cli;
mod commands;
mod runtime_utils;

#[tokio::main]
async fn main() -> Result<()> {
    let parsed = cli::Cli::parse();

    match parsed.dispatch().await {
        Ok(()) => Ok(()),
        Err(err) => {
            if let Some(core_error) = err.downcast_ref::<EnvHelperError>() {
                // 2: rejected input, 3: runtime unreachable
                if matches!(core_error, EnvHelperError::Validation(_)) {
                    eprintln!("Error: {}", core_error);
                    std::process::exit(2);
                }
                if core_error.is_unavailable() {
                    eprintln!("Error: {}", core_error);
                    std::process::exit(3);
                }
            }

            Err(err)
        }
    }
}
