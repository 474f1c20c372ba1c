//! Runtime utilities for creating container runtimes from CLI context

use crate::cli::CliContext;
use envhelper_core::docker::CliRuntime;
use envhelper_core::errors::{EnvHelperError, RuntimeError};
use envhelper_core::runtime::RuntimeFactory;
use envhelper_core::settings::Settings;
use tracing::debug;

/// Setting this to `1` makes every runtime-backed command fail as unreachable
pub const FORCE_UNAVAILABLE_ENV: &str = "ENVHELPER_FORCE_RUNTIME_UNAVAILABLE";

/// Create a runtime instance from the CLI context and loaded settings
pub fn create_runtime_from_context(context: &CliContext, settings: &Settings) -> CliRuntime {
    let kind = RuntimeFactory::detect_runtime(context.runtime, settings.runtime);
    let runtime_path = context
        .runtime_path
        .clone()
        .or_else(|| settings.runtime_path.clone());
    debug!("Using {} runtime", kind);
    RuntimeFactory::create_runtime(kind, runtime_path)
}

/// Fail early when the runtime has been forced unavailable
pub fn check_forced_unavailable() -> Result<(), EnvHelperError> {
    match std::env::var(FORCE_UNAVAILABLE_ENV) {
        Ok(value) if value == "1" || value.eq_ignore_ascii_case("true") => {
            Err(RuntimeError::Unavailable {
                reason: format!("forced by {}", FORCE_UNAVAILABLE_ENV),
            }
            .into())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use envhelper_core::runtime::{ContainerRuntime, RuntimeKind};
    use serial_test::serial;

    fn context(runtime: Option<RuntimeKind>, runtime_path: Option<&str>) -> CliContext {
        CliContext {
            owner: "alice".to_string(),
            store: None,
            settings: None,
            runtime,
            runtime_path: runtime_path.map(str::to_string),
            output: OutputFormat::Text,
        }
    }

    #[test]
    #[serial]
    fn test_create_runtime_from_context() {
        std::env::remove_var("ENVHELPER_RUNTIME");
        let settings = Settings::default();

        let runtime = create_runtime_from_context(&context(None, None), &settings);
        assert_eq!(runtime.runtime_name(), "docker");

        let runtime = create_runtime_from_context(&context(Some(RuntimeKind::Podman), None), &settings);
        assert_eq!(runtime.runtime_name(), "podman");
        assert_eq!(runtime.runtime_path(), "podman");
    }

    #[test]
    #[serial]
    fn test_runtime_path_flag_beats_settings() {
        std::env::remove_var("ENVHELPER_RUNTIME");
        let settings = Settings {
            runtime: Some(RuntimeKind::Podman),
            runtime_path: Some("/usr/bin/podman".to_string()),
            ..Default::default()
        };

        let runtime = create_runtime_from_context(&context(None, None), &settings);
        assert_eq!(runtime.runtime_path(), "/usr/bin/podman");

        let runtime = create_runtime_from_context(&context(None, Some("/opt/podman")), &settings);
        assert_eq!(runtime.runtime_name(), "podman");
        assert_eq!(runtime.runtime_path(), "/opt/podman");
    }

    #[test]
    #[serial]
    fn test_check_forced_unavailable() {
        std::env::remove_var(FORCE_UNAVAILABLE_ENV);
        assert!(check_forced_unavailable().is_ok());

        std::env::set_var(FORCE_UNAVAILABLE_ENV, "1");
        let err = check_forced_unavailable().unwrap_err();
        std::env::remove_var(FORCE_UNAVAILABLE_ENV);
        assert!(err.is_unavailable());
    }
}
