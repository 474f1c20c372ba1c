//! Logging setup
//!
//! Text or JSON output chosen at runtime through arguments and environment
//! variables. All log output goes to stderr so stdout stays reserved for
//! command output.

use anyhow::Result;
use std::{io, sync::Once};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Initialize logging once per process; later calls are no-ops.
///
/// `format` is `"json"` for structured output, anything else for text. When
/// `None`, `ENVHELPER_LOG_FORMAT` decides. The filter comes from `ENVHELPER_LOG`,
/// falling back to `RUST_LOG` and then `info`.
///
/// ```rust
/// use envhelper_core::logging;
///
/// logging::init(Some("json")).expect("Failed to initialize logging");
/// ```
pub fn init(format: Option<&str>) -> Result<()> {
    INIT.call_once(|| {
        let filter = create_env_filter();

        // Determine format from parameter or environment variable
        let env_format = std::env::var("ENVHELPER_LOG_FORMAT").ok();
        let effective_format = format.or(env_format.as_deref()).unwrap_or("text");

        // text: no span events; json: NEW | CLOSE
        let span_events = span_events_for_format(effective_format);

        match effective_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .json()
                            .with_target(true)
                            .with_span_events(span_events)
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
            _ => {
                // Default to text format (including None, "text", or any other value)
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .with_target(true)
                            .with_span_events(span_events)
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
        }

        tracing::debug!("Logging initialized with format: {}", effective_format);
    });

    Ok(())
}

/// Create an EnvFilter based on environment variables
fn create_env_filter() -> EnvFilter {
    if let Ok(spec) = std::env::var("ENVHELPER_LOG") {
        EnvFilter::try_new(&spec).unwrap_or_else(|_| {
            tracing::warn!(
                "Invalid ENVHELPER_LOG specification '{}', using default 'info'",
                spec
            );
            EnvFilter::new("info")
        })
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Determine span lifecycle event configuration based on env var and format
fn span_events_for_format(format: &str) -> fmt::format::FmtSpan {
    use fmt::format::FmtSpan;

    if let Ok(raw) = std::env::var("ENVHELPER_LOG_SPAN_EVENTS") {
        let mut acc = FmtSpan::NONE;
        for token in raw.split(&[',', '|'][..]).map(|t| t.trim().to_lowercase()) {
            acc |= match token.as_str() {
                "none" => FmtSpan::NONE,
                "new" => FmtSpan::NEW,
                "close" => FmtSpan::CLOSE,
                "enter" => FmtSpan::ENTER,
                "exit" => FmtSpan::EXIT,
                "active" => FmtSpan::ACTIVE,
                "full" => FmtSpan::FULL,
                _ => FmtSpan::NONE,
            };
        }
        return acc;
    }

    match format {
        "json" => FmtSpan::NEW | FmtSpan::CLOSE,
        _ => FmtSpan::NONE,
    }
}

/// Whether [`init`] has run
pub fn is_initialized() -> bool {
    INIT.is_completed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmt::format::FmtSpan;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_init_multiple_calls_safe() {
        assert!(init(None).is_ok());
        assert!(init(Some("json")).is_ok());
        assert!(init(Some("invalid")).is_ok());
        assert!(is_initialized());
    }

    #[test]
    #[serial]
    fn test_env_filter_with_env_vars() {
        std::env::set_var("ENVHELPER_LOG", "envhelper_core=trace");
        let _filter = create_env_filter();
        std::env::set_var("ENVHELPER_LOG", "invalid_spec_@@[");
        let _filter = create_env_filter();
        std::env::remove_var("ENVHELPER_LOG");

        std::env::set_var("RUST_LOG", "warn");
        let _filter = create_env_filter();
        std::env::remove_var("RUST_LOG");
    }

    #[test]
    #[serial]
    fn test_span_events_defaults_and_override() {
        std::env::remove_var("ENVHELPER_LOG_SPAN_EVENTS");
        assert_eq!(span_events_for_format("text"), FmtSpan::NONE);
        assert_eq!(span_events_for_format("json"), FmtSpan::NEW | FmtSpan::CLOSE);

        std::env::set_var("ENVHELPER_LOG_SPAN_EVENTS", "enter, exit");
        assert_eq!(span_events_for_format("text"), FmtSpan::ENTER | FmtSpan::EXIT);
        std::env::remove_var("ENVHELPER_LOG_SPAN_EVENTS");
    }
}
