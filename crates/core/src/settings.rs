//! Tool settings
//!
//! Settings come from an optional TOML file and a handful of environment
//! variables. Resolution order for the file: explicit path, `ENVHELPER_SETTINGS`,
//! then `settings.toml` in the platform config directory. A missing default
//! file is not an error; a missing explicit file is.
//!
//! ```toml
//! store_path = "/var/lib/envhelper/environments.json"
//! runtime = "podman"
//! network = "env-helper-network"
//!
//! [proxy]
//! domain = "dev.example.com"
//! tls = true
//! ```

use crate::errors::ConfigError;
use crate::runtime::RuntimeKind;
use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Network every environment container joins
pub const DEFAULT_NETWORK: &str = "env-helper-network";

/// Container path of the primary per-environment volume
pub const DEFAULT_CONFIG_MOUNT: &str = "/config";

/// Reverse-proxy routing options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Base domain for generated host rules
    pub domain: String,
    /// Proxy entrypoint name
    pub entrypoint: String,
    pub tls: bool,
    pub cert_resolver: String,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            entrypoint: "web".to_string(),
            tls: true,
            cert_resolver: "letsencrypt".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Descriptor store file; platform data dir when unset
    pub store_path: Option<PathBuf>,
    pub runtime: Option<RuntimeKind>,
    /// Runtime binary; defaults to the runtime's own name
    pub runtime_path: Option<String>,
    pub network: String,
    pub config_mount: String,
    /// Seconds the runtime waits before killing a stopping container
    pub stop_timeout: Option<u32>,
    pub proxy: ProxySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: None,
            runtime: None,
            runtime_path: None,
            network: DEFAULT_NETWORK.to_string(),
            config_mount: DEFAULT_CONFIG_MOUNT.to_string(),
            stop_timeout: None,
            proxy: ProxySettings::default(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "envhelper", "envhelper")
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parsing {
            message: e.to_string(),
        })
    }

    /// Read settings from a file that must exist
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Resolve, load and apply environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os("ENVHELPER_SETTINGS").map(PathBuf::from);

        let mut settings = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => {
                debug!("Loading settings from {}", path.display());
                Self::from_file(&path)?
            }
            None => match Self::default_settings_path() {
                Some(path) if path.exists() => {
                    debug!("Loading settings from {}", path.display());
                    Self::from_file(&path)?
                }
                _ => Self::default(),
            },
        };

        settings.apply_env_overrides();
        Ok(settings)
    }

    /// `ENVHELPER_STORE`, `ENVHELPER_RUNTIME`, `ENVHELPER_NETWORK` and `ENVHELPER_DOMAIN`
    pub fn apply_env_overrides(&mut self) {
        if let Some(store) = std::env::var_os("ENVHELPER_STORE") {
            self.store_path = Some(PathBuf::from(store));
        }
        if let Ok(runtime) = std::env::var("ENVHELPER_RUNTIME") {
            match runtime.parse() {
                Ok(kind) => self.runtime = Some(kind),
                Err(e) => warn!("Ignoring ENVHELPER_RUNTIME: {}", e),
            }
        }
        if let Ok(network) = std::env::var("ENVHELPER_NETWORK") {
            if !network.trim().is_empty() {
                self.network = network;
            }
        }
        if let Ok(domain) = std::env::var("ENVHELPER_DOMAIN") {
            if !domain.trim().is_empty() {
                self.proxy.domain = domain;
            }
        }
    }

    /// Effective store file
    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(Self::default_store_path)
    }

    pub fn default_store_path() -> PathBuf {
        match project_dirs() {
            Some(dirs) => dirs.data_dir().join("environments.json"),
            None => std::env::temp_dir()
                .join("envhelper")
                .join("environments.json"),
        }
    }

    pub fn default_settings_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("settings.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn clear_env() {
        for var in [
            "ENVHELPER_SETTINGS",
            "ENVHELPER_STORE",
            "ENVHELPER_RUNTIME",
            "ENVHELPER_NETWORK",
            "ENVHELPER_DOMAIN",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.network, "env-helper-network");
        assert_eq!(settings.config_mount, "/config");
        assert_eq!(settings.proxy.entrypoint, "web");
        assert_eq!(settings.proxy.cert_resolver, "letsencrypt");
        assert!(settings.proxy.tls);
        assert!(settings.store_path().ends_with("environments.json"));
    }

    #[test]
    fn test_parse_partial_toml() {
        let settings = Settings::from_toml_str(
            r#"
runtime = "podman"
stop_timeout = 5

[proxy]
domain = "dev.example.com"
"#,
        )
        .unwrap();

        assert_eq!(settings.runtime, Some(RuntimeKind::Podman));
        assert_eq!(settings.stop_timeout, Some(5));
        assert_eq!(settings.proxy.domain, "dev.example.com");
        assert_eq!(settings.proxy.entrypoint, "web");
        assert_eq!(settings.network, DEFAULT_NETWORK);
    }

    #[test]
    fn test_parse_invalid_toml() {
        assert!(matches!(
            Settings::from_toml_str("network = ["),
            Err(ConfigError::Parsing { .. })
        ));
        assert!(matches!(
            Settings::from_toml_str("runtime = \"lxc\""),
            Err(ConfigError::Parsing { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_load_explicit_missing_file() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("absent.toml");
        assert!(matches!(
            Settings::load(Some(&missing)),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_load_with_env_overrides() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        std::fs::write(&path, "network = \"from-file\"\n").unwrap();

        std::env::set_var("ENVHELPER_SETTINGS", &path);
        std::env::set_var("ENVHELPER_STORE", temp_dir.path().join("store.json"));
        std::env::set_var("ENVHELPER_DOMAIN", "example.org");
        std::env::set_var("ENVHELPER_RUNTIME", "podman");

        let settings = Settings::load(None).unwrap();
        clear_env();

        assert_eq!(settings.network, "from-file");
        assert_eq!(settings.proxy.domain, "example.org");
        assert_eq!(settings.runtime, Some(RuntimeKind::Podman));
        assert_eq!(settings.store_path(), temp_dir.path().join("store.json"));
    }
}
