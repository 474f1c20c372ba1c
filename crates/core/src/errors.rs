//! Error types and handling
//!
//! Domain-specific error enums (validation, runtime, store, settings) are wrapped
//! in the main `EnvHelperError` enum for unified error handling. Callers that need
//! to react to a specific failure class (e.g. tolerating a missing container during
//! teardown) match on the wrapped variant.

use thiserror::Error;

/// Rejections of descriptor input. Always raised before any runtime call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A port entry could not be parsed
    #[error("Invalid port mapping '{token}': {reason}")]
    Ports { token: String, reason: String },

    /// A volume line is missing its `:` separator
    #[error("Invalid volume mapping '{line}': expected 'source:target'")]
    Volumes { line: String },

    /// An environment variable line could not be parsed
    #[error("Invalid environment variable line '{line}': {reason}")]
    EnvVars { line: String, reason: String },

    /// The descriptor name does not match the allowed character set
    #[error("Invalid environment name '{name}': must start with a letter or digit and contain only letters, digits, '_', '.' or '-'")]
    Name { name: String },

    /// The derived container name is not acceptable to the runtime
    #[error("Derived container name '{container_name}' is not a valid container name")]
    ContainerName { container_name: String },

    /// Another descriptor of the same owner already uses this name
    #[error("An environment named '{name}' already exists for owner '{owner}'")]
    Duplicate { name: String, owner: String },

    /// A required field is missing or empty
    #[error("Field '{field}' is required")]
    Required { field: String },

    /// Unknown environment type
    #[error("Unknown environment type '{value}'. Supported types: vscode, webtop, custom")]
    EnvironmentType { value: String },

    /// A port number outside of 1..=65535
    #[error("Port {port} is out of range (1-65535)")]
    PortRange { port: i64 },
}

/// Container runtime errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The runtime daemon cannot be reached or version-probed
    #[error("Runtime unavailable: {reason}")]
    Unavailable { reason: String },

    /// The referenced runtime object does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: ObjectKind, id: String },

    /// Any other runtime failure
    #[error("Runtime CLI error: {0}")]
    Cli(String),
}

/// Kind of runtime object referenced by a `RuntimeError::NotFound`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Container,
    Volume,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Container => write!(f, "Container"),
            Self::Volume => write!(f, "Volume"),
        }
    }
}

/// Descriptor store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// No descriptor with this id is visible to the caller
    #[error("Environment not found: {id}")]
    NotFound { id: u64 },

    /// Store file I/O error
    #[error("Failed to access descriptor store at {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Store file could not be (de)serialized
    #[error("Descriptor store at {path} is corrupt")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Settings file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Settings file parsing error
    #[error("Failed to parse settings file: {message}")]
    Parsing { message: String },

    /// Settings file I/O error
    #[error("Failed to read settings file")]
    Io(#[from] std::io::Error),

    /// Settings file not found
    #[error("Settings file not found: {path}")]
    NotFound { path: String },
}

/// Main error enum wrapping all domain-specific errors
#[derive(Error, Debug)]
pub enum EnvHelperError {
    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Container runtime errors
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// Descriptor store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Settings errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EnvHelperError {
    /// True when the runtime reported the target object as absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Runtime(RuntimeError::NotFound { .. }))
    }

    /// True when the runtime daemon could not be reached
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Runtime(RuntimeError::Unavailable { .. }))
    }
}

/// Convenience type alias for Results with EnvHelperError
pub type Result<T> = std::result::Result<T, EnvHelperError>;
