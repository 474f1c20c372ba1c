use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use envhelper_core::descriptor::{DescriptorFields, EnvironmentType};
use envhelper_core::errors::{EnvHelperError, ValidationError};
use envhelper_core::runtime::RuntimeKind;
use std::path::PathBuf;

/// Runtime selection options
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum RuntimeOption {
    /// Docker runtime
    Docker,
    /// Podman runtime
    Podman,
}

impl From<RuntimeOption> for RuntimeKind {
    fn from(runtime: RuntimeOption) -> Self {
        match runtime {
            RuntimeOption::Docker => RuntimeKind::Docker,
            RuntimeOption::Podman => RuntimeKind::Podman,
        }
    }
}

/// Environment type options
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum EnvironmentTypeOption {
    /// VS Code in the browser
    Vscode,
    /// Full desktop in the browser
    Webtop,
    /// Any image, no defaults beyond TZ
    Custom,
}

impl From<EnvironmentTypeOption> for EnvironmentType {
    fn from(option: EnvironmentTypeOption) -> Self {
        match option {
            EnvironmentTypeOption::Vscode => EnvironmentType::Vscode,
            EnvironmentTypeOption::Webtop => EnvironmentType::Webtop,
            EnvironmentTypeOption::Custom => EnvironmentType::Custom,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum OutputFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Log format options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Log level options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    /// Error messages only
    Error,
    /// Warning and error messages
    Warn,
    /// Informational messages and above
    Info,
    /// Debug messages and above
    Debug,
    /// All messages including trace
    Trace,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Global options shared by all subcommands
#[derive(Debug, Clone)]
pub struct CliContext {
    /// Caller identity that owns descriptors
    pub owner: String,
    /// Descriptor store override
    pub store: Option<PathBuf>,
    /// Settings file path
    pub settings: Option<PathBuf>,
    /// Container runtime selection
    pub runtime: Option<RuntimeKind>,
    /// Runtime binary override
    pub runtime_path: Option<String>,
    pub output: OutputFormat,
}

/// Descriptor fields accepted by `create` and `update`
#[derive(Debug, Clone, Default, Args)]
pub struct DescriptorArgs {
    /// Free-form description
    #[arg(long)]
    pub description: Option<String>,
    /// Container image (required for custom environments)
    #[arg(long)]
    pub image: Option<String>,
    /// Port mappings as comma-separated hostPort:containerPort pairs
    #[arg(long, value_name = "LIST")]
    pub ports: Option<String>,
    /// Additional volume (format: source:target, can be repeated)
    #[arg(long = "volume", value_name = "SOURCE:TARGET")]
    pub volumes: Vec<String>,
    /// Environment variable (format: KEY=value, can be repeated)
    #[arg(long = "env", short = 'e', value_name = "KEY=VALUE")]
    pub env_vars: Vec<String>,
    /// CPU limit, e.g. 1.5
    #[arg(long)]
    pub cpu_limit: Option<String>,
    /// Memory limit, e.g. 2g
    #[arg(long)]
    pub memory_limit: Option<String>,
    /// Restart the container automatically unless stopped
    #[arg(long, value_name = "BOOL")]
    pub auto_start: Option<bool>,
}

impl DescriptorArgs {
    /// Descriptor fields; repeated volume/env flags become newline-separated text
    pub fn into_fields(self) -> DescriptorFields {
        let join = |lines: Vec<String>| (!lines.is_empty()).then(|| lines.join("\n"));
        DescriptorFields {
            description: self.description,
            image: self.image,
            ports: self.ports,
            volumes: join(self.volumes),
            env_vars: join(self.env_vars),
            cpu_limit: self.cpu_limit,
            memory_limit: self.memory_limit,
            auto_start: self.auto_start,
            ..Default::default()
        }
    }
}

/// env_helper subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a new environment descriptor
    Create {
        /// Environment name (letters, digits, '_', '.' and '-')
        name: String,
        /// Environment type; its defaults fill every field left unset
        #[arg(long = "type", value_enum, default_value = "vscode")]
        environment_type: EnvironmentTypeOption,
        #[command(flatten)]
        fields: DescriptorArgs,
    },

    /// Edit an existing environment; changes apply on next start
    Update {
        id: u64,
        /// New environment name
        #[arg(long)]
        name: Option<String>,
        /// New environment type
        #[arg(long = "type", value_enum)]
        environment_type: Option<EnvironmentTypeOption>,
        #[command(flatten)]
        fields: DescriptorArgs,
    },

    /// List your environments, newest first
    List,

    /// Show one environment
    Show { id: u64 },

    /// Start an environment's container
    Start { id: u64 },

    /// Stop and remove an environment's container
    Stop { id: u64 },

    /// Remove an environment with its container and volumes
    Delete { id: u64 },

    /// Check whether a host port is free
    CheckPort {
        #[arg(allow_negative_numbers = true)]
        port: i64,
        /// Ignore this environment's own ports
        #[arg(long, value_name = "ID")]
        exclude: Option<u64>,
    },
}

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "Development environment helper",
    long_about = "Development environment helper\n\nCreates browser-accessible development environments and runs them as containers behind a reverse proxy.",
    color = clap::ColorChoice::Auto
)]
pub struct Cli {
    /// Log format (text or json, defaults to text, can be set via ENVHELPER_LOG_FORMAT env var)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log level
    #[arg(long, global = true, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Owner identity (defaults to ENVHELPER_OWNER, then USER)
    #[arg(long, global = true, env = "ENVHELPER_OWNER")]
    pub owner: Option<String>,

    /// Descriptor store file
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Settings file path
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Container runtime to use (docker or podman, can be set via ENVHELPER_RUNTIME env var)
    #[arg(long, global = true, value_enum)]
    pub runtime: Option<RuntimeOption>,

    /// Path to the runtime executable
    #[arg(long, global = true, value_name = "PATH")]
    pub runtime_path: Option<String>,

    /// Output format for command results
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Resolve the owner from the flag, `ENVHELPER_OWNER` or `USER`
    fn resolve_owner(&self) -> Result<String, ValidationError> {
        self.owner
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .map(|owner| owner.trim().to_string())
            .filter(|owner| !owner.is_empty())
            .ok_or_else(|| ValidationError::Required {
                field: "owner".to_string(),
            })
    }

    /// Extract global options into CliContext
    pub fn context(&self) -> Result<CliContext> {
        Ok(CliContext {
            owner: self.resolve_owner().map_err(EnvHelperError::from)?,
            store: self.store.clone(),
            settings: self.settings.clone(),
            runtime: self.runtime.map(|r| r.into()),
            runtime_path: self.runtime_path.clone(),
            output: self.output,
        })
    }

    /// Initialize logging, then run the selected subcommand
    pub async fn dispatch(mut self) -> Result<()> {
        let log_format = match self.log_format {
            Some(LogFormat::Text) => Some("text"),
            Some(LogFormat::Json) => Some("json"),
            None => None,
        };
        let log_level = self.log_level.as_str();

        if std::env::var_os("ENVHELPER_LOG").is_none() && std::env::var_os("RUST_LOG").is_none() {
            std::env::set_var(
                "RUST_LOG",
                format!("envhelper={},envhelper_core={}", log_level, log_level),
            );
        }
        envhelper_core::logging::init(log_format)?;
        tracing::debug!("CLI initialized with log level: {}", log_level);

        let Some(command) = self.command.take() else {
            println!("Development environment helper");
            println!("Run 'envhelper --help' to see available commands.");
            return Ok(());
        };

        let context = self.context()?;
        use crate::commands::{check_port, environments, lifecycle};

        match command {
            Commands::Create {
                name,
                environment_type,
                fields,
            } => {
                let fields = DescriptorFields {
                    name: Some(name),
                    environment_type: Some(environment_type.into()),
                    ..fields.into_fields()
                };
                environments::execute_create(&context, fields)
            }
            Commands::Update {
                id,
                name,
                environment_type,
                fields,
            } => {
                let fields = DescriptorFields {
                    name,
                    environment_type: environment_type.map(Into::into),
                    ..fields.into_fields()
                };
                environments::execute_update(&context, id, fields)
            }
            Commands::List => environments::execute_list(&context),
            Commands::Show { id } => environments::execute_show(&context, id),
            Commands::Start { id } => lifecycle::execute_start(&context, id).await,
            Commands::Stop { id } => lifecycle::execute_stop(&context, id).await,
            Commands::Delete { id } => lifecycle::execute_delete(&context, id).await,
            Commands::CheckPort { port, exclude } => {
                check_port::execute_check_port(&context, port, exclude).await
            }
        }
    }
}
