use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::{Money, RoleRef};

pub const CONFIG_FILE_STEM: &str = "approval-chain";
pub const ENV_PREFIX: &str = "APPROVAL_CHAIN";

/// Main configuration structure for the approval chain
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApprovalChainConfig {
    /// Workflow rules
    pub workflow: WorkflowConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Database settings (optional)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Case totals at or below this amount (minor units) skip the high-authority gate
    pub high_authority_threshold: Money,
    /// Role whose gate the threshold rule drops, by id or name
    pub high_authority_role: RoleRef,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Default log directive when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for ApprovalChainConfig {
    fn default() -> Self {
        Self {
            workflow: WorkflowConfig {
                high_authority_threshold: Money(1_000_000),
                high_authority_role: RoleRef::Name("Director".to_string()),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json: true,
            },
            database: None,
        }
    }
}

impl ApprovalChainConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. approval-chain.toml in the working directory
    /// 3. Environment variables (prefixed with APPROVAL_CHAIN__)
    pub fn load() -> Result<Self> {
        let file = format!("{CONFIG_FILE_STEM}.toml");
        Self::build(Path::new(&file).exists().then_some(Path::new(&file)))
    }

    /// Load from an explicit file, still layered over defaults and environment
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Configuration file {} does not exist", path.display());
        }
        Self::build(Some(path))
    }

    fn build(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<ApprovalChainConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = ApprovalChainConfig::load_env_file();
        ApprovalChainConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static ApprovalChainConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
