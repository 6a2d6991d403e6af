use crate::config::error::{ConfigError, Result};
use crate::policy::{PolicyOverride, PolicyTable};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "MODELGATE";

/// Root gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the inference API; the model key is appended as a path
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the environment variable holding the API token
    #[serde(default = "default_api_token_env")]
    pub api_token_env: String,

    /// Per-request HTTP timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Ask the provider to hold the request until the model is loaded
    #[serde(default)]
    pub wait_for_model: bool,

    /// Per-category retry policy overrides (`default` targets the fallback row).
    /// Fields left unset keep the builtin value.
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyOverride>,
}

// Default value functions
fn default_endpoint() -> String {
    "https://api-inference.huggingface.co/models".to_string()
}
fn default_api_token_env() -> String {
    "HF_API_TOKEN".to_string()
}
fn default_request_timeout_ms() -> u64 {
    120_000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_token_env: default_api_token_env(),
            request_timeout_ms: default_request_timeout_ms(),
            wait_for_model: false,
            policies: BTreeMap::new(),
        }
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Effective policy table: builtin rows with configured overrides applied
    pub fn policy_table(&self) -> Result<PolicyTable> {
        PolicyTable::from_overrides(&self.policies)
    }

    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::ValidationError(
                "endpoint must not be empty".to_string(),
            ));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "endpoint must be an http(s) URL, got '{endpoint}'"
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.api_token_env.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "api_token_env must not be empty".to_string(),
            ));
        }
        self.policy_table().map(|_| ())
    }
}

/// Configuration loader with layered merging support
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new ConfigLoader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration with layered merging:
    /// 1. Start with defaults (from Default implementations)
    /// 2. Merge config file if provided
    /// 3. Override with environment variables (MODELGATE_ prefix)
    pub fn load(&self) -> Result<GatewayConfig> {
        let mut builder = Config::builder();

        // Layer 1: Defaults
        let defaults_json = serde_json::to_string(&GatewayConfig::default())?;
        builder = builder.add_source(File::from_str(&defaults_json, config::FileFormat::Json));

        // Layer 2: Config file (if provided)
        if let Some(ref path) = self.config_path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            builder = builder.add_source(File::from(path.as_ref()));
        }

        // Layer 3: Environment variables, double underscore for nesting
        // Example: MODELGATE_POLICIES__TEXT__MAX_RETRIES=2
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: GatewayConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            endpoint = %config.endpoint,
            overrides = config.policies.len(),
            "Loaded gateway configuration"
        );
        Ok(config)
    }

    /// Locate the default config file in standard locations:
    /// 1. Current directory: ./modelgate.toml
    /// 2. XDG config: ~/.config/modelgate/config.toml
    /// 3. Home directory: ~/.modelgate.toml
    pub fn find_config_file() -> Option<PathBuf> {
        let cwd_config = PathBuf::from("./modelgate.toml");
        if cwd_config.exists() {
            return Some(cwd_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("modelgate").join("config.toml");
            if xdg_config.exists() {
                return Some(xdg_config);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".modelgate.toml");
            if home_config.exists() {
                return Some(home_config);
            }
        }

        None
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<GatewayConfig> {
        let loader = match Self::find_config_file() {
            Some(config_path) => ConfigLoader::new().with_file(config_path),
            None => ConfigLoader::new(),
        };

        loader.load()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
