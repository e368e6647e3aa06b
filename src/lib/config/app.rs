use super::defaults::*;
use super::error::ConfigError;
use super::server::ServerConfig;
use std::path::{Path, PathBuf};

/// Client settings loaded from client.toml
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
    pub servers_file: PathBuf,
    pub provider: ProviderSettings,
    pub resources: ResourceSettings,
}

/// Where and how to reach the model service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub endpoint: String,
    pub api_path: String,
    pub api_key_env: String,
    pub api_version: String,
}

/// Resource shorthand (`@topic`) and router fallback settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSettings {
    pub scheme: String,
    pub listing_topic: String,
    /// Where `@<listing_topic>` points. Defaults to `<scheme>://<listing_topic>`.
    pub listing_uri: Option<String>,
    pub fallback_schemes: Vec<String>,
}

impl AppConfig {
    /// Load client settings. A missing file at the default location yields defaults;
    /// an explicitly requested file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        super::loader::load_app_config(path)
    }

    /// Load the backend launch specifications referenced by `servers_file`.
    pub fn load_servers(&self) -> Result<Vec<ServerConfig>, ConfigError> {
        super::loader::load_servers(&self.servers_file)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: None,
            servers_file: PathBuf::from(DEFAULT_SERVERS_FILE),
            provider: ProviderSettings::default(),
            resources: ResourceSettings::default(),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_path: DEFAULT_API_PATH.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_RESOURCE_SCHEME.to_string(),
            listing_topic: DEFAULT_LISTING_TOPIC.to_string(),
            listing_uri: None,
            fallback_schemes: vec![DEFAULT_RESOURCE_SCHEME.to_string()],
        }
    }
}
