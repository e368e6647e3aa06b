use super::app::{AppConfig, ProviderSettings, ResourceSettings};
use super::defaults::DEFAULT_CONFIG_PATH;
use super::error::ConfigError;
use super::server::{RawServer, ServerConfig};
use dotenvy::from_filename;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::{debug, info};

static ENV_LOADER: Once = Once::new();

const SERVERS_KEY: &str = "mcpServers";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    model: Option<String>,
    max_tokens: Option<u32>,
    system_prompt: Option<String>,
    servers_file: Option<String>,
    provider: RawProvider,
    resources: RawResources,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawProvider {
    endpoint: Option<String>,
    api_path: Option<String>,
    api_key_env: Option<String>,
    api_version: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawResources {
    scheme: Option<String>,
    listing_topic: Option<String>,
    listing_uri: Option<String>,
    fallback_schemes: Option<Vec<String>>,
}

/// Loads `.env` and `config/.env` into the process environment once.
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        let _ = dotenvy::dotenv();
        let _ = from_filename("config/.env");
    });
}

pub fn load_app_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    ensure_env_loaded();
    if let Some(path) = path {
        return read_app_config(path);
    }
    match read_app_config(Path::new(DEFAULT_CONFIG_PATH)) {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound { .. }) => {
            info!("Client settings not found; using defaults");
            Ok(AppConfig::default())
        }
        Err(other) => Err(other),
    }
}

fn read_app_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading client settings");
    let content = read_file(path)?;
    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(build_app_config(parsed))
}

fn build_app_config(parsed: RawConfig) -> AppConfig {
    let defaults = AppConfig::default();
    let provider_defaults = ProviderSettings::default();
    let resource_defaults = ResourceSettings::default();

    let scheme = parsed.resources.scheme.unwrap_or(resource_defaults.scheme);
    let fallback_schemes = parsed
        .resources
        .fallback_schemes
        .unwrap_or_else(|| vec![scheme.clone()]);

    AppConfig {
        model: parsed.model.unwrap_or(defaults.model),
        max_tokens: parsed.max_tokens.unwrap_or(defaults.max_tokens),
        system_prompt: parsed
            .system_prompt
            .filter(|prompt| !prompt.trim().is_empty()),
        servers_file: parsed
            .servers_file
            .map(PathBuf::from)
            .unwrap_or(defaults.servers_file),
        provider: ProviderSettings {
            endpoint: parsed.provider.endpoint.unwrap_or(provider_defaults.endpoint),
            api_path: parsed.provider.api_path.unwrap_or(provider_defaults.api_path),
            api_key_env: parsed
                .provider
                .api_key_env
                .unwrap_or(provider_defaults.api_key_env),
            api_version: parsed
                .provider
                .api_version
                .unwrap_or(provider_defaults.api_version),
        },
        resources: ResourceSettings {
            scheme,
            listing_topic: parsed
                .resources
                .listing_topic
                .unwrap_or(resource_defaults.listing_topic),
            listing_uri: parsed
                .resources
                .listing_uri
                .filter(|uri| !uri.trim().is_empty()),
            fallback_schemes,
        },
    }
}

/// Read the `mcpServers` mapping, preserving the order entries appear in the file.
pub fn load_servers(path: &Path) -> Result<Vec<ServerConfig>, ConfigError> {
    debug!(path = %path.display(), "Reading server configuration");
    let content = read_file(path)?;
    let root: Value = serde_json::from_str(&content).map_err(|source| ConfigError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })?;
    parse_servers(path, root)
}

fn parse_servers(path: &Path, root: Value) -> Result<Vec<ServerConfig>, ConfigError> {
    let Value::Object(mut root) = root else {
        return Err(ConfigError::malformed(path, "top level must be a JSON object"));
    };

    let servers = match root.get_mut(SERVERS_KEY).map(Value::take) {
        None => return Ok(Vec::new()),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(ConfigError::malformed(
                path,
                format!("'{SERVERS_KEY}' must be an object"),
            ));
        }
    };

    servers
        .into_iter()
        .map(|(name, entry)| {
            let raw: RawServer = serde_json::from_value(entry).map_err(|err| {
                ConfigError::malformed(path, format!("server '{name}': {err}"))
            })?;
            Ok(raw.into_config(name))
        })
        .collect()
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}
