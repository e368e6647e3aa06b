pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";
pub const DEFAULT_MAX_TOKENS: u32 = 2024;
pub const DEFAULT_CONFIG_PATH: &str = "config/client.toml";
pub const DEFAULT_SERVERS_FILE: &str = "server_config.json";
pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com";
pub const DEFAULT_API_PATH: &str = "/v1/messages";
pub const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const DEFAULT_API_VERSION: &str = "2023-06-01";
pub const DEFAULT_RESOURCE_SCHEME: &str = "papers";
pub const DEFAULT_LISTING_TOPIC: &str = "folders";
