pub mod app;
pub mod defaults;
pub mod error;
pub mod loader;
pub mod server;

pub use app::{AppConfig, ProviderSettings, ResourceSettings};
pub use error::ConfigError;
pub use loader::ensure_env_loaded;
pub use server::ServerConfig;
