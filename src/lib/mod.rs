pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{bootstrap, chat, dispatch, registry, router, stdio, tooling};
pub use cli::Cli;
pub use config::AppConfig;
pub use domain::types;
pub use infrastructure::model;

use application::chat::ChatSettings;
use application::dispatch::{ChatSession, CommandParser};
use application::tooling::StdioLauncher;
use model::AnthropicClient;
use std::error::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    init_tracing();
    config::ensure_env_loaded();
    info!("Starting mcp-chatbot");
    debug!(
        config = ?cli.config,
        servers = ?cli.servers,
        model = ?cli.model,
        "CLI arguments parsed"
    );

    let mut app_config = AppConfig::load(cli.config.as_deref())?;
    apply_cli_overrides(&cli, &mut app_config);

    let mut stdout = std::io::stdout();
    let (registry, report) =
        match bootstrap::bootstrap(&app_config, &StdioLauncher, &mut stdout).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "Failed to initialize servers");
                eprintln!("Failed to initialize servers: {}", err.user_message());
                return Err(err.into());
            }
        };
    info!(
        connected = report.connected.len(),
        failed = report.failed.len(),
        tools = registry.tools().len(),
        prompts = registry.prompts().len(),
        "Bootstrap finished"
    );

    let provider = AnthropicClient::from_settings(&app_config.provider);
    let session = ChatSession::new(
        registry,
        provider,
        ChatSettings::from(&app_config),
        CommandParser::new(&app_config.resources),
    );

    let result = stdio::run(&session).await;
    session.shutdown().await;
    result?;
    info!("Session finished");
    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .init();
    });
}

fn apply_cli_overrides(cli: &Cli, config: &mut AppConfig) {
    if let Some(servers) = &cli.servers {
        info!(path = %servers.display(), "Overriding server file from CLI flag");
        config.servers_file = servers.clone();
    }
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(system) = &cli.system {
        config.system_prompt = Some(system.clone());
    }
}
