use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "mcp-chatbot",
    version,
    about = "Interactive chatbot that routes model tool calls to MCP servers"
)]
pub struct Cli {
    /// Client settings file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Server launch file (JSON with an `mcpServers` object)
    #[arg(long)]
    pub servers: Option<PathBuf>,
    /// Model identifier sent to the model service
    #[arg(long)]
    pub model: Option<String>,
    /// System prompt for every query
    #[arg(long)]
    pub system: Option<String>,
}
