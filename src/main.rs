use clap::Parser;
use mcp_chatbot::Cli;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    mcp_chatbot::run(cli).await
}
