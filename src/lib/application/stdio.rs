use super::dispatch::{ChatSession, Flow};
use crate::model::ModelProvider;
use std::io::Write;
use thiserror::Error;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum StdioError {
    #[error("stdin/stdout I/O error: {0}")]
    Io(#[from] std::io::Error),
}

enum Input {
    Line(Option<String>),
    Interrupted,
}

/// Runs the interactive loop on the process stdin and stdout.
pub async fn run<P: ModelProvider>(session: &ChatSession<P>) -> Result<(), StdioError> {
    let stdin = BufReader::new(io::stdin());
    let mut stdout = std::io::stdout();
    run_with(session, stdin, &mut stdout).await
}

/// Reads lines from `input` until `quit` or EOF. Errors from a single line are
/// printed and the loop continues.
pub async fn run_with<P, R, W>(
    session: &ChatSession<P>,
    input: R,
    out: &mut W,
) -> Result<(), StdioError>
where
    P: ModelProvider,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    print_banner(out)?;

    loop {
        prompt(out)?;
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line?),
            _ = tokio::signal::ctrl_c() => Input::Interrupted,
        };
        let line = match input {
            Input::Line(Some(line)) => line,
            Input::Line(None) => {
                writeln!(out)?;
                info!("Input closed, ending session");
                break;
            }
            Input::Interrupted => {
                writeln!(out, "\n(Line discarded. Type 'quit' to exit.)")?;
                continue;
            }
        };

        let result = tokio::select! {
            result = session.handle_line(&line, out) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };
        match result {
            Some(Ok(Flow::Continue)) => {}
            Some(Ok(Flow::Quit)) => {
                debug!("Quit requested");
                break;
            }
            Some(Err(err)) => {
                error!(error = %err, "Command failed");
                writeln!(out, "\nError: {}", err.user_message())?;
            }
            None => writeln!(out, "\nInterrupted.")?,
        }
    }

    out.flush()?;
    Ok(())
}

fn print_banner<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "\nMCP Chatbot Started!")?;
    writeln!(out, "Type your queries or 'quit' to exit.")?;
    writeln!(out, "Use @folders to see available topics")?;
    writeln!(out, "Use @<topic> to search papers in that topic")?;
    writeln!(out, "Use /prompts to list available prompts")?;
    writeln!(out, "Use /prompt <name> <arg1=value1> to execute a prompt")
}

fn prompt<W: Write>(out: &mut W) -> std::io::Result<()> {
    write!(out, "\nQuery: ")?;
    out.flush()
}
