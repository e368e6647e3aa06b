//! Interactive command handling.
//!
//! [`CommandParser`] classifies a line; [`ChatSession`] carries the registry,
//! the model client and settings, and executes what the line asked for.

use super::chat::{ChatError, ChatSettings, ConversationDriver, QueryOutcome};
use super::registry::ConnectionRegistry;
use super::tooling::BackendError;
use crate::config::ResourceSettings;
use crate::model::ModelProvider;
use crate::types::ResourceContent;
use std::collections::BTreeMap;
use std::io::{self, Write};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Blank input, ignored.
    Empty,
    Quit,
    /// `@<topic>`, already expanded to a URI.
    Resource { uri: String },
    ListPrompts,
    Prompt {
        name: String,
        arguments: BTreeMap<String, String>,
    },
    /// `/prompt` without a name.
    PromptUsage,
    Unknown(String),
    Query(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParser {
    scheme: String,
    listing_topic: String,
    listing_uri: String,
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new(&ResourceSettings::default())
    }
}

impl CommandParser {
    pub fn new(settings: &ResourceSettings) -> Self {
        let scheme = settings.scheme.trim_end_matches("://").to_string();
        let listing_uri = settings
            .listing_uri
            .clone()
            .unwrap_or_else(|| format!("{scheme}://{}", settings.listing_topic));
        Self {
            scheme,
            listing_topic: settings.listing_topic.clone(),
            listing_uri,
        }
    }

    pub fn parse(&self, line: &str) -> Command {
        let input = line.trim();
        if input.is_empty() {
            return Command::Empty;
        }
        if input.eq_ignore_ascii_case("quit") {
            return Command::Quit;
        }
        if let Some(topic) = input.strip_prefix('@') {
            return Command::Resource {
                uri: self.resource_uri(topic),
            };
        }
        if input.starts_with('/') {
            return parse_slash_command(input);
        }
        Command::Query(input.to_string())
    }

    /// The listing topic maps to the listing URI; any other topic is qualified
    /// with the resource scheme as written.
    pub fn resource_uri(&self, topic: &str) -> String {
        if topic == self.listing_topic {
            return self.listing_uri.clone();
        }
        format!("{}://{}", self.scheme, topic)
    }
}

fn parse_slash_command(input: &str) -> Command {
    let mut tokens = input.split_whitespace();
    let Some(command) = tokens.next() else {
        return Command::Empty;
    };
    match command.to_ascii_lowercase().as_str() {
        "/prompts" => Command::ListPrompts,
        "/prompt" => match tokens.next() {
            Some(name) => Command::Prompt {
                name: name.to_string(),
                arguments: parse_prompt_arguments(tokens),
            },
            None => Command::PromptUsage,
        },
        _ => Command::Unknown(command.to_string()),
    }
}

/// `key=value` tokens; later duplicates win and tokens without `=` are dropped.
pub fn parse_prompt_arguments<'a>(tokens: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, String> {
    tokens
        .into_iter()
        .filter_map(|token| token.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{kind} '{key}' not found.")]
    NotFound { kind: &'static str, key: String },
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error("prompt '{name}' returned no messages")]
    EmptyPrompt { name: String },
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Backend(err) => err.user_message(),
            SessionError::Chat(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

/// Whether the interactive loop should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Context object for one interactive session. Built once after bootstrap
/// and passed by reference to the input loop.
pub struct ChatSession<P: ModelProvider> {
    registry: ConnectionRegistry,
    provider: P,
    settings: ChatSettings,
    parser: CommandParser,
}

impl<P: ModelProvider> ChatSession<P> {
    pub fn new(
        registry: ConnectionRegistry,
        provider: P,
        settings: ChatSettings,
        parser: CommandParser,
    ) -> Self {
        Self {
            registry,
            provider,
            settings,
            parser,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn parser(&self) -> &CommandParser {
        &self.parser
    }

    pub async fn handle_line<W: Write>(&self, line: &str, out: &mut W) -> Result<Flow, SessionError> {
        let command = self.parser.parse(line);
        debug!(command = ?command, "Dispatching input");
        match command {
            Command::Empty => {}
            Command::Quit => return Ok(Flow::Quit),
            Command::Resource { uri } => self.fetch_resource(&uri, out).await?,
            Command::ListPrompts => self.list_prompts(out)?,
            Command::Prompt { name, arguments } => {
                self.execute_prompt(&name, &arguments, out).await?;
            }
            Command::PromptUsage => {
                writeln!(out, "Usage: /prompt <name> <arg1=value1> <arg2=value2>")?;
            }
            Command::Unknown(command) => writeln!(out, "Unknown command: {command}")?,
            Command::Query(query) => {
                self.process_query(&query, out).await?;
            }
        }
        Ok(Flow::Continue)
    }

    pub async fn process_query<W: Write>(
        &self,
        query: &str,
        out: &mut W,
    ) -> Result<QueryOutcome, ChatError> {
        writeln!(out)?;
        ConversationDriver::new(&self.provider, &self.registry, &self.settings)
            .process_query(query, out)
            .await
    }

    /// Prints the first content item of `uri`. Routing and backend failures are
    /// reported on `out`; only write failures are returned.
    pub async fn fetch_resource<W: Write>(&self, uri: &str, out: &mut W) -> io::Result<()> {
        let Some(backend) = self.registry.resolve_resource(uri) else {
            writeln!(out, "Resource '{uri}' not found.")?;
            return Ok(());
        };

        info!(uri, server = backend.name(), "Reading resource");
        match backend.read_resource(uri).await {
            Ok(contents) => match contents.first() {
                Some(content) => {
                    writeln!(out, "\nResource: {uri}")?;
                    writeln!(out, "Content:")?;
                    writeln!(out, "{}", render_resource(content))?;
                }
                None => writeln!(out, "No content available.")?,
            },
            Err(err) => {
                warn!(uri, error = %err, "Resource read failed");
                writeln!(out, "Error: {}", err.user_message())?;
            }
        }
        Ok(())
    }

    pub fn list_prompts<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let prompts = self.registry.prompts();
        if prompts.is_empty() {
            return writeln!(out, "No prompts available.");
        }

        writeln!(out, "\nAvailable prompts:")?;
        for prompt in prompts {
            writeln!(out, "- {}: {}", prompt.name, prompt.description)?;
            if !prompt.arguments.is_empty() {
                writeln!(out, "  Arguments:")?;
                for argument in &prompt.arguments {
                    writeln!(out, "    - {}", argument.name)?;
                }
            }
        }
        Ok(())
    }

    /// Materializes the prompt and runs its first message as a query.
    pub async fn execute_prompt<W: Write>(
        &self,
        name: &str,
        arguments: &BTreeMap<String, String>,
        out: &mut W,
    ) -> Result<QueryOutcome, SessionError> {
        let backend = self
            .registry
            .resolve_capability(name)
            .ok_or_else(|| SessionError::NotFound {
                kind: "Prompt",
                key: name.to_string(),
            })?;

        info!(prompt = name, server = backend.name(), args = arguments.len(), "Fetching prompt");
        let result = backend.get_prompt(name, arguments).await?;
        let text = result
            .messages
            .first()
            .map(|message| message.content.to_text())
            .ok_or_else(|| SessionError::EmptyPrompt {
                name: name.to_string(),
            })?;

        writeln!(out, "\nExecuting prompt '{name}'...")?;
        Ok(self.process_query(&text, out).await?)
    }

    /// Tears down every backend connection.
    pub async fn shutdown(self) {
        self.registry.shutdown().await;
    }
}

fn render_resource(content: &ResourceContent) -> String {
    match (&content.text, &content.blob) {
        (Some(text), _) => text.clone(),
        (None, Some(blob)) => format!("<binary content, {} bytes base64>", blob.len()),
        (None, None) => String::new(),
    }
}
