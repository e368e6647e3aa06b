//! The tool-use conversation loop for a single query.

use super::registry::ConnectionRegistry;
use super::tooling::BackendError;
use crate::config::AppConfig;
use crate::model::{ModelError, ModelProvider, ModelRequest, ResponseSegment};
use crate::types::{ConversationMessage, ToolInvocation, ToolResult};
use std::io::{self, Write};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
}

impl From<&AppConfig> for ChatSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("failed to execute tool '{tool}': {source}")]
    ToolCall {
        tool: String,
        #[source]
        source: BackendError,
    },
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl ChatError {
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Model(err) => err.user_message(),
            ChatError::ToolCall { tool, source } => {
                format!("Tool '{tool}' failed: {}", source.user_message())
            }
            ChatError::Io(err) => err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    AwaitingModel,
    DispatchingTools,
    Done,
}

/// Everything a finished query produced.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub transcript: Vec<ConversationMessage>,
    /// Number of submissions made to the model service.
    pub rounds: usize,
    /// Tool names the model asked for that no backend serves.
    pub unresolved_tools: Vec<String>,
}

/// Drives one query through model response, tool calls and resubmission until
/// the model answers without requesting a tool.
pub struct ConversationDriver<'a, P: ModelProvider + ?Sized> {
    provider: &'a P,
    registry: &'a ConnectionRegistry,
    settings: &'a ChatSettings,
}

impl<'a, P: ModelProvider + ?Sized> ConversationDriver<'a, P> {
    pub fn new(provider: &'a P, registry: &'a ConnectionRegistry, settings: &'a ChatSettings) -> Self {
        Self {
            provider,
            registry,
            settings,
        }
    }

    /// Text segments are written to `out` as soon as each response arrives.
    pub async fn process_query<W: Write>(
        &self,
        query: &str,
        out: &mut W,
    ) -> Result<QueryOutcome, ChatError> {
        let mut transcript = vec![ConversationMessage::user_text(query)];
        let mut state = DriverState::AwaitingModel;
        let mut pending: Vec<ToolInvocation> = Vec::new();
        let mut unresolved_tools = Vec::new();
        let mut rounds = 0;

        loop {
            state = match state {
                DriverState::AwaitingModel => {
                    rounds += 1;
                    debug!(round = rounds, messages = transcript.len(), "Submitting transcript");
                    let response = self.provider.chat(self.request(&transcript)).await?;

                    for segment in &response.segments {
                        if let ResponseSegment::Text(text) = segment {
                            writeln!(out, "{text}")?;
                        }
                    }

                    debug!(
                        round = rounds,
                        stop_reason = response.stop_reason.as_deref().unwrap_or("none"),
                        "Model responded"
                    );
                    if !response.segments.is_empty() {
                        transcript.push(ConversationMessage::assistant(response.to_content_blocks()));
                    }
                    // Tool-use blocks decide the next state; the stop reason is informational.
                    if response.has_tool_use() {
                        pending = response.tool_invocations().cloned().collect();
                        DriverState::DispatchingTools
                    } else {
                        DriverState::Done
                    }
                }
                DriverState::DispatchingTools => {
                    let batch = std::mem::take(&mut pending);
                    self.dispatch(&batch, &mut transcript, &mut unresolved_tools, out)
                        .await?;
                    DriverState::AwaitingModel
                }
                DriverState::Done => break,
            };
        }

        info!(rounds, messages = transcript.len(), "Query complete");
        Ok(QueryOutcome {
            transcript,
            rounds,
            unresolved_tools,
        })
    }

    /// Runs the batch in order. An unresolved name stops the batch; it and every
    /// request after it still get an error result so each id stays paired.
    async fn dispatch<W: Write>(
        &self,
        batch: &[ToolInvocation],
        transcript: &mut Vec<ConversationMessage>,
        unresolved_tools: &mut Vec<String>,
        out: &mut W,
    ) -> Result<(), ChatError> {
        let mut requests = batch.iter();
        while let Some(invocation) = requests.next() {
            let Some(backend) = self.registry.resolve_capability(&invocation.name) else {
                warn!(tool = %invocation.name, id = %invocation.id, "Model requested unknown tool");
                let message = format!("Tool '{}' not found.", invocation.name);
                writeln!(out, "{message}")?;
                unresolved_tools.push(invocation.name.clone());
                transcript.push(ConversationMessage::tool_result(ToolResult::error(
                    &invocation.id,
                    message,
                )));
                for skipped in requests.by_ref() {
                    debug!(tool = %skipped.name, id = %skipped.id, "Skipping tool request");
                    transcript.push(ConversationMessage::tool_result(ToolResult::error(
                        &skipped.id,
                        "Not executed: an earlier tool in this turn could not be found.",
                    )));
                }
                break;
            };

            info!(
                tool = %invocation.name,
                id = %invocation.id,
                server = backend.name(),
                "Calling tool"
            );
            let output = backend
                .call_tool(&invocation.name, invocation.input.clone())
                .await
                .map_err(|source| ChatError::ToolCall {
                    tool: invocation.name.clone(),
                    source,
                })?;
            transcript.push(ConversationMessage::tool_result(ToolResult {
                tool_use_id: invocation.id.clone(),
                content: output.content,
                is_error: output.is_error,
            }));
        }
        Ok(())
    }

    fn request(&self, transcript: &[ConversationMessage]) -> ModelRequest {
        ModelRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            system: self.settings.system_prompt.clone(),
            messages: transcript.to_vec(),
            tools: self.registry.tools().to_vec(),
        }
    }
}
