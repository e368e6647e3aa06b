//! Anthropic Messages API client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::base::HttpClientBase;
use crate::config::ProviderSettings;
use crate::infrastructure::model::traits::ModelProvider;
use crate::infrastructure::model::types::{
    ModelError, ModelRequest, ModelResponse, ResponseSegment,
};
use crate::types::{ContentBlock, ConversationMessage, ToolInvocation, ToolResult};

const PROVIDER_ID: &str = "anthropic";

#[derive(Clone)]
pub struct AnthropicClient {
    base: HttpClientBase,
    api_path: String,
    api_version: String,
    api_key_env: String,
}

impl AnthropicClient {
    /// Build a client, reading the API key from the configured environment variable.
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            debug!(env = %settings.api_key_env, "No API key found in environment");
        }
        Self {
            base: HttpClientBase::new(PROVIDER_ID.to_string(), settings.endpoint.clone(), api_key),
            api_path: settings.api_path.clone(),
            api_version: settings.api_version.clone(),
            api_key_env: settings.api_key_env.clone(),
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicClient {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let api_key = self.base.require_api_key(&self.api_key_env)?;
        let url = self.base.build_url(&self.api_path);
        let payload = MessagesRequest::from(&request);

        info!(
            provider = PROVIDER_ID,
            model = request.model.as_str(),
            messages = payload.messages.len(),
            tools = payload.tools.len(),
            "Sending request to model provider"
        );

        let headers = [
            ("x-api-key", api_key),
            ("anthropic-version", self.api_version.as_str()),
        ];
        let response: MessagesResponse =
            self.base.post_with_headers(&url, &headers, &payload).await?;
        debug!(
            stop_reason = response.stop_reason.as_deref().unwrap_or("none"),
            blocks = response.content.len(),
            "Received response from model provider"
        );

        Ok(response.into_model_response())
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: Value,
}

impl From<&ModelRequest> for MessagesRequest {
    fn from(request: &ModelRequest) -> Self {
        Self {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            system: request.system.clone(),
            messages: wire_messages(&request.messages),
            tools: request
                .tools
                .iter()
                .map(|tool| WireTool {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    input_schema: tool.input_schema.clone(),
                })
                .collect(),
        }
    }
}

/// Consecutive messages with the same role travel as one wire message.
fn wire_messages(messages: &[ConversationMessage]) -> Vec<WireMessage> {
    let mut wire: Vec<WireMessage> = Vec::with_capacity(messages.len());
    for message in messages {
        let role = message.role.as_str();
        let blocks = message.content.iter().map(wire_block);
        match wire.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => wire.push(WireMessage {
                role,
                content: blocks.collect(),
            }),
        }
    }
    wire
}

fn wire_block(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({ "type": "text", "text": text }),
        ContentBlock::ToolUse(ToolInvocation { id, name, input }) => json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input,
        }),
        ContentBlock::ToolResult(ToolResult {
            tool_use_id,
            content,
            is_error,
        }) => json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": tool_result_content(content),
            "is_error": is_error,
        }),
    }
}

/// Translates MCP content items into blocks the Messages API accepts.
fn tool_result_content(items: &[Value]) -> Vec<Value> {
    if items.is_empty() {
        return vec![json!({ "type": "text", "text": "(empty result)" })];
    }
    items
        .iter()
        .map(|item| {
            match item.get("type").and_then(Value::as_str) {
                Some("text") => {
                    let text = item.get("text").and_then(Value::as_str).unwrap_or_default();
                    json!({ "type": "text", "text": text })
                }
                Some("image") => match (
                    item.get("data").and_then(Value::as_str),
                    item.get("mimeType").and_then(Value::as_str),
                ) {
                    (Some(data), Some(mime)) => json!({
                        "type": "image",
                        "source": { "type": "base64", "media_type": mime, "data": data },
                    }),
                    _ => json!({ "type": "text", "text": item.to_string() }),
                },
                _ => json!({ "type": "text", "text": item.to_string() }),
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<WireResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    fn into_model_response(self) -> ModelResponse {
        let segments = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                WireResponseBlock::Text { text } => Some(ResponseSegment::Text(text)),
                WireResponseBlock::ToolUse { id, name, input } => {
                    Some(ResponseSegment::ToolUse(ToolInvocation { id, name, input }))
                }
                WireResponseBlock::Other => {
                    debug!("Ignoring unsupported response block");
                    None
                }
            })
            .collect();
        ModelResponse {
            segments,
            stop_reason: self.stop_reason,
        }
    }
}
