//! Model types - Request, Response, and Error types

use crate::types::{ContentBlock, ConversationMessage, ToolDescriptor, ToolInvocation};
use thiserror::Error;

/// One submission of the transcript to the model service.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: Option<String>,
    pub messages: Vec<ConversationMessage>,
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseSegment {
    Text(String),
    ToolUse(ToolInvocation),
}

/// Ordered response segments as produced by the model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelResponse {
    pub segments: Vec<ResponseSegment>,
    pub stop_reason: Option<String>,
}

impl ModelResponse {
    pub fn new(segments: Vec<ResponseSegment>) -> Self {
        Self {
            segments,
            stop_reason: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![ResponseSegment::Text(text.into())])
    }

    pub fn tool_invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.segments.iter().filter_map(|segment| match segment {
            ResponseSegment::ToolUse(invocation) => Some(invocation),
            ResponseSegment::Text(_) => None,
        })
    }

    pub fn has_tool_use(&self) -> bool {
        self.tool_invocations().next().is_some()
    }

    /// Segments as transcript content, in the order they were produced.
    pub fn to_content_blocks(&self) -> Vec<ContentBlock> {
        self.segments
            .iter()
            .map(|segment| match segment {
                ResponseSegment::Text(text) => ContentBlock::Text { text: text.clone() },
                ResponseSegment::ToolUse(invocation) => ContentBlock::ToolUse(invocation.clone()),
            })
            .collect()
    }
}

/// Model errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("provider '{provider}' requires an API key in ${env}")]
    MissingApiKey { provider: String, env: String },
    #[error("network error calling provider '{provider}': {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("provider '{provider}' rejected the request ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },
    #[error("provider '{provider}' returned invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl ModelError {
    pub fn missing_api_key(provider: impl Into<String>, env: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
            env: env.into(),
        }
    }

    pub fn network(provider: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            provider: provider.into(),
            source,
        }
    }

    pub fn api(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    pub fn invalid_response(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ModelError::MissingApiKey { env, .. } => {
                format!("No API key configured. Set {env} in the environment or a .env file.")
            }
            ModelError::Network { provider, source } => {
                if source.is_connect() {
                    format!("Could not connect to the model service '{provider}'.")
                } else if source.is_timeout() {
                    format!("The request to '{provider}' timed out.")
                } else {
                    format!("Network error while talking to '{provider}'.")
                }
            }
            ModelError::Api {
                status, message, ..
            } => match status {
                401 | 403 => "The model service rejected the API key.".to_string(),
                429 => "The model service is rate limiting requests. Try again shortly.".to_string(),
                500..=599 => "The model service is temporarily unavailable.".to_string(),
                _ => format!("The model service rejected the request: {message}"),
            },
            ModelError::InvalidResponse { provider, .. } => {
                format!("The response from '{provider}' could not be understood.")
            }
        }
    }
}
