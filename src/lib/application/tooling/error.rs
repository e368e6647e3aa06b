use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to spawn MCP server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("MCP server '{server}' transport error: {message}")]
    Transport { server: String, message: String },
    #[error("MCP server '{server}' returned invalid JSON: {source}")]
    InvalidJson {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("MCP server '{server}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },
    #[error("MCP server '{server}' returned an unexpected {method} result: {reason}")]
    InvalidResponse {
        server: String,
        method: String,
        reason: String,
    },
    #[error("MCP server '{server}' does not support {capability}")]
    Unsupported { server: String, capability: String },
    #[error("MCP server '{server}' terminated unexpectedly")]
    Terminated { server: String },
    #[error("MCP server '{server}' request cancelled")]
    Cancelled { server: String },
}

impl BackendError {
    pub fn server(&self) -> &str {
        match self {
            BackendError::Spawn { server, .. }
            | BackendError::Transport { server, .. }
            | BackendError::InvalidJson { server, .. }
            | BackendError::Rpc { server, .. }
            | BackendError::InvalidResponse { server, .. }
            | BackendError::Unsupported { server, .. }
            | BackendError::Terminated { server }
            | BackendError::Cancelled { server } => server,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            BackendError::Spawn { server, source } => {
                format!("could not start '{server}': {source}")
            }
            BackendError::Rpc { message, .. } => message.clone(),
            BackendError::Terminated { server } => {
                format!("server '{server}' is no longer running")
            }
            other => other.to_string(),
        }
    }
}
