use super::error::BackendError;
use super::interface::{BackendLauncher, BackendSession};
use crate::config::ServerConfig;
use crate::types::{
    CapabilityKind, PromptDescriptor, PromptResult, ResourceContent, ResourceDescriptor,
    ToolCallOutput, ToolDescriptor,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2025-06-18";

type Responder = oneshot::Sender<Result<Value, BackendError>>;

/// MCP server spoken to over the stdin/stdout of a child process.
pub struct StdioBackend {
    inner: Arc<StdioBackendInner>,
    capabilities: HashSet<CapabilityKind>,
    instructions: Option<String>,
}

struct StdioBackendInner {
    server: ServerConfig,
    child: AsyncMutex<Option<Child>>,
    writer: AsyncMutex<Option<BufWriter<ChildStdin>>>,
    pending: AsyncMutex<HashMap<String, Responder>>,
    id_counter: AtomicU64,
    closed: AtomicBool,
}

/// Launches every backend as a child process speaking stdio JSON-RPC.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioLauncher;

#[async_trait]
impl BackendLauncher for StdioLauncher {
    async fn launch(&self, server: &ServerConfig) -> Result<Arc<dyn BackendSession>, BackendError> {
        let backend = StdioBackend::connect(server.clone()).await?;
        Ok(Arc::new(backend))
    }
}

impl StdioBackend {
    /// Spawn the server and complete the `initialize` handshake.
    pub async fn connect(server: ServerConfig) -> Result<Self, BackendError> {
        let mut command = Command::new(&server.command);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &server.cwd {
            command.current_dir(dir);
        }
        if !server.args.is_empty() {
            command.args(&server.args);
        }
        for (key, value) in &server.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| BackendError::Spawn {
            server: server.name.clone(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or_else(|| BackendError::Transport {
            server: server.name.clone(),
            message: "failed to capture server stdin".into(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| BackendError::Transport {
            server: server.name.clone(),
            message: "failed to capture server stdout".into(),
        })?;

        let inner = Arc::new(StdioBackendInner {
            server,
            child: AsyncMutex::new(Some(child)),
            writer: AsyncMutex::new(Some(BufWriter::new(stdin))),
            pending: AsyncMutex::new(HashMap::new()),
            id_counter: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        });

        let reader = Arc::clone(&inner);
        tokio::spawn(async move {
            reader.reader_loop(stdout).await;
        });

        match inner.initialize().await {
            Ok(init) => {
                let capabilities = advertised_capabilities(&init);
                let instructions = init
                    .get("instructions")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                debug!(
                    server = %inner.server.name,
                    capabilities = ?capabilities,
                    "MCP handshake complete"
                );
                Ok(Self {
                    inner,
                    capabilities,
                    instructions,
                })
            }
            Err(err) => {
                inner.reset().await;
                Err(err)
            }
        }
    }

    fn require(&self, kind: CapabilityKind) -> Result<(), BackendError> {
        if self.supports(kind) {
            Ok(())
        } else {
            Err(BackendError::Unsupported {
                server: self.inner.server.name.clone(),
                capability: kind.as_str().to_string(),
            })
        }
    }
}

#[async_trait]
impl BackendSession for StdioBackend {
    fn name(&self) -> &str {
        &self.inner.server.name
    }

    fn supports(&self, kind: CapabilityKind) -> bool {
        self.capabilities.contains(&kind)
    }

    fn instructions(&self) -> Option<String> {
        self.instructions.clone()
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, BackendError> {
        self.require(CapabilityKind::Tools)?;
        let items = self.inner.list_paginated("tools/list", "tools").await?;
        Ok(decode_items(&self.inner.server.name, "tools/list", items))
    }

    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, BackendError> {
        self.require(CapabilityKind::Prompts)?;
        let items = self.inner.list_paginated("prompts/list", "prompts").await?;
        Ok(decode_items(&self.inner.server.name, "prompts/list", items))
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, BackendError> {
        self.require(CapabilityKind::Resources)?;
        let items = self
            .inner
            .list_paginated("resources/list", "resources")
            .await?;
        Ok(decode_items(&self.inner.server.name, "resources/list", items))
    }

    async fn call_tool(&self, name: &str, input: Value) -> Result<ToolCallOutput, BackendError> {
        self.require(CapabilityKind::Tools)?;
        let params = json!({
            "name": name,
            "arguments": match input {
                Value::Null => Value::Object(Default::default()),
                other => other,
            }
        });
        let result = self.inner.send_request("tools/call", params).await?;
        self.inner.decode_result("tools/call", result)
    }

    async fn get_prompt(
        &self,
        name: &str,
        arguments: &BTreeMap<String, String>,
    ) -> Result<PromptResult, BackendError> {
        self.require(CapabilityKind::Prompts)?;
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.inner.send_request("prompts/get", params).await?;
        self.inner.decode_result("prompts/get", result)
    }

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContent>, BackendError> {
        self.require(CapabilityKind::Resources)?;
        let result = self
            .inner
            .send_request("resources/read", json!({ "uri": uri }))
            .await?;
        let contents = result.get("contents").cloned().unwrap_or(Value::Array(Vec::new()));
        self.inner.decode_result("resources/read", contents)
    }

    async fn shutdown(&self) {
        debug!(server = %self.inner.server.name, "Shutting down MCP server");
        self.inner.reset().await;
    }
}

impl StdioBackendInner {
    async fn initialize(&self) -> Result<Value, BackendError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {}
        });
        let result = self.send_request("initialize", params).await?;
        self.send_notification("notifications/initialized", json!({}))
            .await?;
        Ok(result)
    }

    async fn list_paginated(&self, method: &str, key: &str) -> Result<Vec<Value>, BackendError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let result = self.send_request(method, params).await?;
            let page = result
                .get(key)
                .and_then(Value::as_array)
                .ok_or_else(|| BackendError::InvalidResponse {
                    server: self.server.name.clone(),
                    method: method.to_string(),
                    reason: format!("missing '{key}' array"),
                })?;
            items.extend(page.iter().cloned());

            match result.get("nextCursor").and_then(Value::as_str) {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next) => {
                    cursor = Some(next.to_string());
                }
                _ => break,
            }
        }
        Ok(items)
    }

    fn decode_result<T: DeserializeOwned>(
        &self,
        method: &str,
        value: Value,
    ) -> Result<T, BackendError> {
        serde_json::from_value(value).map_err(|err| BackendError::InvalidResponse {
            server: self.server.name.clone(),
            method: method.to_string(),
            reason: err.to_string(),
        })
    }

    async fn reader_loop(self: Arc<Self>, stdout: ChildStdout) {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(raw)) = lines.next_line().await {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('\u{1b}') {
                debug!(
                    server = %self.server.name,
                    line = trimmed,
                    "skipping non-JSON ANSI log line from MCP server"
                );
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => {
                    if let Err(err) = self.process_inbound_message(value).await {
                        warn!(
                            server = %self.server.name,
                            %err,
                            "failed to process message from MCP server"
                        );
                    }
                }
                Err(source) => {
                    warn!(
                        server = %self.server.name,
                        line = trimmed,
                        %source,
                        "received invalid JSON from MCP server"
                    );
                }
            }
        }

        self.reset().await;
    }

    async fn process_inbound_message(self: &Arc<Self>, value: Value) -> Result<(), BackendError> {
        match (value.get("id").cloned(), value.get("method").is_some()) {
            (Some(id), true) => {
                // Replies go out on their own task so the reader never waits on
                // the writer lock, which a caller may hold while its pipe is full.
                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(err) = inner.handle_server_request(id, value).await {
                        warn!(
                            server = %inner.server.name,
                            %err,
                            "failed to answer request from MCP server"
                        );
                    }
                });
                Ok(())
            }
            (Some(id), false) => {
                self.handle_response(id, value).await;
                Ok(())
            }
            (None, true) => {
                self.handle_notification(&value);
                Ok(())
            }
            (None, false) => Ok(()),
        }
    }

    async fn handle_response(&self, id: Value, value: Value) {
        let Some(key) = response_key(&id) else {
            return;
        };

        let responder = self.pending.lock().await.remove(&key);
        let Some(sender) = responder else {
            debug!(
                server = %self.server.name,
                response_id = key,
                "received response for unknown request"
            );
            return;
        };

        let outcome = match value.get("error") {
            Some(error) => {
                let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32000);
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                Err(BackendError::Rpc {
                    server: self.server.name.clone(),
                    code,
                    message,
                })
            }
            None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        };
        let _ = sender.send(outcome);
    }

    async fn handle_server_request(&self, id: Value, value: Value) -> Result<(), BackendError> {
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match method {
            "ping" => self.send_response(id, json!({})).await,
            other => {
                warn!(
                    server = %self.server.name,
                    method = other,
                    "server sent unsupported request"
                );
                let error = json!({
                    "code": -32601,
                    "message": format!("client does not implement method '{other}'"),
                });
                self.send_error(id, error).await
            }
        }
    }

    fn handle_notification(&self, value: &Value) {
        let Some(method) = value.get("method").and_then(Value::as_str) else {
            return;
        };
        if method.ends_with("/list_changed") {
            info!(
                server = %self.server.name,
                method,
                "server capability list changed; keeping the catalogue from startup"
            );
        } else {
            debug!(
                server = %self.server.name,
                method,
                "received notification from server"
            );
        }
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, BackendError> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if self.closed.load(Ordering::SeqCst) {
                return Err(self.terminated());
            }
            pending.insert(id.clone(), tx);
        }

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        if let Err(err) = self.write_message(&payload).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }
        debug!(server = %self.server.name, method, request_id = id, "sent request");

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(BackendError::Cancelled {
                server: self.server.name.clone(),
            }),
        }
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), BackendError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        self.write_message(&payload).await
    }

    async fn send_response(&self, id: Value, result: Value) -> Result<(), BackendError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result
        });
        self.write_message(&payload).await
    }

    async fn send_error(&self, id: Value, error: Value) -> Result<(), BackendError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": error
        });
        self.write_message(&payload).await
    }

    async fn write_message(&self, message: &Value) -> Result<(), BackendError> {
        let mut encoded =
            serde_json::to_vec(message).map_err(|source| BackendError::InvalidJson {
                server: self.server.name.clone(),
                source,
            })?;
        encoded.push(b'\n');

        let mut writer = self.writer.lock().await;
        let stream = writer.as_mut().ok_or_else(|| self.terminated())?;
        stream
            .write_all(&encoded)
            .await
            .map_err(|source| self.transport_error(source.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|source| self.transport_error(source.to_string()))?;
        Ok(())
    }

    async fn reset(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.writer.lock().await.take();

        let child = self.child.lock().await.take();
        if let Some(mut child) = child {
            if let Err(err) = child.kill().await {
                debug!(
                    server = %self.server.name,
                    %err,
                    "failed to kill MCP server process (may have already exited)"
                );
            }
            let _ = child.wait().await;
        }

        self.fail_all_pending().await;
    }

    async fn fail_all_pending(&self) {
        let mut pending = self.pending.lock().await;
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(self.terminated()));
        }
    }

    fn next_id(&self) -> String {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("req-{id}")
    }

    fn terminated(&self) -> BackendError {
        BackendError::Terminated {
            server: self.server.name.clone(),
        }
    }

    fn transport_error(&self, message: impl Into<String>) -> BackendError {
        BackendError::Transport {
            server: self.server.name.clone(),
            message: message.into(),
        }
    }
}

fn response_key(id: &Value) -> Option<String> {
    match id {
        Value::String(value) => Some(value.clone()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}

fn advertised_capabilities(init: &Value) -> HashSet<CapabilityKind> {
    let Some(capabilities) = init.get("capabilities").and_then(Value::as_object) else {
        return HashSet::new();
    };
    [
        CapabilityKind::Tools,
        CapabilityKind::Prompts,
        CapabilityKind::Resources,
    ]
    .into_iter()
    .filter(|kind| {
        capabilities
            .get(kind.as_str())
            .is_some_and(|value| !value.is_null())
    })
    .collect()
}

fn decode_items<T: DeserializeOwned>(server: &str, method: &str, items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                warn!(server, method, %err, "skipping malformed catalogue entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_come_from_initialize_result() {
        let init = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": true }, "resources": {}, "logging": {} }
        });
        let caps = advertised_capabilities(&init);
        assert!(caps.contains(&CapabilityKind::Tools));
        assert!(caps.contains(&CapabilityKind::Resources));
        assert!(!caps.contains(&CapabilityKind::Prompts));
    }

    #[test]
    fn missing_capabilities_means_nothing_supported() {
        assert!(advertised_capabilities(&json!({})).is_empty());
        let nulls = json!({ "capabilities": { "prompts": null } });
        assert!(advertised_capabilities(&nulls).is_empty());
    }

    #[test]
    fn malformed_catalogue_entries_are_skipped() {
        let tools: Vec<ToolDescriptor> = decode_items(
            "research",
            "tools/list",
            vec![
                json!({ "name": "search_papers", "description": "Search arXiv" }),
                json!({ "description": "no name" }),
            ],
        );
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "search_papers");
    }

    #[test]
    fn response_keys_accept_strings_and_numbers() {
        assert_eq!(response_key(&json!("req-4")).as_deref(), Some("req-4"));
        assert_eq!(response_key(&json!(7)).as_deref(), Some("7"));
        assert!(response_key(&Value::Null).is_none());
    }
}
