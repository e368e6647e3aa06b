// Shared test doubles: scripted model service, in-memory backends and launcher.

#![allow(dead_code)]

use async_trait::async_trait;
use mcp_chatbot::bootstrap::connect_all;
use mcp_chatbot::config::ServerConfig;
use mcp_chatbot::registry::ConnectionRegistry;
use mcp_chatbot::router::CapabilityRouter;
use mcp_chatbot::model::{ModelError, ModelProvider, ModelRequest, ModelResponse, ResponseSegment};
use mcp_chatbot::tooling::{BackendError, BackendLauncher, BackendSession};
use mcp_chatbot::types::{
    CapabilityKind, MessageRole, PromptArgument, PromptContent, PromptDescriptor, PromptMessage,
    PromptResult, ResourceContent, ResourceDescriptor, ToolCallOutput, ToolDescriptor, ToolInvocation,
};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ============================================================================
// Model service
// ============================================================================

/// Replays canned responses in order and records every request it receives.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ModelResponse>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: impl IntoIterator<Item = ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ModelError::invalid_response("scripted", "no response left"))
    }
}

pub fn text(value: &str) -> ResponseSegment {
    ResponseSegment::Text(value.to_string())
}

pub fn tool_use(id: &str, name: &str, input: Value) -> ResponseSegment {
    ResponseSegment::ToolUse(ToolInvocation {
        id: id.to_string(),
        name: name.to_string(),
        input,
    })
}

pub fn respond(segments: Vec<ResponseSegment>) -> ModelResponse {
    ModelResponse::new(segments)
}

// ============================================================================
// Backends
// ============================================================================

pub type EventLog = Arc<Mutex<Vec<String>>>;

/// In-memory backend. Every call is appended to `events` as `"<server>:<what>"`.
pub struct StubBackend {
    name: String,
    capabilities: HashSet<CapabilityKind>,
    tools: Vec<ToolDescriptor>,
    prompts: Vec<PromptDescriptor>,
    resources: Vec<ResourceDescriptor>,
    failing_listings: HashSet<CapabilityKind>,
    failing_tools: HashSet<String>,
    failing_prompts: bool,
    failing_reads: bool,
    prompt_messages: Vec<PromptMessage>,
    resource_contents: Vec<ResourceContent>,
    events: EventLog,
}

impl StubBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            capabilities: HashSet::new(),
            tools: Vec::new(),
            prompts: Vec::new(),
            resources: Vec::new(),
            failing_listings: HashSet::new(),
            failing_tools: HashSet::new(),
            failing_prompts: false,
            failing_reads: false,
            prompt_messages: Vec::new(),
            resource_contents: Vec::new(),
            events: EventLog::default(),
        }
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    pub fn with_tool(mut self, name: &str) -> Self {
        self.capabilities.insert(CapabilityKind::Tools);
        self.tools.push(ToolDescriptor {
            name: name.to_string(),
            description: format!("{name} from {}", self.name),
            input_schema: json!({"type": "object", "properties": {}}),
        });
        self
    }

    pub fn with_prompt(mut self, name: &str, arguments: &[&str]) -> Self {
        self.capabilities.insert(CapabilityKind::Prompts);
        let arguments = arguments
            .iter()
            .map(|arg| PromptArgument {
                name: arg.to_string(),
                description: None,
                required: true,
            })
            .collect();
        self.prompts.push(PromptDescriptor {
            name: name.to_string(),
            description: format!("{name} prompt"),
            arguments,
        });
        self
    }

    pub fn with_prompt_text(mut self, text: &str) -> Self {
        self.prompt_messages.push(PromptMessage {
            role: MessageRole::User,
            content: PromptContent::Text(text.to_string()),
        });
        self
    }

    pub fn with_resource(mut self, uri: &str) -> Self {
        self.capabilities.insert(CapabilityKind::Resources);
        self.resources.push(ResourceDescriptor {
            uri: uri.to_string(),
            name: None,
            mime_type: None,
        });
        self
    }

    pub fn with_resource_text(mut self, uri: &str, text: &str) -> Self {
        self.resource_contents.push(ResourceContent {
            uri: uri.to_string(),
            mime_type: Some("text/plain".into()),
            text: Some(text.to_string()),
            blob: None,
        });
        self
    }

    pub fn supporting(mut self, kind: CapabilityKind) -> Self {
        self.capabilities.insert(kind);
        self
    }

    pub fn failing_listing(mut self, kind: CapabilityKind) -> Self {
        self.capabilities.insert(kind);
        self.failing_listings.insert(kind);
        self
    }

    pub fn failing_tool(mut self, name: &str) -> Self {
        self.failing_tools.insert(name.to_string());
        self
    }

    pub fn failing_prompt(mut self) -> Self {
        self.failing_prompts = true;
        self
    }

    pub fn failing_read(mut self) -> Self {
        self.failing_reads = true;
        self
    }

    fn rpc_error(&self, message: String) -> BackendError {
        BackendError::Rpc {
            server: self.name.clone(),
            code: -32603,
            message,
        }
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(format!("{}:{event}", self.name));
    }

    fn check(&self, kind: CapabilityKind) -> Result<(), BackendError> {
        if self.failing_listings.contains(&kind) {
            return Err(BackendError::Rpc {
                server: self.name.clone(),
                code: -32603,
                message: format!("{} listing exploded", kind.as_str()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BackendSession for StubBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, kind: CapabilityKind) -> bool {
        self.capabilities.contains(&kind)
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, BackendError> {
        self.check(CapabilityKind::Tools)?;
        Ok(self.tools.clone())
    }

    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, BackendError> {
        self.check(CapabilityKind::Prompts)?;
        Ok(self.prompts.clone())
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, BackendError> {
        self.check(CapabilityKind::Resources)?;
        Ok(self.resources.clone())
    }

    async fn call_tool(&self, name: &str, input: Value) -> Result<ToolCallOutput, BackendError> {
        self.record(format!("call {name} {input}"));
        if self.failing_tools.contains(name) {
            return Err(BackendError::Rpc {
                server: self.name.clone(),
                code: -32000,
                message: format!("{name} crashed"),
            });
        }
        Ok(ToolCallOutput {
            content: vec![json!({"type": "text", "text": format!("{name} result")})],
            is_error: false,
        })
    }

    async fn get_prompt(
        &self,
        name: &str,
        arguments: &BTreeMap<String, String>,
    ) -> Result<PromptResult, BackendError> {
        let rendered: Vec<String> = arguments.iter().map(|(k, v)| format!("{k}={v}")).collect();
        self.record(format!("prompt {name} {}", rendered.join(",")));
        if self.failing_prompts {
            return Err(self.rpc_error(format!("{name} could not be rendered")));
        }
        Ok(PromptResult {
            description: None,
            messages: self.prompt_messages.clone(),
        })
    }

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContent>, BackendError> {
        self.record(format!("read {uri}"));
        if self.failing_reads {
            return Err(self.rpc_error(format!("{uri} is unavailable")));
        }
        Ok(self.resource_contents.clone())
    }

    async fn shutdown(&self) {
        self.record("shutdown".to_string());
    }
}

// ============================================================================
// Launcher
// ============================================================================

/// Hands out prepared backends by server name; unknown names fail to spawn.
#[derive(Default)]
pub struct StubLauncher {
    backends: Mutex<HashMap<String, Arc<StubBackend>>>,
    launched: Mutex<Vec<String>>,
}

impl StubLauncher {
    pub fn with(self, backend: StubBackend) -> Self {
        self.backends
            .lock()
            .unwrap()
            .insert(backend.name().to_string(), Arc::new(backend));
        self
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendLauncher for StubLauncher {
    async fn launch(&self, server: &ServerConfig) -> Result<Arc<dyn BackendSession>, BackendError> {
        self.launched.lock().unwrap().push(server.name.clone());
        let backend = self.backends.lock().unwrap().get(&server.name).cloned();
        match backend {
            Some(backend) => Ok(backend as Arc<dyn BackendSession>),
            None => Err(BackendError::Spawn {
                server: server.name.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such command"),
            }),
        }
    }
}

pub fn server(name: &str) -> ServerConfig {
    ServerConfig {
        name: name.to_string(),
        command: PathBuf::from("uvx"),
        args: vec![format!("{name}-server")],
        env: HashMap::new(),
        cwd: None,
    }
}

/// Connects `backends` in order through [`connect_all`], discarding progress output.
pub async fn registry_of(backends: Vec<StubBackend>) -> ConnectionRegistry {
    let servers: Vec<ServerConfig> = backends.iter().map(|b| server(b.name())).collect();
    let launcher = backends
        .into_iter()
        .fold(StubLauncher::default(), StubLauncher::with);
    let mut sink = Vec::new();
    let (registry, _) = connect_all(&servers, &launcher, CapabilityRouter::new(["papers"]), &mut sink)
        .await
        .expect("write to memory");
    registry
}

pub fn output(buffer: &[u8]) -> String {
    String::from_utf8_lossy(buffer).into_owned()
}
