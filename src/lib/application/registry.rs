use super::router::{CapabilityRouter, ConnectionId};
use super::tooling::BackendSession;
use crate::types::{PromptDescriptor, ToolDescriptor};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns every backend connection for the life of the session together with the
/// capability catalogue they contributed.
///
/// Populated once during bootstrap and read-only afterwards. Connections are
/// only released by [`ConnectionRegistry::shutdown`].
#[derive(Default)]
pub struct ConnectionRegistry {
    backends: Vec<Arc<dyn BackendSession>>,
    tools: Vec<ToolDescriptor>,
    prompts: Vec<PromptDescriptor>,
    router: CapabilityRouter,
}

impl ConnectionRegistry {
    pub fn new(router: CapabilityRouter) -> Self {
        Self {
            router,
            ..Self::default()
        }
    }

    /// Takes ownership of an established connection.
    pub fn add_backend(&mut self, session: Arc<dyn BackendSession>) -> ConnectionId {
        let id = ConnectionId::new(self.backends.len());
        debug!(server = session.name(), id = id.index(), "Registered backend connection");
        self.backends.push(session);
        id
    }

    pub fn register_tool(&mut self, id: ConnectionId, tool: ToolDescriptor) {
        if let Some(previous) = self.router.register_capability(tool.name.clone(), id) {
            self.report_collision("tool", &tool.name, previous, id);
        }
        self.tools.retain(|existing| existing.name != tool.name);
        self.tools.push(tool);
    }

    pub fn register_prompt(&mut self, id: ConnectionId, prompt: PromptDescriptor) {
        if let Some(previous) = self.router.register_capability(prompt.name.clone(), id) {
            self.report_collision("prompt", &prompt.name, previous, id);
        }
        self.prompts.retain(|existing| existing.name != prompt.name);
        self.prompts.push(prompt);
    }

    pub fn register_resource(&mut self, id: ConnectionId, uri: impl Into<String>) {
        let uri = uri.into();
        if let Some(previous) = self.router.register_resource(uri.clone(), id) {
            self.report_collision("resource", &uri, previous, id);
        }
    }

    /// Tools in registration order, ready to hand to the model service.
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn prompts(&self) -> &[PromptDescriptor] {
        &self.prompts
    }

    pub fn router(&self) -> &CapabilityRouter {
        &self.router
    }

    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|backend| backend.name()).collect()
    }

    pub fn session(&self, id: ConnectionId) -> Option<&dyn BackendSession> {
        self.backends.get(id.index()).map(|backend| backend.as_ref())
    }

    /// Connection serving the tool or prompt called `name`.
    pub fn resolve_capability(&self, name: &str) -> Option<&dyn BackendSession> {
        self.router
            .resolve_capability(name)
            .and_then(|id| self.session(id))
    }

    /// Connection serving `uri`, including the scheme fallback.
    pub fn resolve_resource(&self, uri: &str) -> Option<&dyn BackendSession> {
        self.router
            .resolve_resource(uri)
            .and_then(|id| self.session(id))
    }

    /// Releases every connection, newest first.
    pub async fn shutdown(self) {
        for backend in self.backends.iter().rev() {
            info!(server = backend.name(), "Closing backend connection");
            backend.shutdown().await;
        }
    }

    fn report_collision(&self, kind: &str, key: &str, previous: ConnectionId, id: ConnectionId) {
        if previous == id {
            return;
        }
        let before = self.session(previous).map(|s| s.name()).unwrap_or("?");
        let after = self.session(id).map(|s| s.name()).unwrap_or("?");
        warn!(kind, key, before, after, "Capability registered twice; later server wins");
    }
}
