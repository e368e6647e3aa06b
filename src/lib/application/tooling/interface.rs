use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::BackendError;
use crate::config::ServerConfig;
use crate::types::{
    CapabilityKind, PromptDescriptor, PromptResult, ResourceContent, ResourceDescriptor,
    ToolCallOutput, ToolDescriptor,
};

/// An established session with one backend.
///
/// Listing and call methods return [`BackendError::Unsupported`] when the backend
/// did not advertise the matching capability during the handshake.
#[async_trait]
pub trait BackendSession: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, kind: CapabilityKind) -> bool;

    /// Guidance text the backend sent with its handshake, if any.
    fn instructions(&self) -> Option<String> {
        None
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, BackendError>;

    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, BackendError>;

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, BackendError>;

    async fn call_tool(&self, name: &str, input: Value) -> Result<ToolCallOutput, BackendError>;

    async fn get_prompt(
        &self,
        name: &str,
        arguments: &BTreeMap<String, String>,
    ) -> Result<PromptResult, BackendError>;

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContent>, BackendError>;

    /// Releases the connection. Calls after shutdown fail with `Terminated`.
    async fn shutdown(&self);
}

/// Starts a backend and completes its handshake.
#[async_trait]
pub trait BackendLauncher: Send + Sync {
    async fn launch(&self, server: &ServerConfig) -> Result<Arc<dyn BackendSession>, BackendError>;
}
