//! # Application Module
//!
//! Session-level logic of the chatbot.
//!
//! ## Submodules
//!
//! - [`tooling`] - Backend session abstraction and the stdio MCP transport
//! - [`router`] - Capability name and resource URI lookup
//! - [`registry`] - Connected backends and their aggregated capabilities
//! - [`bootstrap`] - Connects configured servers and fills the registry
//! - [`chat`] - The tool-use conversation loop
//! - [`dispatch`] - Command parsing and the session context
//! - [`stdio`] - Standard input/output interface for command-line interaction

pub mod bootstrap;
pub mod chat;
pub mod dispatch;
pub mod registry;
pub mod router;
pub mod stdio;
pub mod tooling;
