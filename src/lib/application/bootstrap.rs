//! Backend bootstrap.
//!
//! Connects every configured server in file order and folds whatever each one
//! can enumerate into a [`ConnectionRegistry`]. Only configuration problems are
//! fatal; an unreachable server or a failing listing call is reported and
//! skipped.

use super::registry::ConnectionRegistry;
use super::router::CapabilityRouter;
use super::tooling::{BackendError, BackendLauncher, BackendSession};
use crate::config::{AppConfig, ConfigError, ServerConfig};
use crate::types::CapabilityKind;
use std::io::{self, Write};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to write bootstrap progress: {0}")]
    Io(#[from] io::Error),
}

impl BootstrapError {
    pub fn user_message(&self) -> String {
        match self {
            BootstrapError::Config(err) => err.user_message(),
            BootstrapError::Io(err) => err.to_string(),
        }
    }
}

/// A listing call that failed for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFailure {
    pub server: String,
    pub kind: CapabilityKind,
    pub reason: String,
}

/// What happened to each configured backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub connected: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub listing_failures: Vec<ListingFailure>,
}

/// Read the server file named by `config` and connect to every entry.
pub async fn bootstrap<W: Write>(
    config: &AppConfig,
    launcher: &dyn BackendLauncher,
    out: &mut W,
) -> Result<(ConnectionRegistry, BootstrapReport), BootstrapError> {
    writeln!(out, "\nInitializing MCP servers...")?;
    writeln!(out, "Loading server configuration...")?;
    let servers = config.load_servers()?;
    info!(
        path = %config.servers_file.display(),
        count = servers.len(),
        "Loaded server configuration"
    );
    writeln!(out, "Found {} server(s) in config", servers.len())?;
    if servers.is_empty() {
        writeln!(out, "No servers found in configuration")?;
    }

    let router = CapabilityRouter::new(config.resources.fallback_schemes.iter().cloned());
    let outcome = connect_all(&servers, launcher, router, out).await?;
    Ok(outcome)
}

/// Connect to `servers` in order. Never fails because of a backend.
pub async fn connect_all<W: Write>(
    servers: &[ServerConfig],
    launcher: &dyn BackendLauncher,
    router: CapabilityRouter,
    out: &mut W,
) -> io::Result<(ConnectionRegistry, BootstrapReport)> {
    let mut registry = ConnectionRegistry::new(router);
    let mut report = BootstrapReport::default();

    for server in servers {
        writeln!(out, "\nConnecting to {} server...", server.name)?;
        writeln!(out, "Command: {}", server.command_line())?;

        let session = match launcher.launch(server).await {
            Ok(session) => session,
            Err(err) => {
                warn!(server = %server.name, %err, "Failed to connect to MCP server");
                writeln!(out, "  ✗ Error connecting to {}: {}", server.name, err)?;
                report.failed.push((server.name.clone(), err.to_string()));
                continue;
            }
        };

        register_backend(&mut registry, &mut report, session, out).await?;
        writeln!(out, "  ✓ Successfully connected to {}", server.name)?;
        report.connected.push(server.name.clone());
    }

    if registry.tools().is_empty() {
        writeln!(out, "\nWarning: No tools were loaded from any server")?;
    } else {
        writeln!(
            out,
            "\nSuccessfully loaded {} tools from all servers",
            registry.tools().len()
        )?;
    }
    info!(
        backends = registry.backend_count(),
        tools = registry.tools().len(),
        prompts = registry.prompts().len(),
        resources = registry.router().resource_count(),
        "Bootstrap complete"
    );

    Ok((registry, report))
}

async fn register_backend<W: Write>(
    registry: &mut ConnectionRegistry,
    report: &mut BootstrapReport,
    session: Arc<dyn BackendSession>,
    out: &mut W,
) -> io::Result<()> {
    let name = session.name().to_string();
    let id = registry.add_backend(session.clone());

    if session.supports(CapabilityKind::Tools) {
        match session.list_tools().await {
            Ok(tools) => {
                writeln!(out, "  ✓ Found {} tools", tools.len())?;
                for tool in tools {
                    registry.register_tool(id, tool);
                }
            }
            Err(err) => listing_failed(report, &name, CapabilityKind::Tools, &err, out)?,
        }
    } else {
        debug!(server = %name, "Server does not offer tools");
    }

    if session.supports(CapabilityKind::Prompts) {
        match session.list_prompts().await {
            Ok(prompts) => {
                if !prompts.is_empty() {
                    writeln!(out, "  ✓ Found {} prompts", prompts.len())?;
                }
                for prompt in prompts {
                    registry.register_prompt(id, prompt);
                }
            }
            Err(err) => listing_failed(report, &name, CapabilityKind::Prompts, &err, out)?,
        }
    } else {
        debug!(server = %name, "Server does not offer prompts");
    }

    if session.supports(CapabilityKind::Resources) {
        match session.list_resources().await {
            Ok(resources) => {
                if !resources.is_empty() {
                    writeln!(out, "  ✓ Found {} resources", resources.len())?;
                }
                for resource in resources {
                    registry.register_resource(id, resource.uri);
                }
            }
            Err(err) => listing_failed(report, &name, CapabilityKind::Resources, &err, out)?,
        }
    } else {
        debug!(server = %name, "Server does not offer resources");
    }

    Ok(())
}

fn listing_failed<W: Write>(
    report: &mut BootstrapReport,
    server: &str,
    kind: CapabilityKind,
    err: &BackendError,
    out: &mut W,
) -> io::Result<()> {
    warn!(server, kind = kind.as_str(), %err, "Could not list capabilities");
    writeln!(out, "  ⚠ Could not list {}: {}", kind.as_str(), err)?;
    report.listing_failures.push(ListingFailure {
        server: server.to_string(),
        kind,
        reason: err.to_string(),
    });
    Ok(())
}
