// Bootstrap tests - connecting configured servers into the registry
//
// Server files are written to temp dirs; backends come from the stub launcher.

mod common;

use common::{StubBackend, StubLauncher, output};
use mcp_chatbot::bootstrap::{BootstrapError, bootstrap};
use mcp_chatbot::config::{AppConfig, ConfigError};
use mcp_chatbot::types::CapabilityKind;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn config_with_servers(dir: &Path, content: &str) -> AppConfig {
    let path = dir.join("server_config.json");
    fs::write(&path, content).expect("Failed to write server config");
    AppConfig {
        servers_file: path,
        ..AppConfig::default()
    }
}

const THREE_SERVERS: &str = r#"{
  "mcpServers": {
    "research": { "command": "uv", "args": ["run", "research_server.py"] },
    "broken": { "command": "does-not-exist" },
    "fetch": { "command": "uvx", "args": ["mcp-server-fetch"] }
  }
}"#;

// ============================================================================
// Structural configuration
// ============================================================================

#[tokio::test]
async fn missing_server_file_is_fatal() {
    let config = AppConfig {
        servers_file: "/nonexistent/server_config.json".into(),
        ..AppConfig::default()
    };
    let launcher = StubLauncher::default();
    let mut out = Vec::new();

    let result = bootstrap(&config, &launcher, &mut out).await;

    assert!(matches!(
        result,
        Err(BootstrapError::Config(ConfigError::NotFound { .. }))
    ));
    assert!(launcher.launched().is_empty());
}

#[tokio::test]
async fn malformed_server_file_is_fatal() {
    let dir = tempdir().expect("tempdir");
    let config = config_with_servers(dir.path(), r#"{"mcpServers": ["not", "a", "map"]}"#);
    let mut out = Vec::new();

    let result = bootstrap(&config, &StubLauncher::default(), &mut out).await;

    assert!(matches!(
        result,
        Err(BootstrapError::Config(ConfigError::Malformed { .. }))
    ));
}

#[tokio::test]
async fn zero_servers_is_success_with_nothing_routed() {
    let dir = tempdir().expect("tempdir");
    let config = config_with_servers(dir.path(), r#"{"mcpServers": {}}"#);
    let mut out = Vec::new();

    let (registry, report) = bootstrap(&config, &StubLauncher::default(), &mut out)
        .await
        .expect("empty config is fine");

    assert!(registry.tools().is_empty());
    assert!(registry.prompts().is_empty());
    assert!(registry.router().is_empty());
    assert!(registry.resolve_resource("papers://folders").is_none());
    assert!(report.connected.is_empty());
    let printed = output(&out);
    assert!(printed.contains("No servers found in configuration"));
    assert!(printed.contains("Warning: No tools were loaded"));
}

#[tokio::test]
async fn missing_servers_key_means_zero_servers() {
    let dir = tempdir().expect("tempdir");
    let config = config_with_servers(dir.path(), r#"{"other": 1}"#);
    let mut out = Vec::new();

    let (registry, _) = bootstrap(&config, &StubLauncher::default(), &mut out)
        .await
        .expect("missing key is not fatal");

    assert_eq!(registry.backend_count(), 0);
}

// ============================================================================
// Partial failure
// ============================================================================

#[tokio::test]
async fn unreachable_server_is_skipped() {
    let dir = tempdir().expect("tempdir");
    let config = config_with_servers(dir.path(), THREE_SERVERS);
    let launcher = StubLauncher::default()
        .with(StubBackend::new("research").with_tool("search_papers"))
        .with(StubBackend::new("fetch").with_tool("fetch"));
    let mut out = Vec::new();

    let (registry, report) = bootstrap(&config, &launcher, &mut out)
        .await
        .expect("partial failure is tolerated");

    assert_eq!(launcher.launched(), vec!["research", "broken", "fetch"]);
    assert_eq!(report.connected, vec!["research", "fetch"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "broken");
    assert_eq!(registry.backend_names(), vec!["research", "fetch"]);
    assert_eq!(registry.resolve_capability("fetch").map(|b| b.name()), Some("fetch"));

    let printed = output(&out);
    assert!(printed.contains("Connecting to broken server..."));
    assert!(printed.contains("Command: does-not-exist"));
    assert!(printed.contains("Error connecting to broken"));
    assert!(printed.contains("Successfully loaded 2 tools from all servers"));
}

#[tokio::test]
async fn failed_listing_keeps_the_connection_and_other_listings() {
    let dir = tempdir().expect("tempdir");
    let config = config_with_servers(dir.path(), THREE_SERVERS);
    let launcher = StubLauncher::default().with(
        StubBackend::new("research")
            .failing_listing(CapabilityKind::Tools)
            .with_prompt("generate_search_prompt", &["topic"])
            .with_resource("papers://folders"),
    );
    let mut out = Vec::new();

    let (registry, report) = bootstrap(&config, &launcher, &mut out).await.expect("bootstrap");

    assert_eq!(report.connected, vec!["research"]);
    assert_eq!(report.listing_failures.len(), 1);
    assert_eq!(report.listing_failures[0].kind, CapabilityKind::Tools);
    assert!(registry.tools().is_empty());
    assert_eq!(registry.prompts().len(), 1);
    assert!(registry.resolve_capability("generate_search_prompt").is_some());
    assert!(registry.resolve_resource("papers://folders").is_some());
    assert!(output(&out).contains("Could not list tools"));
}

#[tokio::test]
async fn unsupported_capabilities_are_not_listed() {
    let dir = tempdir().expect("tempdir");
    let config = config_with_servers(
        dir.path(),
        r#"{"mcpServers": {"prompts_only": {"command": "x"}}}"#,
    );
    let launcher = StubLauncher::default().with(
        StubBackend::new("prompts_only").with_prompt("summarize", &[]),
    );
    let mut out = Vec::new();

    let (registry, report) = bootstrap(&config, &launcher, &mut out).await.expect("bootstrap");

    assert!(report.listing_failures.is_empty());
    assert_eq!(registry.prompts().len(), 1);
    assert!(!output(&out).contains("Found 0 tools"));
}

// ============================================================================
// Routing after bootstrap
// ============================================================================

#[tokio::test]
async fn distinct_names_route_to_their_owner() {
    let dir = tempdir().expect("tempdir");
    let config = config_with_servers(dir.path(), THREE_SERVERS);
    let launcher = StubLauncher::default()
        .with(
            StubBackend::new("research")
                .with_tool("search_papers")
                .with_resource("papers://folders"),
        )
        .with(StubBackend::new("fetch").with_tool("fetch").with_prompt("fetch_page", &["url"]));
    let mut out = Vec::new();

    let (registry, _) = bootstrap(&config, &launcher, &mut out).await.expect("bootstrap");

    let owner = |name: &str| registry.resolve_capability(name).map(|b| b.name().to_string());
    assert_eq!(owner("search_papers").as_deref(), Some("research"));
    assert_eq!(owner("fetch").as_deref(), Some("fetch"));
    assert_eq!(owner("fetch_page").as_deref(), Some("fetch"));
    assert_eq!(
        registry.resolve_resource("papers://folders").map(|b| b.name()),
        Some("research")
    );
    // Names and URIs live in separate maps.
    assert!(registry.resolve_capability("papers://folders").is_none());
    assert!(registry.resolve_resource("search_papers").is_none());
}

#[tokio::test]
async fn later_server_wins_name_collisions() {
    let dir = tempdir().expect("tempdir");
    let config = config_with_servers(
        dir.path(),
        r#"{"mcpServers": {"old": {"command": "a"}, "new": {"command": "b"}}}"#,
    );
    let launcher = StubLauncher::default()
        .with(StubBackend::new("old").with_tool("search").with_tool("only_old"))
        .with(StubBackend::new("new").with_tool("search"));
    let mut out = Vec::new();

    let (registry, _) = bootstrap(&config, &launcher, &mut out).await.expect("no error on collision");

    assert_eq!(registry.resolve_capability("search").map(|b| b.name()), Some("new"));
    assert_eq!(registry.resolve_capability("only_old").map(|b| b.name()), Some("old"));
    let search: Vec<_> = registry.tools().iter().filter(|t| t.name == "search").collect();
    assert_eq!(search.len(), 1);
    assert_eq!(search[0].description, "search from new");
    assert_eq!(registry.tools().len(), 2);
}
