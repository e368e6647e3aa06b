//! Capability routing.
//!
//! Tool and prompt names share one mapping, resource URIs live in another so
//! the two kinds can never shadow each other. Only the URI mapping has a
//! fallback: when a URI with a recognised scheme is not registered exactly,
//! the earliest registered URI with the same scheme decides the connection.

use std::collections::{HashMap, HashSet};

/// Index of a backend connection inside the [`ConnectionRegistry`](super::registry::ConnectionRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(usize);

impl ConnectionId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Default, Clone)]
pub struct CapabilityRouter {
    capabilities: HashMap<String, ConnectionId>,
    resources: HashMap<String, ConnectionId>,
    resource_order: Vec<String>,
    fallback_schemes: HashSet<String>,
}

impl CapabilityRouter {
    pub fn new<I, S>(fallback_schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fallback_schemes: fallback_schemes
                .into_iter()
                .map(|scheme| scheme.into().trim_end_matches("://").to_string())
                .collect(),
            ..Self::default()
        }
    }

    /// Maps a tool or prompt name to `id`. Returns the connection it replaced.
    pub fn register_capability(
        &mut self,
        name: impl Into<String>,
        id: ConnectionId,
    ) -> Option<ConnectionId> {
        self.capabilities.insert(name.into(), id)
    }

    /// Maps a resource URI to `id`. Returns the connection it replaced.
    pub fn register_resource(
        &mut self,
        uri: impl Into<String>,
        id: ConnectionId,
    ) -> Option<ConnectionId> {
        let uri = uri.into();
        let previous = self.resources.insert(uri.clone(), id);
        if previous.is_none() {
            self.resource_order.push(uri);
        }
        previous
    }

    /// Exact-match lookup for tool and prompt names.
    pub fn resolve_capability(&self, name: &str) -> Option<ConnectionId> {
        self.capabilities.get(name).copied()
    }

    pub fn resolve_resource(&self, uri: &str) -> Option<ConnectionId> {
        if let Some(id) = self.resources.get(uri) {
            return Some(*id);
        }

        let scheme = uri_scheme(uri)?;
        if !self.fallback_schemes.contains(scheme) {
            return None;
        }
        self.resource_order
            .iter()
            .find(|registered| uri_scheme(registered) == Some(scheme))
            .and_then(|registered| self.resources.get(registered).copied())
    }

    pub fn capability_count(&self) -> usize {
        self.capabilities.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty() && self.resources.is_empty()
    }
}

/// Scheme of a `scheme://rest` URI.
fn uri_scheme(uri: &str) -> Option<&str> {
    let (scheme, _) = uri.split_once("://")?;
    (!scheme.is_empty()).then_some(scheme)
}
