//! Connection parameters, the discovery collaborator and the generic resolver.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ApplicationError;
use crate::refer::{References, DISCOVERY};

// ---------------------------------------------------------------------------
// ConnectionParams
// ---------------------------------------------------------------------------

/// Address of a remote or local endpoint.
///
/// Either `uri` is set, or `protocol`/`host`/`port` describe the address.
/// A `discovery_key` without an address means the address must be looked up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionParams {
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub uri: Option<String>,
    pub discovery_key: Option<String>,
}

impl ConnectionParams {
    #[must_use]
    pub fn from_host(protocol: &str, host: &str, port: u16) -> Self {
        Self {
            protocol: Some(protocol.to_string()),
            host: Some(host.to_string()),
            port: Some(port),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_uri(uri: &str) -> Self {
        Self {
            uri: Some(uri.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_discovery_key(mut self, key: &str) -> Self {
        self.discovery_key = Some(key.to_string());
        self
    }

    /// True when the address has to come from discovery. Empty strings
    /// count as unset.
    #[must_use]
    pub fn uses_discovery(&self) -> bool {
        self.discovery_key.is_some()
            && self.uri.as_deref().is_none_or(str::is_empty)
            && self.host.as_deref().is_none_or(str::is_empty)
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// External lookup mapping a discovery key to connection parameters.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Publishes `connection` under `key`.
    async fn register(
        &self,
        correlation_id: Option<&str>,
        key: &str,
        connection: &ConnectionParams,
    ) -> Result<(), ApplicationError>;

    async fn resolve_one(
        &self,
        correlation_id: Option<&str>,
        key: &str,
    ) -> Result<Option<ConnectionParams>, ApplicationError>;

    async fn resolve_all(
        &self,
        correlation_id: Option<&str>,
        key: &str,
    ) -> Result<Vec<ConnectionParams>, ApplicationError>;
}

/// In-process discovery backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryDiscovery {
    entries: DashMap<String, Vec<ConnectionParams>>,
}

impl MemoryDiscovery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Discovery for MemoryDiscovery {
    async fn register(
        &self,
        _correlation_id: Option<&str>,
        key: &str,
        connection: &ConnectionParams,
    ) -> Result<(), ApplicationError> {
        let mut entry = self.entries.entry(key.to_string()).or_default();
        if !entry.contains(connection) {
            entry.push(connection.clone());
        }
        Ok(())
    }

    async fn resolve_one(
        &self,
        _correlation_id: Option<&str>,
        key: &str,
    ) -> Result<Option<ConnectionParams>, ApplicationError> {
        Ok(self
            .entries
            .get(key)
            .and_then(|entry| entry.value().first().cloned()))
    }

    async fn resolve_all(
        &self,
        _correlation_id: Option<&str>,
        key: &str,
    ) -> Result<Vec<ConnectionParams>, ApplicationError> {
        Ok(self
            .entries
            .get(key)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// ConnectionResolver
// ---------------------------------------------------------------------------

/// Resolves configured connections, consulting discovery for keyed entries.
///
/// Performs no validation. Protocol-specific resolvers layer their own
/// checks and normalization on top.
#[derive(Clone, Default)]
pub struct ConnectionResolver {
    connections: Vec<ConnectionParams>,
    discovery: Option<Arc<dyn Discovery>>,
}

impl ConnectionResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the configured connections. A single `connection` comes first.
    pub fn configure(&mut self, connection: Option<ConnectionParams>, connections: &[ConnectionParams]) {
        self.connections = connection.into_iter().chain(connections.iter().cloned()).collect();
    }

    pub fn add(&mut self, connection: ConnectionParams) {
        self.connections.push(connection);
    }

    #[must_use]
    pub fn connections(&self) -> &[ConnectionParams] {
        &self.connections
    }

    /// Picks up the optional discovery collaborator.
    pub fn set_references(&mut self, references: &References) {
        self.discovery = references.get_optional::<dyn Discovery>(DISCOVERY);
    }

    pub fn set_discovery(&mut self, discovery: Arc<dyn Discovery>) {
        self.discovery = Some(discovery);
    }

    /// Returns the first usable connection, or `None` when nothing is configured.
    ///
    /// # Errors
    ///
    /// Returns `NO_DISCOVERY` when a keyed connection needs discovery and
    /// none is set, or the discovery error.
    pub async fn resolve(
        &self,
        correlation_id: Option<&str>,
    ) -> Result<Option<ConnectionParams>, ApplicationError> {
        for connection in &self.connections {
            if !connection.uses_discovery() {
                return Ok(Some(connection.clone()));
            }
            let key = connection.discovery_key.as_deref().unwrap_or_default();
            if let Some(found) = self.discovery(correlation_id)?.resolve_one(correlation_id, key).await? {
                debug!(correlation_id, key, "Resolved connection through discovery");
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Returns every configured connection with keyed entries expanded.
    ///
    /// # Errors
    ///
    /// Same as [`ConnectionResolver::resolve`].
    pub async fn resolve_all(
        &self,
        correlation_id: Option<&str>,
    ) -> Result<Vec<ConnectionParams>, ApplicationError> {
        let mut resolved = Vec::new();
        for connection in &self.connections {
            if connection.uses_discovery() {
                let key = connection.discovery_key.as_deref().unwrap_or_default();
                resolved.extend(self.discovery(correlation_id)?.resolve_all(correlation_id, key).await?);
            } else {
                resolved.push(connection.clone());
            }
        }
        Ok(resolved)
    }

    /// Publishes `connection` when it carries a discovery key. Returns whether
    /// anything was registered.
    ///
    /// # Errors
    ///
    /// Returns the discovery error.
    pub async fn register(
        &self,
        correlation_id: Option<&str>,
        connection: &ConnectionParams,
    ) -> Result<bool, ApplicationError> {
        let (Some(key), Some(discovery)) = (&connection.discovery_key, &self.discovery) else {
            return Ok(false);
        };
        discovery.register(correlation_id, key, connection).await?;
        Ok(true)
    }

    fn discovery(&self, correlation_id: Option<&str>) -> Result<&Arc<dyn Discovery>, ApplicationError> {
        self.discovery.as_ref().ok_or_else(|| {
            ApplicationError::configuration(
                correlation_id,
                "NO_DISCOVERY",
                "Discovery is not configured to resolve keyed connections",
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let params: ConnectionParams =
            serde_json::from_str(r#"{"host": "localhost", "port": 8080}"#).unwrap();
        assert_eq!(params.host.as_deref(), Some("localhost"));
        assert_eq!(params.port, Some(8080));
        assert!(params.protocol.is_none());
        assert!(!params.uses_discovery());
    }

    #[tokio::test]
    async fn memory_discovery_register_is_idempotent() {
        let discovery = MemoryDiscovery::new();
        let conn = ConnectionParams::from_host("http", "localhost", 3000);
        discovery.register(None, "svc", &conn).await.unwrap();
        discovery.register(None, "svc", &conn).await.unwrap();

        assert_eq!(discovery.resolve_all(None, "svc").await.unwrap(), vec![conn.clone()]);
        assert_eq!(discovery.resolve_one(None, "svc").await.unwrap(), Some(conn));
        assert!(discovery.resolve_one(None, "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolve_returns_first_configured() {
        let mut resolver = ConnectionResolver::new();
        resolver.configure(
            Some(ConnectionParams::from_uri("http://a:1")),
            &[ConnectionParams::from_uri("http://b:2")],
        );
        let conn = resolver.resolve(None).await.unwrap().unwrap();
        assert_eq!(conn.uri.as_deref(), Some("http://a:1"));
        assert_eq!(resolver.resolve_all(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn keyed_connection_resolves_through_discovery() {
        let discovery = Arc::new(MemoryDiscovery::new());
        let target = ConnectionParams::from_host("http", "10.0.0.1", 9000);
        discovery.register(None, "svc", &target).await.unwrap();

        let mut resolver = ConnectionResolver::new();
        resolver.add(ConnectionParams::default().with_discovery_key("svc"));
        resolver.set_discovery(discovery);

        assert_eq!(resolver.resolve(None).await.unwrap(), Some(target));
    }

    #[tokio::test]
    async fn keyed_connection_without_discovery_fails() {
        let mut resolver = ConnectionResolver::new();
        resolver.add(ConnectionParams::default().with_discovery_key("svc"));
        let err = resolver.resolve(Some("c")).await.unwrap_err();
        assert_eq!(err.code, "NO_DISCOVERY");
    }

    #[tokio::test]
    async fn register_skips_unkeyed_connections() {
        let discovery = Arc::new(MemoryDiscovery::new());
        let mut resolver = ConnectionResolver::new();
        resolver.set_discovery(discovery.clone());

        let plain = ConnectionParams::from_host("http", "localhost", 1);
        assert!(!resolver.register(None, &plain).await.unwrap());

        let keyed = plain.with_discovery_key("svc");
        assert!(resolver.register(None, &keyed).await.unwrap());
        assert_eq!(discovery.resolve_all(None, "svc").await.unwrap().len(), 1);
    }
}
