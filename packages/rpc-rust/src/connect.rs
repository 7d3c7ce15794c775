//! HTTP connection resolution and validation.

use switchyard_core::{ApplicationError, ConnectionParams, ConnectionResolver, References};
use url::Url;

const DEFAULT_PROTOCOL: &str = "http";

/// Resolves the address of one HTTP endpoint from configuration or discovery.
///
/// Every resolved connection is validated and normalized: afterwards
/// `protocol`, `host`, `port` and `uri` are all set and agree with each other.
#[derive(Clone, Default)]
pub struct HttpConnectionResolver {
    resolver: ConnectionResolver,
}

impl HttpConnectionResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the configured connections. `connection` takes precedence.
    pub fn configure(&mut self, connection: Option<ConnectionParams>, connections: &[ConnectionParams]) {
        self.resolver.configure(connection, connections);
    }

    pub fn set_references(&mut self, references: &References) {
        self.resolver.set_references(references);
    }

    /// Resolves and normalizes the first configured connection.
    ///
    /// # Errors
    ///
    /// Returns `NO_CONNECTION`, `WRONG_PROTOCOL`, `WRONG_URI`, `NO_HOST` or
    /// `NO_PORT` configuration errors, or a discovery failure.
    pub async fn resolve(&self, correlation_id: Option<&str>) -> Result<ConnectionParams, ApplicationError> {
        let connection = self.resolver.resolve(correlation_id).await?;
        let mut connection = validate_connection(correlation_id, connection)?;
        normalize_connection(correlation_id, &mut connection)?;
        Ok(connection)
    }

    /// Resolves and normalizes every configured connection.
    ///
    /// # Errors
    ///
    /// Fails on the first connection that does not validate.
    pub async fn resolve_all(
        &self,
        correlation_id: Option<&str>,
    ) -> Result<Vec<ConnectionParams>, ApplicationError> {
        let connections = self.resolver.resolve_all(correlation_id).await?;
        if connections.is_empty() {
            return Err(no_connection(correlation_id));
        }
        connections
            .into_iter()
            .map(|connection| {
                let mut connection = validate_connection(correlation_id, Some(connection))?;
                normalize_connection(correlation_id, &mut connection)?;
                Ok(connection)
            })
            .collect()
    }

    /// Re-resolves the configured connection and publishes it to discovery
    /// when it carries a discovery key.
    ///
    /// # Errors
    ///
    /// Returns resolution or discovery errors.
    pub async fn register(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        let connection = self.resolve(correlation_id).await?;
        self.resolver.register(correlation_id, &connection).await?;
        Ok(())
    }
}

fn no_connection(correlation_id: Option<&str>) -> ApplicationError {
    ApplicationError::configuration(correlation_id, "NO_CONNECTION", "HTTP connection is not set")
}

/// Checks a connection in a fixed order: presence, protocol, then address.
/// A non-empty `uri` makes host and port optional; an empty one is dropped.
fn validate_connection(
    correlation_id: Option<&str>,
    connection: Option<ConnectionParams>,
) -> Result<ConnectionParams, ApplicationError> {
    let mut connection = connection.ok_or_else(|| no_connection(correlation_id))?;
    if connection.uri.as_deref().is_some_and(str::is_empty) {
        connection.uri = None;
    }

    let protocol = connection.protocol.as_deref().unwrap_or(DEFAULT_PROTOCOL);
    if connection.uri.is_none() && !is_http(protocol) {
        return Err(wrong_protocol(correlation_id, protocol));
    }
    if connection.uri.is_some() {
        return Ok(connection);
    }

    if connection.host.as_deref().is_none_or(str::is_empty) {
        return Err(ApplicationError::configuration(
            correlation_id,
            "NO_HOST",
            "Connection host is not set",
        ));
    }
    if connection.port.unwrap_or(0) == 0 {
        return Err(ApplicationError::configuration(
            correlation_id,
            "NO_PORT",
            "Connection port is not set",
        ));
    }
    Ok(connection)
}

/// Makes protocol/host/port and uri agree. The uri is authoritative when set.
fn normalize_connection(
    correlation_id: Option<&str>,
    connection: &mut ConnectionParams,
) -> Result<(), ApplicationError> {
    if let Some(uri) = connection.uri.clone() {
        let parsed = Url::parse(&uri).map_err(|e| wrong_uri(correlation_id, &uri).with_cause(e))?;
        if !is_http(parsed.scheme()) {
            return Err(wrong_protocol(correlation_id, parsed.scheme()));
        }
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| wrong_uri(correlation_id, &uri))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| wrong_uri(correlation_id, &uri))?;

        connection.protocol = Some(parsed.scheme().to_string());
        connection.host = Some(host.to_string());
        connection.port = Some(port);
    } else {
        let protocol = connection
            .protocol
            .get_or_insert_with(|| DEFAULT_PROTOCOL.to_string())
            .clone();
        let host = connection.host.clone().unwrap_or_default();
        let port = connection.port.unwrap_or_default();
        connection.uri = Some(format!("{protocol}://{host}:{port}"));
    }
    Ok(())
}

fn is_http(protocol: &str) -> bool {
    protocol == "http" || protocol == "https"
}

fn wrong_protocol(correlation_id: Option<&str>, protocol: &str) -> ApplicationError {
    ApplicationError::configuration(
        correlation_id,
        "WRONG_PROTOCOL",
        format!("Protocol is not supported by REST connection: {protocol}"),
    )
    .with_details("protocol", protocol)
}

fn wrong_uri(correlation_id: Option<&str>, uri: &str) -> ApplicationError {
    ApplicationError::configuration(
        correlation_id,
        "WRONG_URI",
        format!("Connection uri is not a valid HTTP address: {uri}"),
    )
    .with_details("uri", uri)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
