//! Configuration types for endpoints and REST services.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use switchyard_core::ConnectionParams;

/// Configuration of one HTTP listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Primary address to listen on.
    pub connection: Option<ConnectionParams>,
    /// Additional candidate addresses. The first resolvable one wins.
    pub connections: Vec<ConnectionParams>,
    pub options: EndpointOptions,
    pub credential: CredentialConfig,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            connection: Some(ConnectionParams::from_host("http", "0.0.0.0", 3000)),
            connections: Vec::new(),
            options: EndpointOptions::default(),
            credential: CredentialConfig::default(),
        }
    }
}

impl EndpointConfig {
    /// Listens on `host:port` over plain HTTP with default options.
    #[must_use]
    pub fn http(host: &str, port: u16) -> Self {
        Self {
            connection: Some(ConnectionParams::from_host("http", host, port)),
            ..Self::default()
        }
    }
}

/// Request handling options for an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointOptions {
    /// Maximum accepted request body size in bytes.
    pub request_max_size: usize,
    /// Enables per-request trace logging.
    pub debug: bool,
    /// Allowed CORS origins. `"*"` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            request_max_size: 1024 * 1024,
            debug: true,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// TLS material used when the connection protocol is `https`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub ssl_crt_file: Option<PathBuf>,
    pub ssl_key_file: Option<PathBuf>,
}

/// Configuration shared by every REST service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestServiceConfig {
    /// Path prefix for all routes of the service.
    pub base_route: String,
    /// Settings for the private endpoint created when no shared one is referenced.
    #[serde(flatten)]
    pub endpoint: EndpointConfig,
    pub swagger: SwaggerConfig,
}

impl RestServiceConfig {
    #[must_use]
    pub fn with_base_route(base_route: &str) -> Self {
        Self {
            base_route: base_route.to_string(),
            ..Self::default()
        }
    }
}

/// OpenAPI publication settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwaggerConfig {
    pub enable: bool,
    /// Route, relative to the base route, the document is served at.
    pub route: String,
    /// Generate the document from the command set (commandable services only).
    pub auto: bool,
}

impl Default for SwaggerConfig {
    fn default() -> Self {
        Self {
            enable: false,
            route: "swagger".to_string(),
            auto: true,
        }
    }
}
