//! Configuration types for REST clients.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchyard_core::ConnectionParams;

/// Where the client puts the correlation id on outgoing requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationIdPlace {
    #[default]
    Query,
    #[serde(alias = "header")]
    Headers,
}

/// Configuration of a REST client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestClientConfig {
    /// Path prefix for all calls.
    pub base_route: String,
    pub connection: Option<ConnectionParams>,
    pub connections: Vec<ConnectionParams>,
    pub options: ClientOptions,
    /// Headers added to every request.
    pub headers: BTreeMap<String, String>,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            base_route: String::new(),
            connection: Some(ConnectionParams::from_host("http", "0.0.0.0", 3000)),
            connections: Vec::new(),
            options: ClientOptions::default(),
            headers: BTreeMap::new(),
        }
    }
}

impl RestClientConfig {
    /// Calls `base_route` on `uri` with default options.
    #[must_use]
    pub fn new(uri: &str, base_route: &str) -> Self {
        Self {
            base_route: base_route.to_string(),
            connection: Some(ConnectionParams::from_uri(uri)),
            ..Self::default()
        }
    }
}

/// Timeouts and retry budget. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Maximum number of attempts per call. Values below 1 mean 1.
    pub retries: u32,
    #[serde(rename = "connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
    /// Delay before the first retry.
    #[serde(rename = "retry_delay")]
    pub retry_delay_ms: u64,
    /// Upper bound for the growing retry delay. Defaults to ten times `retry_delay`.
    #[serde(rename = "retry_max_delay")]
    pub retry_max_delay_ms: Option<u64>,
    pub correlation_id_place: CorrelationIdPlace,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            connect_timeout_ms: 10_000,
            timeout_ms: 10_000,
            retry_delay_ms: 100,
            retry_max_delay_ms: None,
            correlation_id_place: CorrelationIdPlace::Query,
        }
    }
}

impl ClientOptions {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    #[must_use]
    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(
            self.retry_max_delay_ms
                .unwrap_or_else(|| self.retry_delay_ms.saturating_mul(10)),
        )
    }
}
