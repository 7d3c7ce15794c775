//! About operation describing the server process and the calling client.
//!
//! [`AboutOperations`] is a reusable handler: any service can mount
//! [`AboutOperations::operation`] with `ServiceRoutes::register_route`.
//! [`about_service`] wraps it as a standalone service.

use std::collections::BTreeMap;
use std::future::{ready, Ready};
use std::sync::Arc;
use std::time::SystemTime;

use axum::response::Response;
use http::header::{HOST, USER_AGENT};
use http::uri::Authority;
use http::Method;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use switchyard_core::refer::CONTEXT_INFO;
use switchyard_core::{ApplicationError, ContextInfo, References};
use time::OffsetDateTime;

use super::config::RestServiceConfig;
use super::heartbeat::rfc3339;
use super::request::HttpRequest;
use super::response::send_result;
use super::rest_service::{RestRoutes, RestService, ServiceRoutes};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AboutConfig {
    #[serde(flatten)]
    pub service: RestServiceConfig,
    pub route: String,
}

impl Default for AboutConfig {
    fn default() -> Self {
        Self {
            service: RestServiceConfig::default(),
            route: "about".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AboutServer {
    pub name: String,
    pub description: Option<String>,
    pub properties: BTreeMap<String, String>,
    /// Milliseconds since `start_time`.
    pub uptime: u64,
    pub start_time: String,
    pub current_time: String,
    pub protocol: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AboutClient {
    pub address: Option<String>,
    /// Raw `User-Agent` header.
    pub client: Option<String>,
}

/// Body of the about response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AboutReport {
    pub server: AboutServer,
    pub client: AboutClient,
}

fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

/// Shared state behind the about handler. Clones see the same references.
#[derive(Debug, Clone)]
pub struct AboutOperations {
    started: SystemTime,
    context: Arc<RwLock<Option<Arc<ContextInfo>>>>,
}

impl Default for AboutOperations {
    fn default() -> Self {
        Self::new()
    }
}

impl AboutOperations {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: SystemTime::now(),
            context: Arc::new(RwLock::new(None)),
        }
    }

    /// Picks up the optional context info.
    pub fn set_references(&self, references: &References) {
        *self.context.write() = references.get_optional::<ContextInfo>(CONTEXT_INFO);
    }

    pub fn unset_references(&self) {
        *self.context.write() = None;
    }

    /// Describes this process as seen by `request`.
    ///
    /// # Errors
    ///
    /// Returns an internal error when a timestamp cannot be formatted.
    pub fn report(&self, request: &HttpRequest) -> Result<AboutReport, ApplicationError> {
        let context = self.context.read().clone();
        let (name, description, properties, start_time) = match context.as_deref() {
            Some(info) => (
                info.name.clone(),
                info.description.clone(),
                info.properties.clone(),
                info.start_time,
            ),
            None => ("unknown".to_string(), None, BTreeMap::new(), self.started),
        };
        let now = SystemTime::now();
        let uptime = now
            .duration_since(start_time)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));

        let protocol = header(request, "x-forwarded-proto")
            .or_else(|| request.uri.scheme_str())
            .unwrap_or("http")
            .to_string();
        let authority = header(request, HOST.as_str())
            .and_then(|h| h.parse::<Authority>().ok())
            .or_else(|| request.uri.authority().cloned());
        let host = authority.as_ref().map(|a| a.host().to_string());
        let port = authority.as_ref().and_then(Authority::port_u16);
        let url = match &authority {
            Some(a) => format!("{protocol}://{a}{}", request.uri.path()),
            None => request.uri.path().to_string(),
        };

        let address = header(request, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .or_else(|| header(request, "x-real-ip"))
            .map(|v| v.trim().to_string());

        Ok(AboutReport {
            server: AboutServer {
                name,
                description,
                properties,
                uptime,
                start_time: rfc3339(OffsetDateTime::from(start_time))?,
                current_time: rfc3339(OffsetDateTime::from(now))?,
                protocol,
                host,
                port,
                url,
            },
            client: AboutClient {
                address,
                client: header(request, USER_AGENT.as_str()).map(str::to_string),
            },
        })
    }

    /// Handler for `ServiceRoutes::register_route`.
    pub fn operation(&self) -> impl Fn(HttpRequest) -> Ready<Response> + Clone + Send + Sync + 'static {
        let operations = self.clone();
        move |request: HttpRequest| {
            let result = operations
                .report(&request)
                .map_err(|e| e.with_correlation_id(request.correlation_id()));
            ready(send_result(result))
        }
    }
}

struct AboutRoutes {
    route: String,
    operations: AboutOperations,
}

impl RestRoutes for AboutRoutes {
    fn register(&self, routes: &mut ServiceRoutes<'_>) {
        routes.register_route(Method::GET, &self.route, None, self.operations.operation());
    }

    fn set_references(&self, references: &References) -> Result<(), ApplicationError> {
        self.operations.set_references(references);
        Ok(())
    }

    fn unset_references(&self) {
        self.operations.unset_references();
    }
}

/// Builds a service answering GET `{base_route}/{route}` with an [`AboutReport`].
#[must_use]
pub fn about_service(config: AboutConfig) -> RestService {
    let service = RestService::new(AboutRoutes {
        route: config.route,
        operations: AboutOperations::new(),
    });
    service.configure(config.service);
    service
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue, StatusCode, Uri};

    use super::*;

    fn request(uri: &str, headers: &[(&'static str, &'static str)]) -> HttpRequest {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_static(value));
        }
        HttpRequest::new(Method::GET, uri.parse::<Uri>().unwrap(), map, Bytes::new())
    }

    #[test]
    fn report_describes_server_and_client() {
        let mut info = ContextInfo::new("dummy-server", "node-1")
            .with_description("test process")
            .with_property("region", "local");
        info.start_time = SystemTime::now() - Duration::from_secs(2);
        let references = References::new();
        references.put(CONTEXT_INFO, Arc::new(info));

        let operations = AboutOperations::new();
        operations.set_references(&references);
        let report = operations
            .report(&request(
                "/about",
                &[
                    ("host", "api.local:8080"),
                    ("user-agent", "curl/8.0"),
                    ("x-forwarded-for", "10.0.0.7, 10.0.0.1"),
                ],
            ))
            .unwrap();

        assert_eq!(report.server.name, "dummy-server");
        assert_eq!(report.server.description.as_deref(), Some("test process"));
        assert_eq!(report.server.properties["region"], "local");
        assert!(report.server.uptime >= 2_000);
        assert_eq!(report.server.protocol, "http");
        assert_eq!(report.server.host.as_deref(), Some("api.local"));
        assert_eq!(report.server.port, Some(8080));
        assert_eq!(report.server.url, "http://api.local:8080/about");
        assert_eq!(report.client.address.as_deref(), Some("10.0.0.7"));
        assert_eq!(report.client.client.as_deref(), Some("curl/8.0"));
    }

    #[test]
    fn report_without_context_is_unknown() {
        let operations = AboutOperations::new();
        let report = operations
            .report(&request("/about", &[("x-real-ip", "192.168.1.2")]))
            .unwrap();
        assert_eq!(report.server.name, "unknown");
        assert!(report.server.host.is_none());
        assert_eq!(report.server.url, "/about");
        assert_eq!(report.client.address.as_deref(), Some("192.168.1.2"));
        assert!(report.client.client.is_none());
    }

    #[test]
    fn unset_references_forgets_context() {
        let references = References::new();
        references.put(CONTEXT_INFO, Arc::new(ContextInfo::new("svc", "1")));
        let operations = AboutOperations::new();
        operations.set_references(&references);
        operations.unset_references();
        let report = operations.report(&request("/about", &[])).unwrap();
        assert_eq!(report.server.name, "unknown");
    }

    #[tokio::test]
    async fn operation_answers_with_json_report() {
        let handler = AboutOperations::new().operation();
        let response = handler(request("/about?correlation_id=a1", &[("host", "localhost:3000")])).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let report: AboutReport = serde_json::from_slice(&body).unwrap();
        assert_eq!(report.server.port, Some(3000));
    }

    #[test]
    fn about_route_is_mounted_under_base_route() {
        let service = about_service(AboutConfig {
            service: RestServiceConfig::with_base_route("api"),
            ..AboutConfig::default()
        });
        let registrar = service.collect_routes();
        assert_eq!(registrar.routes()[0].path, "/api/about");
        assert_eq!(registrar.routes()[0].method, Method::GET);
    }
}
