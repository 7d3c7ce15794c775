//! Liveness route answering with the current server time.

use http::Method;
use serde::{Deserialize, Serialize};
use switchyard_core::ApplicationError;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::config::RestServiceConfig;
use super::request::HttpRequest;
use super::response::send_result;
use super::rest_service::{RestRoutes, RestService, ServiceRoutes};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    #[serde(flatten)]
    pub service: RestServiceConfig,
    /// Route below the base route.
    pub route: String,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            service: RestServiceConfig::default(),
            route: "heartbeat".to_string(),
        }
    }
}

/// Formats `time` as an RFC 3339 string.
///
/// # Errors
///
/// Returns an internal error for dates outside the RFC 3339 range.
pub(crate) fn rfc3339(time: OffsetDateTime) -> Result<String, ApplicationError> {
    time.format(&Rfc3339).map_err(|e| {
        ApplicationError::internal(None, "TIME_FORMAT", "Failed to format time").with_cause(e)
    })
}

struct HeartbeatRoutes {
    route: String,
}

impl RestRoutes for HeartbeatRoutes {
    fn register(&self, routes: &mut ServiceRoutes<'_>) {
        routes.register_route(Method::GET, &self.route, None, |request: HttpRequest| async move {
            let result = rfc3339(OffsetDateTime::now_utc())
                .map_err(|e| e.with_correlation_id(request.correlation_id()));
            send_result(result)
        });
    }
}

/// Builds a service answering GET `{base_route}/{route}` with the current UTC time.
#[must_use]
pub fn heartbeat_service(config: HeartbeatConfig) -> RestService {
    let service = RestService::new(HeartbeatRoutes { route: config.route });
    service.configure(config.service);
    service
}
