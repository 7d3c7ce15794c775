//! Status route describing the running process.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

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
pub struct StatusConfig {
    #[serde(flatten)]
    pub service: RestServiceConfig,
    pub route: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            service: RestServiceConfig::default(),
            route: "status".to_string(),
        }
    }
}

/// Body of the status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub start_time: String,
    pub current_time: String,
    /// Milliseconds since `start_time`.
    pub uptime: u64,
    pub properties: BTreeMap<String, String>,
    /// Names of the registered references.
    pub components: Vec<String>,
}

struct StatusState {
    context: Option<Arc<ContextInfo>>,
    components: Vec<String>,
}

struct StatusRoutes {
    route: String,
    started: SystemTime,
    state: Arc<RwLock<StatusState>>,
}

impl StatusRoutes {
    fn report(started: SystemTime, state: &StatusState) -> Result<StatusReport, ApplicationError> {
        let (id, name, description, start_time, properties) = match &state.context {
            Some(info) => (
                info.context_id.clone(),
                info.name.clone(),
                info.description.clone(),
                info.start_time,
                info.properties.clone(),
            ),
            None => (String::new(), "unknown".to_string(), None, started, BTreeMap::new()),
        };
        let now = SystemTime::now();
        let uptime = now
            .duration_since(start_time)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));

        Ok(StatusReport {
            id,
            name,
            description,
            start_time: rfc3339(OffsetDateTime::from(start_time))?,
            current_time: rfc3339(OffsetDateTime::from(now))?,
            uptime,
            properties,
            components: state.components.clone(),
        })
    }
}

impl RestRoutes for StatusRoutes {
    fn register(&self, routes: &mut ServiceRoutes<'_>) {
        let started = self.started;
        let state = Arc::clone(&self.state);
        routes.register_route(Method::GET, &self.route, None, move |request: HttpRequest| {
            let result = Self::report(started, &state.read())
                .map_err(|e| e.with_correlation_id(request.correlation_id()));
            async move { send_result(result) }
        });
    }

    fn set_references(&self, references: &References) -> Result<(), ApplicationError> {
        let mut state = self.state.write();
        state.context = references.get_optional::<ContextInfo>(CONTEXT_INFO);
        state.components = references.names();
        Ok(())
    }

    fn unset_references(&self) {
        let mut state = self.state.write();
        state.context = None;
        state.components.clear();
    }
}

/// Builds a service answering GET `{base_route}/{route}` with a [`StatusReport`].
#[must_use]
pub fn status_service(config: StatusConfig) -> RestService {
    let service = RestService::new(StatusRoutes {
        route: config.route,
        started: SystemTime::now(),
        state: Arc::new(RwLock::new(StatusState {
            context: None,
            components: Vec::new(),
        })),
    });
    service.configure(config.service);
    service
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn report_uses_context_info() {
        let mut info = ContextInfo::new("dummy-server", "node-1")
            .with_description("test process")
            .with_property("region", "local");
        info.start_time = SystemTime::now() - Duration::from_secs(5);

        let state = StatusState {
            context: Some(Arc::new(info)),
            components: vec!["context-info".to_string(), "controller".to_string()],
        };
        let report = StatusRoutes::report(SystemTime::now(), &state).unwrap();

        assert_eq!(report.id, "node-1");
        assert_eq!(report.name, "dummy-server");
        assert_eq!(report.description.as_deref(), Some("test process"));
        assert!(report.uptime >= 5_000);
        assert_eq!(report.properties["region"], "local");
        assert_eq!(report.components, vec!["context-info", "controller"]);
    }

    #[test]
    fn report_without_context_is_unknown() {
        let state = StatusState {
            context: None,
            components: Vec::new(),
        };
        let report = StatusRoutes::report(SystemTime::now(), &state).unwrap();
        assert_eq!(report.name, "unknown");
        assert!(report.id.is_empty());
    }

    #[test]
    fn set_references_collects_component_names() {
        let references = References::new();
        references.put(CONTEXT_INFO, Arc::new(ContextInfo::new("svc", "1")));

        let service = status_service(StatusConfig::default());
        service.set_references(&references).unwrap();
        let registrar = service.collect_routes();
        assert_eq!(registrar.routes()[0].path, "/status");
    }
}
