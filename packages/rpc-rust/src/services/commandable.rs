//! REST service that publishes a controller's command set.
//!
//! Every command becomes `POST {base_route}/{name}`. The request body is the
//! parameter map, the command's schema is checked by the command itself and
//! the result goes through the standard response helpers.

use std::ops::Deref;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use http::Method;
use parking_lot::RwLock;
use switchyard_core::refer::{CONTEXT_INFO, CONTROLLER};
use switchyard_core::{ApplicationError, CommandSet, Commandable, ContextInfo, References};
use tracing::{warn, Instrument};

use super::config::RestServiceConfig;
use super::request::HttpRequest;
use super::response::send_result;
use super::rest_service::{RestRoutes, RestService, ServiceRoutes};
use super::swagger::command_set_to_open_api;

/// Metric and trace name of a command served under `base_route`.
///
/// Leading and trailing slashes of the base route are dropped, inner ones
/// kept: `("/v1/dummy/", "ping")` names `v1/dummy.ping`, `("", "ping")`
/// names `ping`.
#[must_use]
pub fn operation_name(base_route: &str, command: &str) -> String {
    let base = base_route.trim_matches('/');
    if base.is_empty() {
        command.to_string()
    } else {
        format!("{base}.{command}")
    }
}

/// Routes generated from the `controller` reference's command set.
#[derive(Default)]
pub struct CommandableRoutes {
    commands: ArcSwapOption<CommandSet>,
    title: RwLock<Option<String>>,
}

impl CommandableRoutes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `controller`'s commands without going through references.
    pub fn set_controller(&self, controller: &dyn Commandable) {
        self.commands.store(Some(controller.command_set()));
    }
}

impl RestRoutes for CommandableRoutes {
    fn register(&self, routes: &mut ServiceRoutes<'_>) {
        let Some(commands) = self.commands.load_full() else {
            warn!(
                "Commandable service at {:?} has no controller; no routes registered",
                routes.base_route()
            );
            return;
        };

        for command in commands.commands() {
            let command = command.clone();
            let name = operation_name(routes.base_route(), command.name());
            let instrumenter = routes.instrumenter().clone();
            let route = command.name().to_string();

            routes.register_route(Method::POST, &route, None, move |request: HttpRequest| {
                let command = command.clone();
                let name = name.clone();
                let instrumenter = instrumenter.clone();
                async move {
                    let correlation_id = request.correlation_id().map(str::to_string);
                    let correlation_id = correlation_id.as_deref();
                    let timing = instrumenter.instrument_exec(correlation_id, &name);
                    let result = async {
                        let params = request
                            .body_as_parameters()
                            .map_err(|e| e.with_correlation_id(correlation_id))?;
                        command.execute(correlation_id, params).await
                    }
                    .instrument(timing.span())
                    .await;
                    timing.end_timing(&result);
                    send_result(result)
                }
            });
        }

        let swagger = routes.swagger();
        if swagger.enable && swagger.auto {
            let title = self
                .title
                .read()
                .clone()
                .unwrap_or_else(|| "CommandableHttpService".to_string());
            match command_set_to_open_api(&title, routes.base_route(), &commands) {
                Ok(document) => routes.register_open_api_spec(document),
                Err(err) => warn!("Failed to generate OpenAPI document: {err}"),
            }
        }
    }

    fn set_references(&self, references: &References) -> Result<(), ApplicationError> {
        let controller = references.get_required::<dyn Commandable>(CONTROLLER)?;
        self.commands.store(Some(controller.command_set()));
        *self.title.write() = references
            .get_optional::<ContextInfo>(CONTEXT_INFO)
            .map(|info| info.name.clone());
        Ok(())
    }

    fn unset_references(&self) {
        self.commands.store(None);
    }
}

/// [`RestService`] serving a controller's command set under a base route.
#[derive(Clone)]
pub struct CommandableHttpService {
    service: RestService,
    routes: Arc<CommandableRoutes>,
}

impl CommandableHttpService {
    #[must_use]
    pub fn new(base_route: &str) -> Self {
        let routes = Arc::new(CommandableRoutes::new());
        let service = RestService::from_routes(Arc::clone(&routes) as Arc<dyn RestRoutes>);
        service.configure(RestServiceConfig::with_base_route(base_route));
        Self { service, routes }
    }

    /// Replaces the configuration, keeping the base route when `config` leaves it empty.
    pub fn configure(&self, mut config: RestServiceConfig) {
        if config.base_route.is_empty() {
            config.base_route = self.service.base_route();
        }
        self.service.configure(config);
    }

    pub fn set_controller(&self, controller: &dyn Commandable) {
        self.routes.set_controller(controller);
    }
}

impl Deref for CommandableHttpService {
    type Target = RestService;

    fn deref(&self) -> &RestService {
        &self.service
    }
}
