//! Base for services that expose operations over HTTP under a base route.
//!
//! A [`RestService`] owns the lifecycle plumbing: it finds or creates an
//! endpoint, registers itself as a route source, and opens/closes a private
//! endpoint when it has one. The actual routes come from a [`RestRoutes`]
//! implementation.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use http::Method;
use parking_lot::RwLock;
use switchyard_core::refer::ENDPOINT;
use switchyard_core::{ApplicationError, ObjectSchema, Openable, References};
use tracing::debug;

use super::config::{RestServiceConfig, SwaggerConfig};
use super::endpoint::{HttpEndpoint, Registrable, RouteRegistrar};
use super::request::HttpRequest;
use crate::instrument::Instrumenter;

// ---------------------------------------------------------------------------
// RestRoutes
// ---------------------------------------------------------------------------

/// Route definitions of a concrete service.
pub trait RestRoutes: Send + Sync + 'static {
    /// Adds the service's routes. Called every time the endpoint opens.
    fn register(&self, routes: &mut ServiceRoutes<'_>);

    /// Picks up collaborators such as the controller.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a required reference is missing.
    fn set_references(&self, _references: &References) -> Result<(), ApplicationError> {
        Ok(())
    }

    fn unset_references(&self) {}
}

/// Route registrar scoped to one service's base route.
pub struct ServiceRoutes<'a> {
    registrar: &'a mut RouteRegistrar,
    config: &'a RestServiceConfig,
    instrumenter: &'a Instrumenter,
}

impl ServiceRoutes<'_> {
    #[must_use]
    pub fn base_route(&self) -> &str {
        &self.config.base_route
    }

    #[must_use]
    pub fn swagger(&self) -> &SwaggerConfig {
        &self.config.swagger
    }

    #[must_use]
    pub fn instrumenter(&self) -> &Instrumenter {
        self.instrumenter
    }

    /// Registers `route` below the base route.
    pub fn register_route<F, Fut>(
        &mut self,
        method: Method,
        route: &str,
        schema: Option<ObjectSchema>,
        handler: F,
    ) where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let path = append_base_route(&self.config.base_route, route);
        self.registrar.register_route(method, &path, schema, handler);
    }

    /// Registers `route` below the base route, guarded by `authorize`.
    pub fn register_route_with_auth<F, Fut, A>(
        &mut self,
        method: Method,
        route: &str,
        schema: Option<ObjectSchema>,
        authorize: A,
        handler: F,
    ) where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
        A: Fn(&HttpRequest) -> Result<(), ApplicationError> + Send + Sync + 'static,
    {
        let path = append_base_route(&self.config.base_route, route);
        self.registrar
            .register_route_with_auth(method, &path, schema, authorize, handler);
    }

    /// Serves `content` with GET at `{base_route}/{swagger.route}` when
    /// `swagger.enable` is set. JSON documents get a JSON content type,
    /// anything else is served as YAML.
    pub fn register_open_api_spec(&mut self, content: String) {
        if !self.config.swagger.enable {
            return;
        }
        let content_type = if content.trim_start().starts_with('{') {
            "application/json"
        } else {
            "application/x-yaml"
        };
        let content: Arc<str> = content.into();
        let route = self.config.swagger.route.clone();
        self.register_route(Method::GET, &route, None, move |_request| {
            let content = Arc::clone(&content);
            async move { ([(CONTENT_TYPE, content_type)], content.to_string()).into_response() }
        });
    }
}

/// Joins a base route and a route with exactly one `/` between non-empty parts.
#[must_use]
pub fn append_base_route(base_route: &str, route: &str) -> String {
    let base = base_route.trim_matches('/');
    let route = route.trim_matches('/');
    match (base.is_empty(), route.is_empty()) {
        (true, _) => format!("/{route}"),
        (false, true) => format!("/{base}"),
        (false, false) => format!("/{base}/{route}"),
    }
}

// ---------------------------------------------------------------------------
// RestService
// ---------------------------------------------------------------------------

struct ServiceCore {
    config: RwLock<RestServiceConfig>,
    routes: Arc<dyn RestRoutes>,
    instrumenter: RwLock<Instrumenter>,
    endpoint: RwLock<Option<Arc<HttpEndpoint>>>,
    local_endpoint: AtomicBool,
    opened: AtomicBool,
}

impl Registrable for ServiceCore {
    fn register(&self, registrar: &mut RouteRegistrar) {
        let config = self.config.read().clone();
        let instrumenter = self.instrumenter.read().clone();
        let mut routes = ServiceRoutes {
            registrar,
            config: &config,
            instrumenter: &instrumenter,
        };
        self.routes.register(&mut routes);
    }
}

/// A service mounted on a shared or private [`HttpEndpoint`].
///
/// Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct RestService {
    core: Arc<ServiceCore>,
}

impl RestService {
    pub fn new(routes: impl RestRoutes) -> Self {
        Self::from_routes(Arc::new(routes))
    }

    #[must_use]
    pub fn from_routes(routes: Arc<dyn RestRoutes>) -> Self {
        Self {
            core: Arc::new(ServiceCore {
                config: RwLock::new(RestServiceConfig::default()),
                routes,
                instrumenter: RwLock::new(Instrumenter::default()),
                endpoint: RwLock::new(None),
                local_endpoint: AtomicBool::new(false),
                opened: AtomicBool::new(false),
            }),
        }
    }

    /// Replaces the configuration. Takes effect at the next endpoint open.
    pub fn configure(&self, config: RestServiceConfig) {
        *self.core.config.write() = config;
    }

    #[must_use]
    pub fn config(&self) -> RestServiceConfig {
        self.core.config.read().clone()
    }

    #[must_use]
    pub fn base_route(&self) -> String {
        self.core.config.read().base_route.clone()
    }

    /// The endpoint the service is registered with, if any.
    #[must_use]
    pub fn endpoint(&self) -> Option<Arc<HttpEndpoint>> {
        self.core.endpoint.read().clone()
    }

    #[must_use]
    pub fn has_local_endpoint(&self) -> bool {
        self.core.local_endpoint.load(Ordering::Acquire)
    }

    fn registrable(&self) -> Arc<dyn Registrable> {
        Arc::clone(&self.core) as Arc<dyn Registrable>
    }

    fn create_local_endpoint(&self) -> Arc<HttpEndpoint> {
        let endpoint = Arc::new(HttpEndpoint::new(self.core.config.read().endpoint.clone()));
        self.core.local_endpoint.store(true, Ordering::Release);
        endpoint
    }

    /// Looks up collaborators and registers with the `endpoint` reference,
    /// or with a newly created private endpoint when none is supplied.
    ///
    /// # Errors
    ///
    /// Returns the route owner's reference errors, or `ALREADY_OPENED` when
    /// the shared endpoint is already open.
    pub fn set_references(&self, references: &References) -> Result<(), ApplicationError> {
        *self.core.instrumenter.write() = Instrumenter::from_references(references);
        self.core.routes.set_references(references)?;

        if let Some(previous) = self.core.endpoint.write().take() {
            previous.unregister(&self.registrable());
        }

        let endpoint = if let Some(shared) = references.get_optional::<HttpEndpoint>(ENDPOINT) {
            self.core.local_endpoint.store(false, Ordering::Release);
            shared
        } else {
            let local = self.create_local_endpoint();
            local.set_references(references);
            local
        };

        endpoint.register(self.registrable())?;
        *self.core.endpoint.write() = Some(endpoint);
        Ok(())
    }

    /// Detaches from the endpoint and releases collaborators.
    pub fn unset_references(&self) {
        self.core.routes.unset_references();
        if let Some(endpoint) = self.core.endpoint.write().take() {
            endpoint.unregister(&self.registrable());
        }
    }

    /// Opens the service. A private endpoint is opened too; a shared one is
    /// left to its owner.
    ///
    /// # Errors
    ///
    /// Returns the private endpoint's open error.
    pub async fn open(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        if self.is_open() {
            return Ok(());
        }

        let existing = self.core.endpoint.read().clone();
        let endpoint = match existing {
            Some(endpoint) => endpoint,
            None => {
                let local = self.create_local_endpoint();
                local.register(self.registrable())?;
                *self.core.endpoint.write() = Some(Arc::clone(&local));
                local
            }
        };

        if self.has_local_endpoint() {
            endpoint.open(correlation_id).await?;
        }
        self.core.opened.store(true, Ordering::Release);
        debug!(correlation_id, "Opened service at base route {:?}", self.base_route());
        Ok(())
    }

    /// Closes the service and its private endpoint.
    ///
    /// # Errors
    ///
    /// Returns `NO_ENDPOINT` when the service is open but has lost its endpoint.
    pub async fn close(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        if !self.is_open() {
            return Ok(());
        }

        let Some(endpoint) = self.endpoint() else {
            return Err(ApplicationError::invalid_state(
                correlation_id,
                "NO_ENDPOINT",
                "HTTP endpoint is missing",
            ));
        };

        if self.has_local_endpoint() {
            endpoint.close(correlation_id).await?;
        }
        self.core.opened.store(false, Ordering::Release);
        Ok(())
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.core.opened.load(Ordering::Acquire)
    }

    /// Routes the service would register at the next endpoint open.
    #[cfg(test)]
    pub(crate) fn collect_routes(&self) -> RouteRegistrar {
        let mut registrar = RouteRegistrar::new();
        self.core.register(&mut registrar);
        registrar
    }
}

#[async_trait]
impl Openable for RestService {
    fn is_open(&self) -> bool {
        RestService::is_open(self)
    }

    async fn open(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        RestService::open(self, correlation_id).await
    }

    async fn close(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        RestService::close(self, correlation_id).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
