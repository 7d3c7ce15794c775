//! Shared HTTP endpoint with deferred route registration.
//!
//! Services register themselves as route sources while the endpoint is
//! closed. `open()` asks every registered owner for its routes, builds one
//! immutable router, binds the listener and starts serving:
//!
//! Closed -> Opening -> Open -> Closing -> Closed
//!
//! A failed open returns to Closed without leaving a listener behind.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::{RawPathParams, Request};
use axum::response::Response;
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{HeaderMap, Method, Uri};
use parking_lot::{Mutex, RwLock};
use switchyard_core::{ApplicationError, ConnectionParams, ObjectSchema, Openable, References};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::{CredentialConfig, EndpointConfig, EndpointOptions};
use super::middleware::apply_http_layers;
use super::request::HttpRequest;
use super::response::send_error;
use crate::connect::HttpConnectionResolver;

/// How long `close()` waits for in-flight requests before aborting the server.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// EndpointState
// ---------------------------------------------------------------------------

/// Lifecycle state of an [`HttpEndpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Closed,
    Opening,
    Open,
    Closing,
}

impl EndpointState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Closing => "closing",
        }
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// Boxed future produced by a route handler.
pub type RouteFuture = BoxFuture<'static, Response>;

/// Handler invoked with the buffered request.
pub type RouteHandler = Arc<dyn Fn(HttpRequest) -> RouteFuture + Send + Sync>;

/// Predicate run before the handler. An error becomes the response.
pub type Authorizer = Arc<dyn Fn(&HttpRequest) -> Result<(), ApplicationError> + Send + Sync>;

/// One registered route. Never mutated after registration.
pub struct Route {
    pub method: Method,
    /// Normalized path: leading `/`, no empty segments, `{name}` parameters.
    pub path: String,
    pub schema: Option<ObjectSchema>,
    authorize: Option<Authorizer>,
    handler: RouteHandler,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("schema", &self.schema.is_some())
            .field("authorize", &self.authorize.is_some())
            .finish_non_exhaustive()
    }
}

impl Route {
    async fn dispatch(&self, request: HttpRequest) -> Response {
        let correlation_id = request.correlation_id().map(str::to_string);

        if let Some(authorize) = &self.authorize {
            if let Err(err) = authorize(&request) {
                return send_error(err.with_correlation_id(correlation_id.as_deref()));
            }
        }
        if let Some(schema) = &self.schema {
            if let Err(err) = schema.validate_and_throw(correlation_id.as_deref(), &request.parameters()) {
                return send_error(err);
            }
        }
        (self.handler)(request).await
    }
}

/// Collects routes from a [`Registrable`] owner.
#[derive(Default)]
pub struct RouteRegistrar {
    routes: Vec<Route>,
}

impl RouteRegistrar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route. A leading `/` in `path` is ignored and `:name`
    /// segments are accepted as `{name}` parameters.
    pub fn register_route<F, Fut>(
        &mut self,
        method: Method,
        path: &str,
        schema: Option<ObjectSchema>,
        handler: F,
    ) where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.push(method, path, schema, None, handler);
    }

    /// Adds a route guarded by `authorize`.
    pub fn register_route_with_auth<F, Fut, A>(
        &mut self,
        method: Method,
        path: &str,
        schema: Option<ObjectSchema>,
        authorize: A,
        handler: F,
    ) where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
        A: Fn(&HttpRequest) -> Result<(), ApplicationError> + Send + Sync + 'static,
    {
        self.push(method, path, schema, Some(Arc::new(authorize)), handler);
    }

    fn push<F, Fut>(
        &mut self,
        method: Method,
        path: &str,
        schema: Option<ObjectSchema>,
        authorize: Option<Authorizer>,
        handler: F,
    ) where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.routes.push(Route {
            method,
            path: normalize_path(path),
            schema,
            authorize,
            handler: Arc::new(move |request| -> RouteFuture {
                Box::pin(handler(request))
            }),
        });
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    fn into_routes(self) -> Vec<Route> {
        self.routes
    }
}

/// Converts a route path into the router's syntax.
fn normalize_path(path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.to_string(),
        })
        .collect();
    format!("/{}", segments.join("/"))
}

/// A source of routes for an endpoint.
pub trait Registrable: Send + Sync {
    /// Adds the owner's routes. Called once per endpoint `open()`.
    fn register(&self, registrar: &mut RouteRegistrar);
}

fn same_owner(a: &Arc<dyn Registrable>, b: &Arc<dyn Registrable>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

// ---------------------------------------------------------------------------
// HttpEndpoint
// ---------------------------------------------------------------------------

struct RunningServer {
    url: String,
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// One HTTP listener shared by any number of services.
pub struct HttpEndpoint {
    options: EndpointOptions,
    credential: CredentialConfig,
    resolver: RwLock<HttpConnectionResolver>,
    state: ArcSwap<EndpointState>,
    registrations: RwLock<Vec<Arc<dyn Registrable>>>,
    server: Mutex<Option<RunningServer>>,
    /// Serializes `open()` and `close()`.
    lifecycle: tokio::sync::Mutex<()>,
}

impl HttpEndpoint {
    #[must_use]
    pub fn new(config: EndpointConfig) -> Self {
        let mut resolver = HttpConnectionResolver::new();
        resolver.configure(config.connection, &config.connections);
        Self {
            options: config.options,
            credential: config.credential,
            resolver: RwLock::new(resolver),
            state: ArcSwap::from_pointee(EndpointState::Closed),
            registrations: RwLock::new(Vec::new()),
            server: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Picks up the optional discovery collaborator.
    pub fn set_references(&self, references: &References) {
        self.resolver.write().set_references(references);
    }

    #[must_use]
    pub fn state(&self) -> EndpointState {
        **self.state.load()
    }

    /// Address the listener is bound to, while open.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.lock().as_ref().map(|s| s.local_addr)
    }

    /// Resolved URL of the endpoint, while open.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.server.lock().as_ref().map(|s| s.url.clone())
    }

    /// Adds a route source. Routes are collected at the next `open()`.
    ///
    /// # Errors
    ///
    /// Returns `ALREADY_OPENED` unless the endpoint is closed.
    pub fn register(&self, owner: Arc<dyn Registrable>) -> Result<(), ApplicationError> {
        let state = self.state();
        if state != EndpointState::Closed {
            return Err(ApplicationError::invalid_state(
                None,
                "ALREADY_OPENED",
                "Routes cannot be registered after the HTTP endpoint was opened",
            )
            .with_details("state", state.as_str()));
        }
        let mut registrations = self.registrations.write();
        if !registrations.iter().any(|r| same_owner(r, &owner)) {
            registrations.push(owner);
        }
        Ok(())
    }

    /// Removes a route source. An open endpoint keeps serving its routes until closed.
    pub fn unregister(&self, owner: &Arc<dyn Registrable>) {
        self.registrations.write().retain(|r| !same_owner(r, owner));
    }

    /// Builds the router from every registered owner's routes.
    fn build_router(&self, correlation_id: Option<&str>) -> Result<Router, ApplicationError> {
        let mut registrar = RouteRegistrar::new();
        for owner in self.registrations.read().iter() {
            owner.register(&mut registrar);
        }

        let limit = self.options.request_max_size;
        let mut seen = HashSet::new();
        let mut by_path: BTreeMap<String, MethodRouter> = BTreeMap::new();

        for route in registrar.into_routes() {
            if !seen.insert((route.method.clone(), route.path.clone())) {
                return Err(ApplicationError::configuration(
                    correlation_id,
                    "DUPLICATE_ROUTE",
                    format!("Route {} {} is registered twice", route.method, route.path),
                )
                .with_details("route", route.path.clone()));
            }
            let filter = MethodFilter::try_from(route.method.clone()).map_err(|_| {
                ApplicationError::configuration(
                    correlation_id,
                    "UNSUPPORTED_METHOD",
                    format!("HTTP method {} cannot be routed", route.method),
                )
            })?;

            debug!(correlation_id, "Registered route {} {}", route.method, route.path);
            let path = route.path.clone();
            let route = Arc::new(route);
            let handler = move |params: Result<RawPathParams, RawPathParamsRejection>,
                                request: Request| {
                let route = Arc::clone(&route);
                async move {
                    let path_params: BTreeMap<String, String> = params
                        .map(|params| {
                            params
                                .iter()
                                .map(|(k, v)| (k.to_string(), v.to_string()))
                                .collect()
                        })
                        .unwrap_or_default();
                    match HttpRequest::from_request(request, limit).await {
                        Ok(request) => route.dispatch(request.with_path_params(path_params)).await,
                        Err(err) => send_error(err),
                    }
                }
            };

            let method_router = by_path
                .remove(&path)
                .unwrap_or_else(MethodRouter::new)
                .on(filter, handler);
            by_path.insert(path, method_router);
        }

        let router = by_path
            .into_iter()
            .fold(Router::new(), |router, (path, method_router)| {
                router.route(&path, method_router)
            })
            .fallback(route_not_found);

        Ok(apply_http_layers(router, &self.options))
    }

    /// Opens the endpoint. No-op when already open.
    ///
    /// # Errors
    ///
    /// Returns resolution, route or credential configuration errors, or
    /// `CANNOT_CONNECT` when the listener cannot be bound.
    pub async fn open(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.state() == EndpointState::Open {
            return Ok(());
        }

        self.state.store(Arc::new(EndpointState::Opening));
        match self.start(correlation_id).await {
            Ok(server) => {
                info!(correlation_id, "Opened REST service at {}", server.url);
                *self.server.lock() = Some(server);
                self.state.store(Arc::new(EndpointState::Open));
                Ok(())
            }
            Err(err) => {
                self.state.store(Arc::new(EndpointState::Closed));
                Err(err)
            }
        }
    }

    async fn start(&self, correlation_id: Option<&str>) -> Result<RunningServer, ApplicationError> {
        let resolver = self.resolver.read().clone();
        let connection = resolver.resolve(correlation_id).await?;
        let router = self.build_router(correlation_id)?;

        let url = connection.uri.clone().unwrap_or_default();
        let https = connection.protocol.as_deref() == Some("https");
        let tls = if https {
            Some(self.load_tls(correlation_id, &url).await?)
        } else {
            None
        };

        let listener = bind(correlation_id, &connection, &url).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| cannot_connect(correlation_id, &url).with_cause(e))?;

        let (shutdown, signal) = oneshot::channel();
        let task = match tls {
            Some(tls) => serve_tls(listener, router, tls, signal)
                .map_err(|e| cannot_connect(correlation_id, &url).with_cause(e))?,
            None => serve_plain(listener, router, signal),
        };

        // Only a listening endpoint is published to discovery.
        if let Err(err) = resolver.register(correlation_id).await {
            let _ = shutdown.send(());
            let _ = task.await;
            return Err(err);
        }

        Ok(RunningServer {
            url,
            local_addr,
            shutdown,
            task,
        })
    }

    async fn load_tls(&self, correlation_id: Option<&str>, url: &str) -> Result<RustlsConfig, ApplicationError> {
        let (Some(crt), Some(key)) = (&self.credential.ssl_crt_file, &self.credential.ssl_key_file) else {
            return Err(ApplicationError::configuration(
                correlation_id,
                "NO_CREDENTIAL",
                "SSL certificate and key files are required for https",
            ));
        };
        RustlsConfig::from_pem_file(crt, key)
            .await
            .map_err(|e| cannot_connect(correlation_id, url).with_cause(e))
    }

    /// Stops the listener. No-op when closed. Shutdown failures are logged, not returned.
    ///
    /// # Errors
    ///
    /// Currently infallible; the signature matches [`Openable`].
    pub async fn close(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        let _lifecycle = self.lifecycle.lock().await;
        let Some(server) = self.server.lock().take() else {
            self.state.store(Arc::new(EndpointState::Closed));
            return Ok(());
        };

        self.state.store(Arc::new(EndpointState::Closing));
        let RunningServer {
            url,
            shutdown,
            mut task,
            ..
        } = server;
        let _ = shutdown.send(());

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await {
            Ok(Ok(())) => info!(correlation_id, "Closed REST service at {}", url),
            Ok(Err(e)) => warn!(correlation_id, "Failed while closing REST service at {}: {e}", url),
            Err(_) => {
                warn!(correlation_id, "Timed out closing REST service at {}", url);
                task.abort();
            }
        }

        self.state.store(Arc::new(EndpointState::Closed));
        Ok(())
    }
}

#[async_trait]
impl Openable for HttpEndpoint {
    fn is_open(&self) -> bool {
        self.state() == EndpointState::Open
    }

    async fn open(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        HttpEndpoint::open(self, correlation_id).await
    }

    async fn close(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        HttpEndpoint::close(self, correlation_id).await
    }
}

fn cannot_connect(correlation_id: Option<&str>, url: &str) -> ApplicationError {
    ApplicationError::connection(
        correlation_id,
        "CANNOT_CONNECT",
        "Opening HTTP endpoint failed",
    )
    .with_details("url", url)
}

async fn bind(
    correlation_id: Option<&str>,
    connection: &ConnectionParams,
    url: &str,
) -> Result<TcpListener, ApplicationError> {
    let host = connection.host.as_deref().unwrap_or("0.0.0.0");
    let port = connection.port.unwrap_or_default();
    TcpListener::bind((host, port))
        .await
        .map_err(|e| cannot_connect(correlation_id, url).with_cause(e))
}

async fn route_not_found(method: Method, uri: Uri, headers: HeaderMap) -> Response {
    let request = HttpRequest::new(method, uri, headers, Bytes::new());
    let path = request.uri.path().to_string();
    send_error(
        ApplicationError::not_found(
            request.correlation_id(),
            "ROUTE_NOT_FOUND",
            format!("Route {} {path} is not registered", request.method),
        )
        .with_details("route", path),
    )
}

/// Serves plain HTTP until `signal` fires or its sender is dropped.
fn serve_plain(listener: TcpListener, router: Router, signal: oneshot::Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = signal.await;
            })
            .await;
        if let Err(e) = result {
            warn!("HTTP server stopped with error: {e}");
        }
    })
}

/// Serves TLS connections using `axum-server` with rustls.
///
/// Reuses the pre-bound listener by converting it to a `std::net::TcpListener`.
fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: RustlsConfig,
    signal: oneshot::Receiver<()>,
) -> std::io::Result<JoinHandle<()>> {
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    tokio::spawn(async move {
        let _ = signal.await;
        shutdown_handle.graceful_shutdown(Some(SHUTDOWN_TIMEOUT));
    });

    Ok(tokio::spawn(async move {
        let result = axum_server::from_tcp_rustls(std_listener, tls)
            .handle(handle)
            .serve(router.into_make_service())
            .await;
        if let Err(e) = result {
            warn!("HTTPS server stopped with error: {e}");
        }
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use switchyard_core::TypeCode;
    use tower::ServiceExt;

    use super::*;
    use crate::services::response::send_result;

    struct EchoRoutes;

    impl Registrable for EchoRoutes {
        fn register(&self, registrar: &mut RouteRegistrar) {
            registrar.register_route(Method::GET, "/echo/:id", None, |request: HttpRequest| async move {
                send_result(Ok(json!({
                    "id": request.path_param("id"),
                    "correlation_id": request.correlation_id(),
                })))
            });
            registrar.register_route(
                Method::POST,
                "echo",
                Some(ObjectSchema::new().with_required_property("body", TypeCode::Object)),
                |request: HttpRequest| async move { send_result(request.body_as_json()) },
            );
            registrar.register_route_with_auth(
                Method::GET,
                "secret",
                None,
                |_request: &HttpRequest| {
                    Err(ApplicationError::unauthorized(None, "NOT_SIGNED", "User must be signed in"))
                },
                |_request: HttpRequest| async move { send_result(Ok("hidden")) },
            );
        }
    }

    struct DuplicateRoutes;

    impl Registrable for DuplicateRoutes {
        fn register(&self, registrar: &mut RouteRegistrar) {
            registrar.register_route(Method::GET, "/echo/{id}", None, |_request: HttpRequest| async move {
                send_result(Ok(Value::Null))
            });
        }
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn endpoint_with(owners: Vec<Arc<dyn Registrable>>) -> HttpEndpoint {
        let endpoint = HttpEndpoint::new(EndpointConfig::http("127.0.0.1", free_port()));
        for owner in owners {
            endpoint.register(owner).unwrap();
        }
        endpoint
    }

    async fn call(router: Router, request: http::Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[test]
    fn normalize_path_strips_slashes_and_converts_params() {
        assert_eq!(normalize_path("/v1/dummy/"), "/v1/dummy");
        assert_eq!(normalize_path("v1//dummy"), "/v1/dummy");
        assert_eq!(normalize_path("dummies/:id"), "/dummies/{id}");
        assert_eq!(normalize_path(""), "/");
    }

    #[tokio::test]
    async fn routes_dispatch_with_path_params_and_correlation_id() {
        let endpoint = endpoint_with(vec![Arc::new(EchoRoutes)]);
        let router = endpoint.build_router(None).unwrap();

        let (status, body) = call(
            router,
            http::Request::get("/echo/42?correlation_id=abc").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"id": "42", "correlation_id": "abc"}));
    }

    #[tokio::test]
    async fn schema_failure_is_invalid_data() {
        let endpoint = endpoint_with(vec![Arc::new(EchoRoutes)]);
        let router = endpoint.build_router(None).unwrap();

        let (status, body) = call(router, http::Request::post("/echo").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_DATA");
    }

    #[tokio::test]
    async fn authorize_rejection_becomes_response() {
        let endpoint = endpoint_with(vec![Arc::new(EchoRoutes)]);
        let router = endpoint.build_router(None).unwrap();

        let (status, body) = call(router, http::Request::get("/secret").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "NOT_SIGNED");
    }

    #[tokio::test]
    async fn oversized_body_gets_error_description() {
        let mut config = EndpointConfig::http("127.0.0.1", free_port());
        config.options.request_max_size = 16;
        let endpoint = HttpEndpoint::new(config);
        endpoint.register(Arc::new(EchoRoutes)).unwrap();
        let router = endpoint.build_router(None).unwrap();

        let (status, body) = call(
            router,
            http::Request::post("/echo?correlation_id=big")
                .header("content-length", "110")
                .body(Body::from("x".repeat(110)))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        let description: switchyard_core::ErrorDescription = serde_json::from_value(body).unwrap();
        assert_eq!(description.code, "REQUEST_TOO_LARGE");
        assert_eq!(description.status, 413);
        assert_eq!(description.correlation_id.as_deref(), Some("big"));
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let endpoint = endpoint_with(vec![Arc::new(EchoRoutes)]);
        let router = endpoint.build_router(None).unwrap();

        let (status, body) = call(router, http::Request::get("/missing").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "ROUTE_NOT_FOUND");
    }

    #[test]
    fn duplicate_routes_are_rejected() {
        let endpoint = endpoint_with(vec![Arc::new(EchoRoutes), Arc::new(DuplicateRoutes)]);
        let err = endpoint.build_router(None).unwrap_err();
        assert_eq!(err.code, "DUPLICATE_ROUTE");
    }

    #[test]
    fn registering_same_owner_twice_keeps_one_entry() {
        let owner: Arc<dyn Registrable> = Arc::new(EchoRoutes);
        let endpoint = endpoint_with(vec![owner.clone(), owner.clone()]);
        assert_eq!(endpoint.registrations.read().len(), 1);

        endpoint.unregister(&owner);
        assert!(endpoint.registrations.read().is_empty());
    }

    #[tokio::test]
    async fn open_close_cycle_follows_state_machine() {
        let endpoint = endpoint_with(vec![Arc::new(EchoRoutes)]);
        assert_eq!(endpoint.state(), EndpointState::Closed);

        endpoint.open(None).await.unwrap();
        assert!(endpoint.is_open());
        assert!(endpoint.local_addr().is_some());

        // Second open is a no-op.
        endpoint.open(None).await.unwrap();

        let err = endpoint.register(Arc::new(DuplicateRoutes)).unwrap_err();
        assert_eq!(err.code, "ALREADY_OPENED");

        endpoint.close(None).await.unwrap();
        assert_eq!(endpoint.state(), EndpointState::Closed);
        assert!(endpoint.local_addr().is_none());

        // Closing twice is fine.
        endpoint.close(None).await.unwrap();
    }

    #[tokio::test]
    async fn bind_failure_returns_to_closed() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();
        let endpoint = HttpEndpoint::new(EndpointConfig::http("127.0.0.1", port));

        let err = endpoint.open(Some("c")).await.unwrap_err();
        assert_eq!(err.code, "CANNOT_CONNECT");
        assert_eq!(err.details["url"], format!("http://127.0.0.1:{port}"));
        assert_eq!(endpoint.state(), EndpointState::Closed);
    }

    #[tokio::test]
    async fn https_without_credentials_is_misconfigured() {
        let endpoint = HttpEndpoint::new(EndpointConfig {
            connection: Some(ConnectionParams::from_host("https", "127.0.0.1", free_port())),
            ..EndpointConfig::default()
        });
        let err = endpoint.open(None).await.unwrap_err();
        assert_eq!(err.code, "NO_CREDENTIAL");
        assert_eq!(endpoint.state(), EndpointState::Closed);
    }
}
