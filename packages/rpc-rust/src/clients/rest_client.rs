//! Client side of the REST protocol.
//!
//! [`RestClient::call`] composes the URL from the resolved connection and the
//! base route, places the correlation id, runs the exchange through the retry
//! policy and maps the response back into a typed result or the
//! [`ApplicationError`] the server reported.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::HeaderName;
use http::{HeaderMap, HeaderValue, Method};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use switchyard_core::{
    ApplicationError, ErrorDescription, FilterParams, Openable, PagingParams, References,
};
use tracing::{debug, warn};

use super::config::{ClientOptions, CorrelationIdPlace, RestClientConfig};
use super::retry::{AttemptOutcome, RetryFailure, RetryPolicy};
use super::transport::{HttpTransport, ReqwestTransport, TransportRequest, TransportResponse};
use crate::connect::HttpConnectionResolver;
use crate::instrument::{InstrumentTiming, Instrumenter};
use crate::services::request::CORRELATION_ID;
use crate::services::rest_service::append_base_route;

// ---------------------------------------------------------------------------
// Route helpers
// ---------------------------------------------------------------------------

fn append_query(route: &str, key: &str, value: &str) -> String {
    let pair: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish();
    let separator = if route.contains('?') { '&' } else { '?' };
    format!("{route}{separator}{pair}")
}

/// Appends every filter entry as a query parameter.
#[must_use]
pub fn add_filter_params(route: &str, filter: &FilterParams) -> String {
    filter
        .iter()
        .fold(route.to_string(), |route, (key, value)| append_query(&route, key, value))
}

/// Appends `skip`, `take` and `total` when they are set.
#[must_use]
pub fn add_paging_params(route: &str, paging: &PagingParams) -> String {
    let mut route = route.to_string();
    if let Some(skip) = paging.skip {
        route = append_query(&route, "skip", &skip.to_string());
    }
    if let Some(take) = paging.take {
        route = append_query(&route, "take", &take.to_string());
    }
    if paging.total {
        route = append_query(&route, "total", "true");
    }
    route
}

// ---------------------------------------------------------------------------
// RestClient
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Connected {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

/// Calls a remote REST service.
pub struct RestClient {
    config: RestClientConfig,
    resolver: HttpConnectionResolver,
    instrumenter: Instrumenter,
    /// Replaces the `reqwest` transport when set.
    transport: Option<Arc<dyn HttpTransport>>,
    connected: RwLock<Option<Connected>>,
}

impl RestClient {
    #[must_use]
    pub fn new(config: RestClientConfig) -> Self {
        let mut resolver = HttpConnectionResolver::new();
        resolver.configure(config.connection.clone(), &config.connections);
        Self {
            config,
            resolver,
            instrumenter: Instrumenter::default(),
            transport: None,
            connected: RwLock::new(None),
        }
    }

    /// Uses `transport` instead of building a `reqwest` client on open.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the configuration. Takes effect at the next open.
    pub fn configure(&mut self, config: RestClientConfig) {
        self.resolver
            .configure(config.connection.clone(), &config.connections);
        self.config = config;
    }

    pub fn set_references(&mut self, references: &References) {
        self.resolver.set_references(references);
        self.instrumenter = Instrumenter::from_references(references);
    }

    #[must_use]
    pub fn base_route(&self) -> &str {
        &self.config.base_route
    }

    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.config.options
    }

    /// Starts a client-side timing for `name`.
    pub fn instrument_call(&self, correlation_id: Option<&str>, name: &str) -> InstrumentTiming {
        self.instrumenter.instrument_call(correlation_id, name)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.connected.read().is_some()
    }

    /// Resolves the connection and prepares the transport. No request is sent.
    ///
    /// # Errors
    ///
    /// Returns connection resolution errors.
    pub async fn open(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        if self.is_open() {
            return Ok(());
        }

        let connection = self.resolver.resolve(correlation_id).await?;
        let base_url = connection.uri.unwrap_or_default();
        let transport = match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => Arc::new(
                ReqwestTransport::new(&self.config.options)
                    .map_err(|e| e.with_correlation_id(correlation_id))?,
            ),
        };

        debug!(correlation_id, "Connected to REST service at {}", base_url);
        *self.connected.write() = Some(Connected { base_url, transport });
        Ok(())
    }

    /// Releases the transport.
    ///
    /// # Errors
    ///
    /// Currently infallible; the signature matches [`Openable`].
    pub async fn close(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        if let Some(connected) = self.connected.write().take() {
            debug!(correlation_id, "Disconnected from {}", connected.base_url);
        }
        Ok(())
    }

    /// Sends a request without a body and decodes the response as `T`.
    ///
    /// # Errors
    ///
    /// See [`RestClient::call_with_body`].
    pub async fn call<T: DeserializeOwned>(
        &self,
        correlation_id: Option<&str>,
        method: Method,
        route: &str,
    ) -> Result<T, ApplicationError> {
        self.execute(correlation_id, method, route, None).await
    }

    /// Sends `body` as JSON and decodes the response as `T`. An empty or
    /// `204` response decodes as JSON `null`.
    ///
    /// # Errors
    ///
    /// Returns `NOT_OPENED` before open, `SERIALIZATION_FAILED` or
    /// `DESERIALIZATION_FAILED` for JSON failures, `NO_RESPONSE` when every
    /// attempt failed, or the error the server responded with.
    pub async fn call_with_body<T, B>(
        &self,
        correlation_id: Option<&str>,
        method: Method,
        route: &str,
        body: &B,
    ) -> Result<T, ApplicationError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(body).map_err(|e| {
            ApplicationError::invocation(correlation_id, "SERIALIZATION_FAILED", "Failed to serialize request body")
                .with_cause(e)
        })?;
        self.execute(correlation_id, method, route, Some(Bytes::from(body)))
            .await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        correlation_id: Option<&str>,
        method: Method,
        route: &str,
        body: Option<Bytes>,
    ) -> Result<T, ApplicationError> {
        let Some(connected) = self.connected.read().clone() else {
            return Err(ApplicationError::invalid_state(
                correlation_id,
                "NOT_OPENED",
                "The REST client is not opened",
            ));
        };

        let request = self.build_request(correlation_id, &connected.base_url, method, route, body);
        let url = request.url.clone();
        let transport = connected.transport;

        let outcome = RetryPolicy::from_options(&self.config.options)
            .run(|_attempt| {
                let transport = Arc::clone(&transport);
                let request = request.clone();
                async move {
                    match transport.send(request).await {
                        Ok(response) => AttemptOutcome::Success(response),
                        Err(err) if err.is_transient() => AttemptOutcome::Transient(err),
                        Err(err) => AttemptOutcome::Fatal(err),
                    }
                }
            })
            .await;

        let response = match outcome {
            Ok(response) => response,
            Err(RetryFailure::Exhausted { attempts, last }) => {
                return Err(ApplicationError::unknown(
                    correlation_id,
                    "NO_RESPONSE",
                    "Unable to get a response from the server",
                )
                .with_cause(last)
                .with_details("url", url)
                .with_details("attempts", attempts));
            }
            Err(RetryFailure::Fatal(err)) => {
                return Err(ApplicationError::invocation(
                    correlation_id,
                    "INVALID_REQUEST",
                    "The request could not be sent",
                )
                .with_cause(err)
                .with_details("url", url));
            }
        };

        decode_response(correlation_id, &response)
    }

    fn build_request(
        &self,
        correlation_id: Option<&str>,
        base_url: &str,
        method: Method,
        route: &str,
        body: Option<Bytes>,
    ) -> TransportRequest {
        let mut url = format!(
            "{}{}",
            base_url.trim_end_matches('/'),
            append_base_route(&self.config.base_route, route)
        );

        let mut headers = HeaderMap::new();
        for (name, value) in &self.config.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(correlation_id, "Skipping invalid default header {name}"),
            }
        }

        if let Some(cid) = correlation_id {
            match self.config.options.correlation_id_place {
                CorrelationIdPlace::Query => url = append_query(&url, CORRELATION_ID, cid),
                CorrelationIdPlace::Headers => match HeaderValue::from_str(cid) {
                    Ok(value) => {
                        headers.insert(CORRELATION_ID, value);
                    }
                    Err(_) => url = append_query(&url, CORRELATION_ID, cid),
                },
            }
        }

        TransportRequest {
            method,
            url,
            headers,
            body,
        }
    }
}

/// Maps a complete response into `T` or the error it carries.
fn decode_response<T: DeserializeOwned>(
    correlation_id: Option<&str>,
    response: &TransportResponse,
) -> Result<T, ApplicationError> {
    if response.status >= 400 {
        return Err(error_from_response(correlation_id, response));
    }

    let value = if response.status == 204 || response.body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&response.body).map_err(|e| deserialization_failed(correlation_id, e))?
    };
    serde_json::from_value(value).map_err(|e| deserialization_failed(correlation_id, e))
}

fn deserialization_failed(correlation_id: Option<&str>, err: serde_json::Error) -> ApplicationError {
    ApplicationError::invocation(
        correlation_id,
        "DESERIALIZATION_FAILED",
        "Failed to deserialize the response",
    )
    .with_cause(err)
}

fn error_from_response(correlation_id: Option<&str>, response: &TransportResponse) -> ApplicationError {
    match serde_json::from_slice::<ErrorDescription>(&response.body) {
        Ok(description) => ApplicationError::from(description).with_correlation_id(correlation_id),
        Err(_) => {
            let text = String::from_utf8_lossy(&response.body).trim().to_string();
            let message = if text.is_empty() {
                format!("Server responded with status {}", response.status)
            } else {
                text
            };
            ApplicationError::unknown(correlation_id, "UNKNOWN_ERROR", message)
                .with_status(response.status)
        }
    }
}

#[async_trait]
impl Openable for RestClient {
    fn is_open(&self) -> bool {
        RestClient::is_open(self)
    }

    async fn open(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        RestClient::open(self, correlation_id).await
    }

    async fn close(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        RestClient::close(self, correlation_id).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use parking_lot::Mutex;
    use serde_json::json;
    use switchyard_core::ErrorCategory;

    use super::*;
    use crate::clients::transport::TransportError;

    /// Fails the first `failures` sends, then answers with `response`.
    struct ScriptedTransport {
        failures: u32,
        calls: AtomicU32,
        response: TransportResponse,
        seen: Mutex<Vec<TransportRequest>>,
    }

    impl ScriptedTransport {
        fn new(failures: u32, status: u16, body: Value) -> Arc<Self> {
            let body = if body.is_null() {
                Bytes::new()
            } else {
                Bytes::from(body.to_string())
            };
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
                response: TransportResponse { status, body },
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
            self.seen.lock().push(request);
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(TransportError::Connect("connection refused".into()))
            } else {
                Ok(self.response.clone())
            }
        }
    }

    fn config(retries: u32, place: CorrelationIdPlace) -> RestClientConfig {
        let mut config = RestClientConfig::new("http://localhost:3000", "/v1/dummy");
        config.options.retries = retries;
        config.options.retry_delay_ms = 1;
        config.options.correlation_id_place = place;
        config
    }

    async fn opened(config: RestClientConfig, transport: Arc<ScriptedTransport>) -> RestClient {
        let client = RestClient::new(config).with_transport(transport);
        client.open(None).await.unwrap();
        client
    }

    #[test]
    fn route_helpers_append_query() {
        let route = add_filter_params("dummies", &FilterParams::new().with("key", "a b"));
        assert_eq!(route, "dummies?key=a+b");
        let route = add_paging_params(&route, &PagingParams::new(Some(10), Some(5), true));
        assert_eq!(route, "dummies?key=a+b&skip=10&take=5&total=true");
        assert_eq!(add_paging_params("dummies", &PagingParams::default()), "dummies");
    }

    #[tokio::test]
    async fn call_before_open_is_invalid_state() {
        let client = RestClient::new(config(1, CorrelationIdPlace::Query));
        let err = client
            .call::<Value>(Some("c"), Method::GET, "dummies")
            .await
            .unwrap_err();
        assert_eq!(err.code, "NOT_OPENED");
        assert_eq!(err.category, ErrorCategory::InvalidState);
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let transport = ScriptedTransport::new(2, 200, json!({"id": "1"}));
        let client = opened(config(3, CorrelationIdPlace::Query), Arc::clone(&transport)).await;

        let value: Value = client
            .call_with_body(Some("abc"), Method::POST, "get_dummy_by_id", &json!({"dummy_id": "1"}))
            .await
            .unwrap();
        assert_eq!(value, json!({"id": "1"}));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);

        let seen = transport.seen.lock();
        assert_eq!(
            seen[0].url,
            "http://localhost:3000/v1/dummy/get_dummy_by_id?correlation_id=abc"
        );
        assert_eq!(seen[0].method, Method::POST);
    }

    #[tokio::test]
    async fn exhausted_budget_is_no_response() {
        let transport = ScriptedTransport::new(u32::MAX, 200, Value::Null);
        let client = opened(config(2, CorrelationIdPlace::Query), Arc::clone(&transport)).await;

        let err = client
            .call::<Value>(Some("c"), Method::GET, "dummies")
            .await
            .unwrap_err();
        assert_eq!(err.code, "NO_RESPONSE");
        assert_eq!(err.category, ErrorCategory::Unknown);
        assert_eq!(err.details["attempts"], 2);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_retries_still_attempts_once() {
        let transport = ScriptedTransport::new(0, 200, json!(true));
        let client = opened(config(0, CorrelationIdPlace::Query), Arc::clone(&transport)).await;
        let value: bool = client.call(None, Method::GET, "ping").await.unwrap();
        assert!(value);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn error_response_is_reconstructed() {
        let body = json!({
            "category": "NotFound",
            "status": 404,
            "code": "TEST_ERROR",
            "message": "Dummy error",
            "correlation_id": "abc",
            "details": {"id": "1"}
        });
        let transport = ScriptedTransport::new(0, 404, body);
        let client = opened(config(3, CorrelationIdPlace::Query), Arc::clone(&transport)).await;

        let err = client
            .call::<Value>(Some("abc"), Method::GET, "dummies")
            .await
            .unwrap_err();
        assert_eq!(err.code, "TEST_ERROR");
        assert_eq!(err.status, 404);
        assert_eq!(err.category, ErrorCategory::NotFound);
        assert_eq!(err.details["id"], "1");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_description_error_body_is_unknown_error() {
        let transport = ScriptedTransport::new(0, 502, json!("bad gateway"));
        let client = opened(config(1, CorrelationIdPlace::Query), transport).await;

        let err = client.call::<Value>(None, Method::GET, "x").await.unwrap_err();
        assert_eq!(err.code, "UNKNOWN_ERROR");
        assert_eq!(err.status, 502);
        assert_eq!(err.message, "\"bad gateway\"");
    }

    #[tokio::test]
    async fn empty_response_decodes_as_none() {
        let transport = ScriptedTransport::new(0, 204, Value::Null);
        let client = opened(config(1, CorrelationIdPlace::Query), transport).await;
        let value: Option<u32> = client.call(None, Method::DELETE, "dummies/1").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn malformed_success_body_fails_deserialization() {
        let transport = ScriptedTransport::new(0, 200, json!({"id": 1}));
        let client = opened(config(1, CorrelationIdPlace::Query), transport).await;
        let err = client
            .call::<Vec<String>>(None, Method::GET, "x")
            .await
            .unwrap_err();
        assert_eq!(err.code, "DESERIALIZATION_FAILED");
    }

    #[tokio::test]
    async fn correlation_id_and_default_headers_go_in_headers() {
        let transport = ScriptedTransport::new(0, 200, json!(1));
        let mut config = config(1, CorrelationIdPlace::Headers);
        config.headers.insert("x-api-key".into(), "secret".into());
        let client = opened(config, Arc::clone(&transport)).await;

        let _: u32 = client.call(Some("abc"), Method::GET, "x").await.unwrap();
        let seen = transport.seen.lock();
        assert_eq!(seen[0].url, "http://localhost:3000/v1/dummy/x");
        assert_eq!(seen[0].headers[CORRELATION_ID], "abc");
        assert_eq!(seen[0].headers["x-api-key"], "secret");
    }

    #[tokio::test]
    async fn open_and_close_are_idempotent() {
        let transport = ScriptedTransport::new(0, 200, json!(1));
        let client = RestClient::new(config(1, CorrelationIdPlace::Query)).with_transport(transport);
        client.open(None).await.unwrap();
        client.open(None).await.unwrap();
        assert!(client.is_open());
        client.close(None).await.unwrap();
        client.close(None).await.unwrap();
        assert!(!client.is_open());
    }
}
