//! Buffered view of an inbound HTTP request handed to route handlers.

use std::collections::BTreeMap;

use axum::body::Body;
use axum::extract::Request;
use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use switchyard_core::{ApplicationError, FilterParams, PagingParams, Parameters};

/// Name of the query parameter and header carrying the correlation id.
pub const CORRELATION_ID: &str = "correlation_id";

/// Fully buffered HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Values captured by `{name}` segments of the route.
    pub path_params: BTreeMap<String, String>,
    /// Decoded query parameters. The first occurrence of a name wins.
    pub query: BTreeMap<String, String>,
    pub body: Bytes,
}

impl HttpRequest {
    #[must_use]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        let mut query = BTreeMap::new();
        if let Some(raw) = uri.query() {
            for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
                query.entry(key.into_owned()).or_insert_with(|| value.into_owned());
            }
        }
        Self {
            method,
            uri,
            headers,
            path_params: BTreeMap::new(),
            query,
            body,
        }
    }

    #[must_use]
    pub fn with_path_params(mut self, path_params: BTreeMap<String, String>) -> Self {
        self.path_params = path_params;
        self
    }

    /// Buffers the body of an axum request, reading at most `limit` bytes.
    ///
    /// # Errors
    ///
    /// Returns `REQUEST_TOO_LARGE` (413) when the declared length exceeds
    /// `limit`, or `READ_ERROR` when the body cannot be read.
    pub async fn from_request(request: Request<Body>, limit: usize) -> Result<Self, ApplicationError> {
        let (parts, body) = request.into_parts();
        let head = Self::new(parts.method, parts.uri, parts.headers, Bytes::new());

        let declared = head
            .headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared.is_some_and(|len| len > u64::try_from(limit).unwrap_or(u64::MAX)) {
            return Err(too_large(head.correlation_id(), limit));
        }

        match axum::body::to_bytes(body, limit).await {
            Ok(body) => Ok(Self { body, ..head }),
            Err(e) => Err(ApplicationError::bad_request(
                head.correlation_id(),
                "READ_ERROR",
                "Failed to read request body",
            )
            .with_cause(e)
            .with_details("limit", limit)),
        }
    }

    /// Correlation id from the `correlation_id` query parameter, falling back
    /// to the `correlation_id` header. Empty values count as absent.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.query_param(CORRELATION_ID).or_else(|| {
            self.headers
                .get(CORRELATION_ID)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
        })
    }

    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// Parses the body as JSON. An empty body is `Null`.
    ///
    /// # Errors
    ///
    /// Returns `EXPECTED_JSON` when the body is not valid JSON.
    pub fn body_as_json(&self) -> Result<Value, ApplicationError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body).map_err(|e| {
            ApplicationError::bad_request(
                self.correlation_id(),
                "EXPECTED_JSON",
                "Request body must be valid JSON",
            )
            .with_cause(e)
        })
    }

    /// Deserializes the JSON body into `T`.
    ///
    /// # Errors
    ///
    /// Returns `EXPECTED_JSON` or `INVALID_BODY`.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, ApplicationError> {
        serde_json::from_value(self.body_as_json()?).map_err(|e| {
            ApplicationError::bad_request(self.correlation_id(), "INVALID_BODY", e.to_string())
        })
    }

    /// Parses the body as command parameters. Empty and `null` bodies yield none.
    ///
    /// # Errors
    ///
    /// Returns `EXPECTED_JSON` or `EXPECTED_JSON_OBJECT`.
    pub fn body_as_parameters(&self) -> Result<Parameters, ApplicationError> {
        Parameters::from_json(self.correlation_id(), self.body_as_json()?)
    }

    /// Query, path parameters and the JSON body (under `body`) merged into
    /// one object, the shape route schemas validate against.
    #[must_use]
    pub fn parameters(&self) -> Value {
        let mut merged = Map::new();
        for (key, value) in self.query.iter().chain(self.path_params.iter()) {
            merged.insert(key.clone(), Value::String(value.clone()));
        }
        if let Ok(body) = self.body_as_json() {
            if !body.is_null() {
                merged.insert("body".to_string(), body);
            }
        }
        Value::Object(merged)
    }

    /// Every query parameter except paging and correlation keys.
    #[must_use]
    pub fn filter_params(&self) -> FilterParams {
        let mut filter = FilterParams::new();
        for (key, value) in &self.query {
            if !matches!(key.as_str(), "skip" | "take" | "total" | CORRELATION_ID) {
                filter = filter.with(key, value.clone());
            }
        }
        filter
    }

    /// `skip`, `take` and `total` query parameters. Malformed numbers are ignored.
    #[must_use]
    pub fn paging_params(&self) -> PagingParams {
        PagingParams::new(
            self.query_param("skip").and_then(|v| v.parse().ok()),
            self.query_param("take").and_then(|v| v.parse().ok()),
            self.query_param("total").is_some_and(|v| v == "true"),
        )
    }
}

fn too_large(correlation_id: Option<&str>, limit: usize) -> ApplicationError {
    ApplicationError::bad_request(
        correlation_id,
        "REQUEST_TOO_LARGE",
        format!("Request body exceeds {limit} bytes"),
    )
    .with_status(413)
    .with_details("limit", limit)
}
