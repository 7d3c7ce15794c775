//! Conversions from handler results and errors into HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use switchyard_core::{ApplicationError, ErrorDescription};

use super::request::HttpRequest;

/// Status used for expired sessions.
pub const SESSION_EXPIRED: u16 = 440;

/// An [`ApplicationError`] rendered as an `ErrorDescription` body with the
/// status the error declares.
#[derive(Debug)]
pub struct ErrorResponse(pub ApplicationError);

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorDescription::from(&self.0))).into_response()
    }
}

impl From<ApplicationError> for ErrorResponse {
    fn from(err: ApplicationError) -> Self {
        Self(err)
    }
}

fn render<T: Serialize>(result: Result<T, ApplicationError>, status: StatusCode) -> Response {
    let value = result.and_then(|value| {
        serde_json::to_value(value).map_err(|e| {
            ApplicationError::invocation(None, "SERIALIZATION_FAILED", "Failed to serialize result")
                .with_cause(e)
        })
    });
    match value {
        Ok(Value::Null) => StatusCode::NO_CONTENT.into_response(),
        Ok(value) => (status, Json(value)).into_response(),
        Err(err) => send_error(err),
    }
}

/// `204` for a null result, `200` with the JSON result otherwise.
pub fn send_result<T: Serialize>(result: Result<T, ApplicationError>) -> Response {
    render(result, StatusCode::OK)
}

/// `201` with the created entity, `204` when nothing was created.
pub fn send_created_result<T: Serialize>(result: Result<T, ApplicationError>) -> Response {
    render(result, StatusCode::CREATED)
}

/// `200` with the deleted entity, `204` when nothing was deleted.
pub fn send_deleted_result<T: Serialize>(result: Result<T, ApplicationError>) -> Response {
    render(result, StatusCode::OK)
}

/// `204` on success.
pub fn send_empty_result(result: Result<(), ApplicationError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => send_error(err),
    }
}

pub fn send_error(err: ApplicationError) -> Response {
    ErrorResponse(err).into_response()
}

pub fn send_bad_request(request: &HttpRequest, message: &str) -> Response {
    send_error(ApplicationError::bad_request(
        request.correlation_id(),
        "BAD_REQUEST",
        message,
    ))
}

pub fn send_unauthorized(request: &HttpRequest, message: &str) -> Response {
    send_error(ApplicationError::unauthorized(
        request.correlation_id(),
        "NOT_AUTHORIZED",
        message,
    ))
}

pub fn send_not_found(request: &HttpRequest, message: &str) -> Response {
    send_error(ApplicationError::not_found(
        request.correlation_id(),
        "NOT_FOUND",
        message,
    ))
}

pub fn send_conflict(request: &HttpRequest, message: &str) -> Response {
    send_error(ApplicationError::conflict(
        request.correlation_id(),
        "CONFLICT",
        message,
    ))
}

pub fn send_session_expired(request: &HttpRequest, message: &str) -> Response {
    send_error(
        ApplicationError::unknown(request.correlation_id(), "SESSION_EXPIRED", message)
            .with_status(SESSION_EXPIRED),
    )
}

pub fn send_internal_error(request: &HttpRequest, message: &str) -> Response {
    send_error(ApplicationError::internal(
        request.correlation_id(),
        "INTERNAL",
        message,
    ))
}

pub fn send_server_unavailable(request: &HttpRequest, message: &str) -> Response {
    send_error(
        ApplicationError::conflict(request.correlation_id(), "SERVER_UNAVAILABLE", message)
            .with_status(503),
    )
}
