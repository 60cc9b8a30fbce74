//! HTTP response building helpers
//!
//! All handlers answer with [`BoxBody`] so JSON replies and streamed blobs
//! share one response type.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{header, Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::error::ClipError;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, std::io::Error>;

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    full_body(Bytes::new())
}

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    match serde_json::to_vec(body) {
        Ok(json) => Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(full_body(json))
            .unwrap(),
        Err(e) => error_response(&ClipError::Json(e)),
    }
}

/// Build a JSON response with 200 OK status
pub fn ok<T: Serialize>(body: &T) -> Response<BoxBody> {
    json_response(StatusCode::OK, body)
}

/// Build a JSON response with 201 Created status
pub fn created<T: Serialize>(body: &T) -> Response<BoxBody> {
    json_response(StatusCode::CREATED, body)
}

/// Bodiless response with the given status
pub fn empty(status: StatusCode) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .body(empty_body())
        .unwrap()
}

/// Build an empty response with 204 No Content status
pub fn no_content() -> Response<BoxBody> {
    empty(StatusCode::NO_CONTENT)
}

pub fn not_found(message: &str) -> Response<BoxBody> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "error": message }),
    )
}

pub fn method_not_allowed() -> Response<BoxBody> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({ "error": "Method not allowed" }),
    )
}

/// Map any store error to its HTTP response
pub fn error_response(err: &ClipError) -> Response<BoxBody> {
    let status = err.status_code();

    if status.is_server_error() {
        error!(error = %err, "Request failed");
    }

    if status == StatusCode::UNAUTHORIZED {
        return empty(status);
    }

    let body = serde_json::json!({ "error": err.to_string() }).to_string();
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
        .body(full_body(body))
        .unwrap()
}
