//! Response-side helpers.
//!
//! # Responsibilities
//! - Uniform JSON envelope for API handlers
//! - Serialize handler payloads as JSON
//! - Echo the trace id on every response

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::context::{keys, CallContext};

/// Content type of JSON replies.
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// JSON envelope shared by API handlers: `{"result", "msg", "data"}`.
///
/// `result` is `0` on success; any other value is an application error code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T = serde_json::Value> {
    pub result: u32,
    pub msg: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            result: 0,
            msg: "ok".to_string(),
            data,
        }
    }
}

impl ApiResponse {
    /// Error envelope carrying no data.
    pub fn error(result: u32, msg: impl Into<String>) -> Self {
        Self {
            result,
            msg: msg.into(),
            data: serde_json::Value::Null,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        reply_json(&self)
    }
}

/// Serialize `data` as a `200` JSON reply.
///
/// A payload that fails to serialize becomes a `500`.
pub fn reply_json<T: Serialize + ?Sized>(data: &T) -> Response {
    match serde_json::to_vec(data) {
        Ok(body) => (
            [(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize JSON reply");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Copy the call's trace id onto `response`.
pub fn echo_trace_id(ctx: &CallContext, response: &mut Response) {
    if let Ok(value) = HeaderValue::from_str(&ctx.trace_id()) {
        response.headers_mut().insert(keys::TRACE_ID, value);
    }
}
