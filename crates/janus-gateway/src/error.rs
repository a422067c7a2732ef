//! Status → HTTP error translation.
//!
//! A failed RPC reaches a REST caller as an HTTP status plus a JSON body
//! `{"code": .., "message": ..}`. When the status carries an
//! application-defined [`ErrorDetail`](janus_core::ErrorDetail), the
//! body reports that record's code and message instead of the generic ones.
//!
//! | Status | Detail | HTTP | Body |
//! |--------|--------|------|------|
//! | `InvalidArgument "bad page"` | none | 400 | `{"code":3,"message":"bad page"}` |
//! | `InvalidArgument` | `{20010001, "获取文章列表失败"}` | 400 | `{"code":20010001,"message":"获取文章列表失败"}` |
//! | `Unknown` | `{5, "missing"}` | 404 | `{"code":5,"message":"missing"}` |

use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use janus_core::{Code, Status};
use janus_server::router::{json_error, HttpResponse};
use serde::{Deserialize, Serialize};

/// Body written for a failed gateway call.
///
/// A zero code and an empty message are left out of the JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpError {
    /// Canonical or application-defined error code.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub code: i32,
    /// Human message.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(code: &i32) -> bool {
    *code == 0
}

/// Fixed code → HTTP status table.
pub fn http_status_from_code(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        // Client Closed Request; not in the IANA registry.
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        Code::Unknown | Code::Internal | Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
        Code::InvalidArgument | Code::FailedPrecondition | Code::OutOfRange => {
            StatusCode::BAD_REQUEST
        }
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists | Code::Aborted => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Maps a status to its HTTP status and JSON body.
///
/// Only the first application-defined detail record is consulted. Its code
/// replaces the outer one in the body; the HTTP status follows the
/// replacement when it is a canonical code and the outer code otherwise,
/// since domain codes have no HTTP mapping of their own.
pub fn to_http(status: &Status) -> (StatusCode, HttpError) {
    let mut body = HttpError {
        code: status.code().as_i32(),
        message: status.message().to_string(),
    };
    let mut effective = status.code();

    if let Some(detail) = status.error_detail() {
        body.code = detail.code;
        body.message = detail.message.clone();
        if Code::is_canonical(detail.code) {
            effective = Code::from_i32(detail.code);
        }
    }

    (http_status_from_code(effective), body)
}

/// Builds the complete error response for `status`.
pub fn error_response(status: &Status) -> HttpResponse {
    let (http_status, body) = to_http(status);
    match serde_json::to_vec(&body) {
        Ok(bytes) => {
            let mut response = Response::new(Full::new(Bytes::from(bytes)));
            *response.status_mut() = http_status;
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            response
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to encode error body");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                Code::Internal.as_i32(),
                "failed to marshal error message",
            )
        }
    }
}
