//! Route glue: HTTP handlers that call an RPC method.
//!
//! Each handler decodes the request, builds the [`CallContext`] from the
//! forwarded headers, awaits the RPC through `invoke`, and writes exactly
//! one complete response: the JSON-encoded reply on success, or the
//! translated [`Status`] on failure.
//!
//! ```rust
//! use janus_core::{CallContext, Status};
//! use janus_gateway::get_query;
//! use janus_server::HttpRouter;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Default, Deserialize)]
//! #[serde(default)]
//! struct Echo { text: String }
//!
//! #[derive(Serialize)]
//! struct Reply { text: String }
//!
//! let router = HttpRouter::new().get(
//!     "/v1/echo",
//!     get_query("/demo.Echo/Say", |_ctx: CallContext, req: Echo| async move {
//!         Ok::<_, Status>(Reply { text: req.text })
//!     }),
//! );
//! assert_eq!(router.paths(), vec!["/v1/echo"]);
//! ```

use crate::codec::{decode_json, decode_query, json_response};
use crate::error::error_response;
use crate::metadata::call_context;
use http::StatusCode;
use janus_core::{CallContext, Status};
use janus_server::router::{HttpHandler, HttpRequest, HttpResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

/// A handler whose RPC request is decoded from the query string.
pub fn get_query<Req, Resp, F, Fut>(method: &'static str, invoke: F) -> impl HttpHandler
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
{
    translate(method, invoke, decode_query::<Req>)
}

/// A handler whose RPC request is decoded from a JSON body.
pub fn post_json<Req, Resp, F, Fut>(method: &'static str, invoke: F) -> impl HttpHandler
where
    Req: DeserializeOwned + Default + Send + 'static,
    Resp: Serialize + Send + 'static,
    F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
{
    translate(method, invoke, decode_json::<Req>)
}

fn translate<Req, Resp, F, Fut>(
    method: &'static str,
    invoke: F,
    decode: fn(&HttpRequest) -> Result<Req, Status>,
) -> impl HttpHandler
where
    Req: Send + 'static,
    Resp: Serialize + Send + 'static,
    F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
{
    let invoke = Arc::new(invoke);
    move |request: HttpRequest| {
        let invoke = Arc::clone(&invoke);
        async move {
            let decoded = match decode(&request) {
                Ok(decoded) => decoded,
                Err(status) => return reject(method, &status),
            };
            let ctx = call_context(method, &request);
            match invoke(ctx, decoded).await {
                Ok(reply) => json_response(StatusCode::OK, &reply),
                Err(status) => reject(method, &status),
            }
        }
    }
}

fn reject(method: &str, status: &Status) -> HttpResponse {
    tracing::debug!(
        method,
        code = %status.code(),
        status_message = status.message(),
        "gateway call failed"
    );
    error_response(status)
}
