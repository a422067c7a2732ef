//! HTTP header → call metadata forwarding.
//!
//! | Incoming header | Metadata key |
//! |-----------------|--------------|
//! | `Grpc-Metadata-<k>` | `<k>` |
//! | `Authorization`, `traceparent`, `tracestate` | unchanged |
//! | `Host` | `x-forwarded-host` |
//! | peer address | appended to `x-forwarded-for` |
//!
//! Every other header stays on the HTTP side. A `Grpc-Timeout` header
//! becomes the call deadline.

use janus_core::{parse_grpc_timeout, CallContext, Metadata, GRPC_TIMEOUT_HEADER};
use janus_server::router::{HttpRequest, RemoteAddr};

/// Prefix marking a header as call metadata.
pub const METADATA_HEADER_PREFIX: &str = "grpc-metadata-";

/// Headers forwarded under their own name.
pub const FORWARDED_HEADERS: [&str; 3] = ["authorization", "traceparent", "tracestate"];

/// Metadata key carrying the original `Host`.
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Metadata key carrying the client address chain.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Collects the metadata a gateway call forwards to the RPC method.
pub fn forwarded_metadata(request: &HttpRequest) -> Metadata {
    let headers = request.headers();
    let mut metadata = Metadata::new();

    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            tracing::debug!(header = %name, "skipping non-ASCII header");
            continue;
        };
        let name = name.as_str();
        if let Some(key) = name.strip_prefix(METADATA_HEADER_PREFIX) {
            if !key.is_empty() {
                metadata.append(key, value);
            }
        } else if FORWARDED_HEADERS.contains(&name) {
            metadata.append(name, value);
        }
    }

    let host = headers
        .get(http::header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(ToString::to_string));
    if let Some(host) = host {
        metadata.insert(X_FORWARDED_HOST, host);
    }

    if let Some(RemoteAddr(peer)) = request.extensions().get::<RemoteAddr>() {
        let chain = match headers
            .get(X_FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
        {
            Some(prior) if !prior.is_empty() => format!("{prior}, {}", peer.ip()),
            _ => peer.ip().to_string(),
        };
        metadata.insert(X_FORWARDED_FOR, chain);
    }

    metadata
}

/// Builds the call context for a gateway call to `method`.
pub fn call_context(method: &str, request: &HttpRequest) -> CallContext {
    let peer = request
        .extensions()
        .get::<RemoteAddr>()
        .map(|RemoteAddr(addr)| *addr);
    let mut ctx = CallContext::new(method)
        .with_metadata(forwarded_metadata(request))
        .with_peer(peer);

    let timeout = request
        .headers()
        .get(GRPC_TIMEOUT_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_grpc_timeout);
    if let Some(timeout) = timeout {
        ctx.set_timeout(timeout);
    }
    ctx
}
