//! HTTP routing for the HTTP sub-server.
//!
//! Two kinds of entries:
//!
//! - **routes**: exact path plus method, e.g. `GET /v1/articles`
//! - **mounts**: a path prefix served by one handler, e.g. `/swagger-ui/`
//!
//! Exact routes win over mounts; among mounts the longest prefix wins. A
//! path with routes but none for the request method gets `405` with an
//! `Allow` header; anything else unmatched gets a JSON `404`.
//!
//! ```rust
//! use janus_server::router::{HttpRequest, HttpResponse, HttpRouter};
//! use bytes::Bytes;
//! use http_body_util::Full;
//!
//! async fn ping(_request: HttpRequest) -> HttpResponse {
//!     HttpResponse::new(Full::new(Bytes::from_static(b"pong")))
//! }
//!
//! let router = HttpRouter::new().get("/ping", ping);
//! assert_eq!(router.paths(), vec!["/ping"]);
//! ```

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{header, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::Full;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

/// A request with its body fully collected.
pub type HttpRequest = Request<Bytes>;

/// Response body type.
pub type ResponseBody = Full<Bytes>;

/// A complete response.
pub type HttpResponse = Response<ResponseBody>;

/// Peer address of the connection a request arrived on, stored in the
/// request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

/// Path below the mount prefix, stored in the request extensions of
/// requests dispatched to a mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedPath(pub String);

/// Something that turns a request into a response.
pub trait HttpHandler: Send + Sync + 'static {
    /// Handles one request.
    fn handle(&self, request: HttpRequest) -> BoxFuture<'static, HttpResponse>;
}

impl<F, Fut> HttpHandler for F
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HttpResponse> + Send + 'static,
{
    fn handle(&self, request: HttpRequest) -> BoxFuture<'static, HttpResponse> {
        Box::pin(self(request))
    }
}

/// Exact routes plus prefix mounts.
#[derive(Default, Clone)]
pub struct HttpRouter {
    routes: HashMap<String, HashMap<Method, Arc<dyn HttpHandler>>>,
    mounts: Vec<(String, Arc<dyn HttpHandler>)>,
}

impl HttpRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` on the exact `path`, replacing any
    /// previous handler.
    pub fn route(mut self, method: Method, path: impl Into<String>, handler: impl HttpHandler) -> Self {
        self.routes
            .entry(path.into())
            .or_default()
            .insert(method, Arc::new(handler));
        self
    }

    /// Registers a `GET` route.
    pub fn get(self, path: impl Into<String>, handler: impl HttpHandler) -> Self {
        self.route(Method::GET, path, handler)
    }

    /// Registers a `POST` route.
    pub fn post(self, path: impl Into<String>, handler: impl HttpHandler) -> Self {
        self.route(Method::POST, path, handler)
    }

    /// Serves every path starting with `prefix` with `handler`.
    pub fn mount(mut self, prefix: impl Into<String>, handler: impl HttpHandler) -> Self {
        self.mounts.push((prefix.into(), Arc::new(handler)));
        self
    }

    /// Moves every entry of `other` into this router.
    pub fn merge(mut self, other: HttpRouter) -> Self {
        for (path, methods) in other.routes {
            self.routes.entry(path).or_default().extend(methods);
        }
        self.mounts.extend(other.mounts);
        self
    }

    /// Registered exact paths, sorted.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    /// Registered mount prefixes in registration order.
    pub fn mount_prefixes(&self) -> Vec<&str> {
        self.mounts.iter().map(|(prefix, _)| prefix.as_str()).collect()
    }

    /// Dispatches a request.
    pub async fn dispatch(&self, mut request: HttpRequest) -> HttpResponse {
        let path = request.uri().path().to_string();

        if let Some(methods) = self.routes.get(&path) {
            if let Some(handler) = methods.get(request.method()) {
                return handler.handle(request).await;
            }
            return method_not_allowed(methods.keys());
        }

        let mount = self
            .mounts
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());
        if let Some((prefix, handler)) = mount {
            let rest = path[prefix.len()..].to_string();
            request.extensions_mut().insert(MountedPath(rest));
            return handler.handle(request).await;
        }

        json_error(
            StatusCode::NOT_FOUND,
            5,
            &format!("no route for {} {path}", request.method()),
        )
    }
}

impl std::fmt::Debug for HttpRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRouter")
            .field("paths", &self.paths())
            .field("mounts", &self.mount_prefixes())
            .finish()
    }
}

fn method_not_allowed<'a>(allowed: impl Iterator<Item = &'a Method>) -> HttpResponse {
    let mut allowed: Vec<&str> = allowed.map(Method::as_str).collect();
    allowed.sort_unstable();
    let mut response = json_error(StatusCode::METHOD_NOT_ALLOWED, 12, "method not allowed");
    if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
        response.headers_mut().insert(header::ALLOW, value);
    }
    response
}

/// Builds a `{"code": .., "message": ..}` JSON response.
pub fn json_error(status: StatusCode, code: i32, message: &str) -> HttpResponse {
    let body = serde_json::json!({ "code": code, "message": message });
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Builds a plain-text response.
pub fn text_response(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> HttpResponse {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
