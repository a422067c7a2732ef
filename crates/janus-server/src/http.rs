//! HTTP/1.1 sub-server.
//!
//! Accepts connections from the `http` sub-listener and serves them with
//! hyper. Request bodies are collected under the configured request
//! timeout before dispatch to the [`HttpRouter`]. On shutdown each
//! connection finishes its in-flight request and closes; connections still
//! open when `force` fires are dropped.

use crate::config::ServerConfig;
use crate::mux::{MuxedStream, SubListener};
use crate::router::{json_error, HttpResponse, HttpRouter, RemoteAddr};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The HTTP sub-server.
#[derive(Debug, Clone)]
pub struct HttpServer {
    router: Arc<HttpRouter>,
    request_timeout: Duration,
    keep_alive: bool,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Creates the sub-server.
    pub fn new(router: HttpRouter, config: &ServerConfig) -> Self {
        Self {
            router: Arc::new(router),
            request_timeout: config.request_timeout(),
            keep_alive: config.keep_alive(),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Live connections.
    pub fn active_connections(&self) -> usize {
        self.tracker.active()
    }

    /// Serves until `shutdown` fires or the listener ends, then waits for
    /// open connections to finish or for `force`.
    pub async fn serve(self, mut listener: SubListener, shutdown: ShutdownSignal, force: ShutdownSignal) {
        let stop = shutdown.recv();
        tokio::pin!(stop);

        loop {
            let stream = tokio::select! {
                stream = listener.accept() => match stream {
                    Some(stream) => stream,
                    None => break,
                },
                () = &mut stop => break,
            };
            let guard = self.tracker.acquire();
            let server = self.clone();
            let shutdown = shutdown.clone();
            let force = force.clone();
            tokio::spawn(async move {
                server.serve_connection(stream, shutdown, force).await;
                drop(guard);
            });
        }
        drop(listener);

        let active = self.tracker.active();
        if active > 0 {
            tracing::info!(active, "http sub-server draining connections");
        }
        tokio::select! {
            () = self.tracker.drained() => {}
            () = force.recv() => {
                tracing::warn!(active = self.tracker.active(), "http connections closed before finishing");
            }
        }
        tracing::info!("http sub-server stopped");
    }

    async fn serve_connection(&self, stream: MuxedStream, shutdown: ShutdownSignal, force: ShutdownSignal) {
        let remote_addr = stream.peer_addr().ok();
        let router = Arc::clone(&self.router);
        let request_timeout = self.request_timeout;
        let service = service_fn(move |request: Request<Incoming>| {
            let router = Arc::clone(&router);
            async move {
                Ok::<_, Infallible>(handle_request(&router, request, remote_addr, request_timeout).await)
            }
        });

        let conn = http1::Builder::new()
            .keep_alive(self.keep_alive)
            .serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        let result = tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                conn.as_mut().graceful_shutdown();
                tokio::select! {
                    result = conn.as_mut() => result,
                    () = force.recv() => Ok(()),
                }
            }
        };
        if let Err(e) = result {
            tracing::debug!(remote_addr = ?remote_addr, error = %e, "http connection ended with error");
        }
    }
}

async fn handle_request(
    router: &HttpRouter,
    request: Request<Incoming>,
    remote_addr: Option<SocketAddr>,
    request_timeout: Duration,
) -> HttpResponse {
    let started = Instant::now();
    let (mut parts, body) = request.into_parts();

    let body = match tokio::time::timeout(request_timeout, body.collect()).await {
        Ok(Ok(collected)) => collected.to_bytes(),
        Ok(Err(e)) => {
            return json_error(StatusCode::BAD_REQUEST, 3, &format!("cannot read request body: {e}"));
        }
        Err(_) => {
            return json_error(StatusCode::GATEWAY_TIMEOUT, 4, "timed out reading request body");
        }
    };
    if let Some(addr) = remote_addr {
        parts.extensions.insert(RemoteAddr(addr));
    }

    let method = parts.method.clone();
    let path = parts.uri.path().to_string();
    let response = router.dispatch(Request::from_parts(parts, body)).await;

    tracing::debug!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "http request"
    );
    response
}
