//! Server lifecycle.
//!
//! A [`Server`] owns the base listener, the [`Mux`] bound to it and the two
//! sub-servers fed by it:
//!
//! | Rule | Matcher | Sub-server |
//! |------|---------|------------|
//! | `rpc` | [`Matcher::Http2Preface`] | tonic, [`serve_rpc`] |
//! | `http` | [`Matcher::Http1`] | hyper, [`HttpServer`] |
//!
//! The RPC rule comes first: every HTTP/2 connection is binary RPC, and
//! no HTTP/1 request line can start with the HTTP/2 preface.
//!
//! ```rust,ignore
//! let server = Server::builder()
//!     .config(ServerConfig::builder().addr("127.0.0.1:8004").build())
//!     .rpc(|_ctx, builder| builder.add_service(ArticleServiceServer::new(service)))
//!     .http(|ctx| gateway_routes(ctx.dial_addr()))
//!     .bind()
//!     .await?;
//! server.run().await?;
//! ```

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::http::HttpServer;
use crate::mux::{Matcher, Mux, MuxConfig, MuxStats, SubListener};
use crate::router::HttpRouter;
use crate::rpc::serve_rpc;
use crate::shutdown::ShutdownSignal;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinHandle};

/// Name of the RPC rule and sub-listener.
pub const RPC_LISTENER: &str = "rpc";
/// Name of the HTTP rule and sub-listener.
pub const HTTP_LISTENER: &str = "http";

type RpcRegistrar = Box<
    dyn FnOnce(&ServeContext, &mut tonic::transport::Server) -> tonic::transport::server::Router
        + Send,
>;
type HttpRegistrar = Box<dyn FnOnce(&ServeContext) -> HttpRouter + Send>;

/// What sub-server registration needs to know about the running server.
#[derive(Debug, Clone)]
pub struct ServeContext {
    local_addr: SocketAddr,
    shutdown: ShutdownSignal,
}

impl ServeContext {
    /// Address the base listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address a client in this process should dial to reach the server.
    ///
    /// Same as [`local_addr`](Self::local_addr) unless bound to an
    /// unspecified address, in which case the loopback address of the same
    /// family is used.
    pub fn dial_addr(&self) -> SocketAddr {
        let ip = match self.local_addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        SocketAddr::new(ip, self.local_addr.port())
    }

    /// The server's shutdown signal.
    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }
}

/// Builder for [`Server`].
#[derive(Default)]
pub struct ServerBuilder {
    config: ServerConfig,
    rpc: Option<RpcRegistrar>,
    http: Option<HttpRegistrar>,
}

impl ServerBuilder {
    /// Sets the configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers the RPC services.
    ///
    /// Called once, after the listener is bound and before serving starts.
    pub fn rpc<F>(mut self, register: F) -> Self
    where
        F: FnOnce(&ServeContext, &mut tonic::transport::Server) -> tonic::transport::server::Router
            + Send
            + 'static,
    {
        self.rpc = Some(Box::new(register));
        self
    }

    /// Registers the HTTP routes.
    ///
    /// Called once, after the listener is bound and before serving starts.
    pub fn http<F>(mut self, register: F) -> Self
    where
        F: FnOnce(&ServeContext) -> HttpRouter + Send + 'static,
    {
        self.http = Some(Box::new(register));
        self
    }

    /// Binds the base listener and registers both sub-listeners.
    pub async fn bind(self) -> Result<Server, ServerError> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let mut mux = Mux::new(listener, MuxConfig::from(&self.config));
        let rpc_listener = mux.register(RPC_LISTENER, Matcher::Http2Preface)?;
        let http_listener = mux.register(HTTP_LISTENER, Matcher::Http1)?;

        tracing::info!(%local_addr, "server bound");
        Ok(Server {
            config: self.config,
            local_addr,
            mux,
            rpc_listener,
            http_listener,
            rpc: self.rpc,
            http: self.http,
        })
    }
}

/// One endpoint serving binary RPC and HTTP.
pub struct Server {
    config: ServerConfig,
    local_addr: SocketAddr,
    mux: Mux,
    rpc_listener: SubListener,
    http_listener: SubListener,
    rpc: Option<RpcRegistrar>,
    http: Option<HttpRegistrar>,
}

impl Server {
    /// Creates a builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Multiplexer counters.
    pub fn mux_stats(&self) -> Arc<MuxStats> {
        self.mux.stats()
    }

    /// Runs until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Runs until `shutdown` fires or the multiplexer fails.
    ///
    /// Both sub-servers are started before the accept loop; connections
    /// classified early wait in their sub-listener. After the accept loop
    /// stops, in-flight work gets the configured grace period before the
    /// remaining connections are dropped.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let Server {
            config,
            local_addr,
            mux,
            rpc_listener,
            http_listener,
            rpc,
            http,
        } = self;
        let ctx = ServeContext {
            local_addr,
            shutdown: shutdown.clone(),
        };
        let force = ShutdownSignal::new();

        let mut rpc_task = match rpc {
            Some(register) => {
                let mut builder = tonic::transport::Server::builder();
                let router = register(&ctx, &mut builder);
                Some(tokio::spawn(serve_rpc(router, rpc_listener, shutdown.clone())))
            }
            None => {
                tracing::warn!("no rpc services registered, rpc connections will be dropped");
                drop(rpc_listener);
                None
            }
        };

        let router = http.map_or_else(HttpRouter::new, |register| register(&ctx));
        let mut http_task: JoinHandle<()> = tokio::spawn(
            HttpServer::new(router, &config).serve(http_listener, shutdown.clone(), force.clone()),
        );

        tracing::info!(%local_addr, "server started");
        let mux_result = mux.serve(shutdown.clone()).await;
        shutdown.trigger();

        let grace = config.shutdown_timeout();
        let mut rpc_result = None;
        let mut http_result = None;
        let drained = tokio::time::timeout(grace, async {
            if let Some(task) = rpc_task.as_mut() {
                rpc_result = Some(task.await);
            }
            http_result = Some((&mut http_task).await);
        })
        .await
        .is_ok();

        if !drained {
            tracing::warn!(?grace, "grace period elapsed, closing remaining connections");
            force.trigger();
            if rpc_result.is_none() {
                if let Some(task) = rpc_task.take() {
                    task.abort();
                    rpc_result = Some(task.await);
                }
            }
            if http_result.is_none() {
                http_result = Some(http_task.await);
            }
        }

        tracing::info!("server stopped");
        mux_result?;
        if let Some(result) = http_result {
            joined(HTTP_LISTENER, result)?;
        }
        match rpc_result {
            Some(result) => joined(RPC_LISTENER, result),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.local_addr)
            .field("mux", &self.mux)
            .field("has_rpc", &self.rpc.is_some())
            .field("has_http", &self.http.is_some())
            .finish_non_exhaustive()
    }
}

fn joined<T: Flatten>(name: &'static str, result: Result<T, JoinError>) -> Result<(), ServerError> {
    match result {
        Ok(outcome) => outcome.flatten(),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(ServerError::Task {
            name,
            reason: e.to_string(),
        }),
    }
}

trait Flatten {
    fn flatten(self) -> Result<(), ServerError>;
}

impl Flatten for () {
    fn flatten(self) -> Result<(), ServerError> {
        Ok(())
    }
}

impl Flatten for Result<(), ServerError> {
    fn flatten(self) -> Result<(), ServerError> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dial_addr_replaces_unspecified() {
        let ctx = ServeContext {
            local_addr: "0.0.0.0:8004".parse().unwrap(),
            shutdown: ShutdownSignal::new(),
        };
        assert_eq!(ctx.dial_addr(), "127.0.0.1:8004".parse().unwrap());

        let ctx = ServeContext {
            local_addr: "[::]:8004".parse().unwrap(),
            shutdown: ShutdownSignal::new(),
        };
        assert_eq!(ctx.dial_addr(), "[::1]:8004".parse().unwrap());

        let ctx = ServeContext {
            local_addr: "10.0.0.7:9000".parse().unwrap(),
            shutdown: ShutdownSignal::new(),
        };
        assert_eq!(ctx.dial_addr(), ctx.local_addr());
    }

    #[tokio::test]
    async fn test_bind_reports_port_and_rules() {
        let server = Server::builder()
            .config(ServerConfig::builder().addr("127.0.0.1:0").build())
            .bind()
            .await
            .unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(server.mux.rule_names(), vec![RPC_LISTENER, HTTP_LISTENER]);
    }

    #[tokio::test]
    async fn test_bind_rejects_bad_address() {
        let result = Server::builder()
            .config(ServerConfig::builder().addr("nowhere").build())
            .bind()
            .await;
        assert!(matches!(result, Err(ServerError::InvalidAddress { .. })));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let server = Server::builder()
            .config(ServerConfig::builder().addr("127.0.0.1:0").build())
            .http(|_ctx| HttpRouter::new())
            .bind()
            .await
            .unwrap();
        let shutdown = ShutdownSignal::new();
        let handle = tokio::spawn(server.run_with_shutdown(shutdown.clone()));

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        shutdown.trigger();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("server stopped")
            .expect("server task did not panic");
        assert!(result.is_ok());
    }
}
