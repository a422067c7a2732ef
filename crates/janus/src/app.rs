//! Wires configuration, store, chains and routes into a running server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use janus_config::{AuthModeSetting, AuthSection, JanusConfig};
use janus_core::{CallContext, Code};
use janus_gateway::get_query;
use janus_middleware::server_chain;
use janus_middleware::stages::{AuthMode, Credentials, RetryInterceptor};
use janus_server::router::{json_error, text_response, HttpRequest};
use janus_server::{HttpRouter, MuxStats, ServeContext, Server, ServerConfig, ShutdownSignal, StaticFiles};

use crate::client::ArticleGatewayClient;
use crate::error::AppResult;
use crate::proto::article_service_server::ArticleServiceServer;
use crate::proto::{GetArticleRequest, GET_ARTICLE_LIST};
use crate::service::{ArticleHandler, ArticleRpc};
use crate::store::{ArticleStore, MemoryStore};

/// REST route for `GetArticleList`.
pub const ARTICLES_PATH: &str = "/v1/articles";

/// The article service on one endpoint.
///
/// ```rust,no_run
/// use janus::ArticleServer;
/// use janus_config::JanusConfig;
///
/// # async fn run() -> janus::AppResult<()> {
/// let server = ArticleServer::new(JanusConfig::default()).bind().await?;
/// println!("listening on {}", server.local_addr());
/// server.run().await
/// # }
/// ```
pub struct ArticleServer {
    config: JanusConfig,
    store: Arc<dyn ArticleStore>,
}

impl ArticleServer {
    /// Creates a server backed by a [`MemoryStore`].
    pub fn new(config: JanusConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Creates a server over `store`.
    pub fn with_store(config: JanusConfig, store: Arc<dyn ArticleStore>) -> Self {
        Self { config, store }
    }

    /// Prepares the store and binds the listener.
    ///
    /// Configured seed titles are inserted after migration.
    pub async fn bind(self) -> AppResult<BoundArticleServer> {
        let Self { config, store } = self;

        store.migrate().await?;
        for title in &config.store.seed {
            store.insert(title.clone()).await?;
        }
        if !config.store.seed.is_empty() {
            tracing::info!(count = config.store.seed.len(), "store seeded");
        }

        let request_timeout = Duration::from_millis(config.server.request_timeout_ms);
        let chain = server_chain(auth_mode(&config.auth), Some(request_timeout));
        tracing::debug!(stages = ?chain.stage_names(), "server chain built");
        let rpc = ArticleRpc::new(chain.wrap(ArticleHandler::new(Arc::clone(&store))));

        let server = Server::builder()
            .config(server_config(&config))
            .rpc(move |_ctx, builder| builder.add_service(ArticleServiceServer::new(rpc)))
            .http(move |ctx| routes(&config, ctx))
            .bind()
            .await?;

        Ok(BoundArticleServer { server, store })
    }
}

impl std::fmt::Debug for ArticleServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArticleServer")
            .field("addr", &self.config.server.addr)
            .finish_non_exhaustive()
    }
}

/// A bound article server, ready to run.
pub struct BoundArticleServer {
    server: Server,
    store: Arc<dyn ArticleStore>,
}

impl BoundArticleServer {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Multiplexer counters.
    pub fn mux_stats(&self) -> Arc<MuxStats> {
        self.server.mux_stats()
    }

    /// Runs until SIGINT or SIGTERM.
    pub async fn run(self) -> AppResult<()> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Runs until `shutdown` fires, then closes the store.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> AppResult<()> {
        let Self { server, store } = self;
        let served = server.run_with_shutdown(shutdown).await;
        let closed = store.close().await;
        served?;
        closed?;
        Ok(())
    }
}

impl std::fmt::Debug for BoundArticleServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundArticleServer")
            .field("local_addr", &self.local_addr())
            .finish_non_exhaustive()
    }
}

fn auth_mode(auth: &AuthSection) -> AuthMode {
    match auth.mode {
        AuthModeSetting::Disabled => AuthMode::Disabled,
        AuthModeSetting::Metadata => AuthMode::Metadata,
        AuthModeSetting::Credentials => {
            AuthMode::Credentials(Credentials::new(&auth.app_key, &auth.app_secret))
        }
    }
}

fn server_config(config: &JanusConfig) -> ServerConfig {
    let server = &config.server;
    ServerConfig::builder()
        .addr(&server.addr)
        .shutdown_timeout(Duration::from_secs(server.shutdown_timeout_secs))
        .request_timeout(Duration::from_millis(server.request_timeout_ms))
        .sniff_timeout(Duration::from_millis(server.sniff_timeout_ms))
        .max_sniff_bytes(server.max_sniff_bytes)
        .max_accept_errors(server.max_accept_errors)
        .keep_alive(server.keep_alive)
        .build()
}

fn routes(config: &JanusConfig, ctx: &ServeContext) -> HttpRouter {
    let mut router = HttpRouter::new().get("/test", |_request: HttpRequest| async {
        text_response(StatusCode::OK, "text/plain; charset=utf-8", "test")
    });

    let gateway = &config.gateway;
    let credentials = Credentials::new(&config.auth.app_key, &config.auth.app_secret);
    let retry = RetryInterceptor::new()
        .max_attempts(gateway.max_attempts)
        .backoff(Duration::from_millis(gateway.retry_backoff_ms));
    match ArticleGatewayClient::connect_lazy(
        ctx.dial_addr(),
        Some(credentials),
        Duration::from_millis(gateway.call_timeout_ms),
        retry,
    ) {
        Ok(client) => {
            router = router.get(
                ARTICLES_PATH,
                get_query(GET_ARTICLE_LIST, move |ctx: CallContext, request: GetArticleRequest| {
                    let client = client.clone();
                    async move { client.get_article_list(ctx, request).await }
                }),
            );
        }
        Err(err) => {
            tracing::error!(
                error = %err,
                addr = %ctx.dial_addr(),
                "gateway client unavailable, REST routes disabled"
            );
        }
    }

    if config.telemetry.metrics.enabled {
        router = router.get("/metrics", |_request: HttpRequest| async {
            match janus_telemetry::render_metrics() {
                Some(body) => text_response(StatusCode::OK, "text/plain; version=0.0.4", body),
                None => json_error(
                    StatusCode::NOT_FOUND,
                    Code::NotFound.as_i32(),
                    "metrics recorder not installed",
                ),
            }
        });
    }

    let docs = &config.docs;
    if docs.enabled {
        router = router
            .mount(
                "/swagger-ui/",
                StaticFiles::new(&docs.swagger_ui_dir).index(Some("index.html")),
            )
            .mount(
                "/swagger/",
                StaticFiles::new(&docs.swagger_json_dir)
                    .index(None)
                    .only_suffix(".swagger.json"),
            );
    }

    router
}
