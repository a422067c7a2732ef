//! The article service end to end: one port, binary RPC and REST.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use janus::proto::article_service_client::ArticleServiceClient;
use janus::proto::{GetArticleRequest, Pager};
use janus::{AppResult, ArticleRecord, ArticleServer, ArticleStore, MemoryStore, StoreError};
use janus_config::{AuthModeSetting, JanusConfig};
use janus_core::{Code, Status};
use janus_server::ShutdownSignal;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

const WAIT: Duration = Duration::from_secs(5);

/// Counts page and count queries.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    queries: AtomicUsize,
}

impl ArticleStore for CountingStore {
    fn migrate(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        self.inner.migrate()
    }

    fn insert(&self, title: String) -> BoxFuture<'_, Result<ArticleRecord, StoreError>> {
        self.inner.insert(title)
    }

    fn find_page(
        &self,
        offset: i64,
        limit: i64,
    ) -> BoxFuture<'_, Result<Vec<ArticleRecord>, StoreError>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.find_page(offset, limit)
    }

    fn count(&self) -> BoxFuture<'_, Result<i64, StoreError>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.count()
    }

    fn close(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        self.inner.close()
    }
}

struct Running {
    addr: SocketAddr,
    shutdown: ShutdownSignal,
    handle: JoinHandle<AppResult<()>>,
}

impl Running {
    async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(WAIT, self.handle)
            .await
            .expect("server stopped in time")
            .unwrap()
            .unwrap();
    }
}

fn test_config() -> JanusConfig {
    let mut config = JanusConfig::default();
    config.server.addr = "127.0.0.1:0".to_string();
    config.server.shutdown_timeout_secs = 2;
    config.store.seed = vec!["first".into(), "second".into(), "third".into()];
    config.docs.enabled = false;
    config
}

async fn start(config: JanusConfig, store: Arc<dyn ArticleStore>) -> Running {
    let server = ArticleServer::with_store(config, store).bind().await.unwrap();
    let addr = server.local_addr();
    let shutdown = ShutdownSignal::new();
    let handle = tokio::spawn(server.run_with_shutdown(shutdown.clone()));
    Running {
        addr,
        shutdown,
        handle,
    }
}

async fn rpc_client(addr: SocketAddr) -> ArticleServiceClient<tonic::transport::Channel> {
    tokio::time::timeout(WAIT, ArticleServiceClient::connect(format!("http://{addr}")))
        .await
        .expect("connected in time")
        .unwrap()
}

fn with_credentials(message: GetArticleRequest) -> tonic::Request<GetArticleRequest> {
    let mut request = tonic::Request::new(message);
    let metadata = request.metadata_mut();
    metadata.insert("app_key", "janus".parse().unwrap());
    metadata.insert("app_secret", "janus-secret".parse().unwrap());
    request
}

/// Sends one HTTP/1.1 request and returns the status and body.
async fn http_get(addr: SocketAddr, target: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    tokio::time::timeout(WAIT, stream.read_to_end(&mut raw))
        .await
        .expect("response in time")
        .unwrap();
    let raw = String::from_utf8(raw).unwrap();
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap();
    (status, body.to_string())
}

#[tokio::test]
async fn test_rpc_first_page_returns_all_rows() {
    let running = start(test_config(), Arc::new(MemoryStore::new())).await;
    let mut client = rpc_client(running.addr).await;

    let response = client
        .get_article_list(with_credentials(GetArticleRequest { page: 1, size: 4 }))
        .await
        .unwrap()
        .into_inner();

    let titles: Vec<_> = response.list.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["third", "second", "first"]);
    assert_eq!(
        response.pager,
        Some(Pager {
            page: 1,
            size: 4,
            total_rows: 3
        })
    );

    running.stop().await;
}

#[tokio::test]
async fn test_rpc_error_carries_detail() {
    let running = start(test_config(), Arc::new(MemoryStore::new())).await;
    let mut client = rpc_client(running.addr).await;

    let wire = client
        .get_article_list(with_credentials(GetArticleRequest { page: 0, size: 4 }))
        .await
        .unwrap_err();
    let status = Status::from_wire(&wire);
    assert_eq!(status.code(), Code::InvalidArgument);
    let detail = status.error_detail().unwrap();
    assert_eq!(detail.code, 20_010_001);
    assert_eq!(detail.message, "获取文章列表失败");

    running.stop().await;
}

#[tokio::test]
async fn test_rpc_without_credentials_is_unauthenticated() {
    let running = start(test_config(), Arc::new(MemoryStore::new())).await;
    let mut client = rpc_client(running.addr).await;

    let wire = client
        .get_article_list(GetArticleRequest { page: 1, size: 4 })
        .await
        .unwrap_err();
    assert_eq!(wire.code(), tonic::Code::Unauthenticated);

    running.stop().await;
}

#[tokio::test]
async fn test_rest_page_past_end() {
    let running = start(test_config(), Arc::new(MemoryStore::new())).await;

    let (status, body) = http_get(running.addr, "/v1/articles?page=2&size=2").await;
    assert_eq!(status, 200);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["list"].as_array().unwrap().len(), 1);
    assert_eq!(json["pager"]["totalRows"], 3);

    let (status, body) = http_get(running.addr, "/v1/articles?page=3&size=2").await;
    assert_eq!(status, 200);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["list"], serde_json::json!([]));
    assert_eq!(
        json["pager"],
        serde_json::json!({"page": 3, "size": 2, "totalRows": 3})
    );

    running.stop().await;
}

#[tokio::test]
async fn test_rest_invalid_page_is_400_without_store_access() {
    let store = Arc::new(CountingStore::default());
    let running = start(test_config(), Arc::clone(&store) as Arc<dyn ArticleStore>).await;

    let (status, body) = http_get(running.addr, "/v1/articles?page=0&size=4").await;
    assert_eq!(status, 400);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"code": 20_010_001, "message": "获取文章列表失败"})
    );
    assert_eq!(store.queries.load(Ordering::SeqCst), 0);

    running.stop().await;
}

#[tokio::test]
async fn test_rest_bad_query_is_400() {
    let running = start(test_config(), Arc::new(MemoryStore::new())).await;

    let (status, body) = http_get(running.addr, "/v1/articles?page=one").await;
    assert_eq!(status, 400);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["code"], Code::InvalidArgument.as_i32());

    running.stop().await;
}

#[tokio::test]
async fn test_rest_in_metadata_mode() {
    let mut config = test_config();
    config.auth.mode = AuthModeSetting::Metadata;
    let running = start(config, Arc::new(MemoryStore::new())).await;

    let (status, body) = http_get(running.addr, "/v1/articles?page=1&size=1").await;
    assert_eq!(status, 200);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["list"][0]["title"], "third");
    assert_eq!(json["list"][0]["id"], 3);

    running.stop().await;
}

#[tokio::test]
async fn test_plain_route() {
    let running = start(test_config(), Arc::new(MemoryStore::new())).await;

    let (status, body) = http_get(running.addr, "/test").await;
    assert_eq!(status, 200);
    assert_eq!(body, "test");

    let (status, _) = http_get(running.addr, "/nowhere").await;
    assert_eq!(status, 404);

    running.stop().await;
}

#[tokio::test]
async fn test_docs_routes() {
    let dir = tempfile::tempdir().unwrap();
    let ui = dir.path().join("swagger-ui");
    let json = dir.path().join("proto");
    std::fs::create_dir_all(&ui).unwrap();
    std::fs::create_dir_all(&json).unwrap();
    std::fs::write(ui.join("index.html"), "<html>swagger</html>").unwrap();
    std::fs::write(json.join("article.swagger.json"), r#"{"swagger":"2.0"}"#).unwrap();
    std::fs::write(json.join("article.proto"), "syntax = \"proto3\";").unwrap();

    let mut config = test_config();
    config.docs.enabled = true;
    config.docs.swagger_ui_dir = ui.display().to_string();
    config.docs.swagger_json_dir = json.display().to_string();
    let running = start(config, Arc::new(MemoryStore::new())).await;

    let (status, body) = http_get(running.addr, "/swagger-ui/index.html").await;
    assert_eq!(status, 200);
    assert!(body.contains("swagger"));

    let (status, body) = http_get(running.addr, "/swagger/article.swagger.json").await;
    assert_eq!(status, 200);
    assert!(body.contains("2.0"));

    let (status, _) = http_get(running.addr, "/swagger/article.proto").await;
    assert_eq!(status, 404);

    running.stop().await;
}

#[tokio::test]
async fn test_unknown_protocol_is_dropped_and_server_keeps_serving() {
    let config = test_config();
    let server = ArticleServer::new(config).bind().await.unwrap();
    let addr = server.local_addr();
    let stats = server.mux_stats();
    let shutdown = ShutdownSignal::new();
    let handle = tokio::spawn(server.run_with_shutdown(shutdown.clone()));

    let mut stray = TcpStream::connect(addr).await.unwrap();
    stray.write_all(b"SSH-2.0-OpenSSH_9.6\r\n").await.unwrap();
    let mut out = Vec::new();
    tokio::time::timeout(WAIT, stray.read_to_end(&mut out))
        .await
        .expect("closed in time")
        .unwrap();
    assert!(out.is_empty());
    assert_eq!(stats.unmatched(), 1);

    let (status, _) = http_get(addr, "/test").await;
    assert_eq!(status, 200);

    shutdown.trigger();
    tokio::time::timeout(WAIT, handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_store() {
    let store = Arc::new(MemoryStore::new());
    let running = start(test_config(), Arc::clone(&store) as Arc<dyn ArticleStore>).await;
    running.stop().await;

    assert_eq!(store.count().await, Err(StoreError::Closed));
}
