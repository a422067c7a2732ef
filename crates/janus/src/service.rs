//! The article business handler and its RPC adapter.

use std::sync::Arc;

use janus_core::errcode::SERVER_ERROR;
use janus_core::{CallContext, Code, ErrorCode, Status};
use janus_middleware::{BoxFuture, CallResult, ComposedHandler, Payload, UnaryHandler};

use crate::proto::article_service_server::ArticleService;
use crate::proto::{Article, GetArticleRequest, GetArticleResponse, Pager, GET_ARTICLE_LIST};
use crate::store::{ArticleStore, StoreError};

/// Rejected pagination parameters.
pub const ERROR_GET_ARTICLE_LIST_FAIL: ErrorCode =
    ErrorCode::new(20_010_001, "获取文章列表失败", Code::InvalidArgument);

/// Lists articles from the injected store.
#[derive(Clone)]
pub struct ArticleHandler {
    store: Arc<dyn ArticleStore>,
}

impl ArticleHandler {
    /// Creates a handler over `store`.
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    /// Returns one page of articles, newest first.
    ///
    /// Non-positive `page` or `size` is rejected before the store is
    /// touched.
    pub async fn get_article_list(
        &self,
        request: GetArticleRequest,
    ) -> Result<GetArticleResponse, Status> {
        let GetArticleRequest { page, size } = request;
        if page <= 0 || size <= 0 {
            return Err(ERROR_GET_ARTICLE_LIST_FAIL.to_status_with(format!(
                "page and size must be positive, got page={page} size={size}"
            )));
        }
        let offset = (i64::from(page) - 1) * i64::from(size);

        let rows = self
            .store
            .find_page(offset, i64::from(size))
            .await
            .map_err(store_failure)?;
        let total = self.store.count().await.map_err(store_failure)?;

        Ok(GetArticleResponse {
            list: rows
                .into_iter()
                .map(|row| Article {
                    id: row.id,
                    title: row.title,
                })
                .collect(),
            pager: Some(Pager {
                page,
                size,
                total_rows: i32::try_from(total).unwrap_or(i32::MAX),
            }),
        })
    }

    async fn dispatch(&self, method: &str, request: Payload) -> CallResult {
        match method {
            GET_ARTICLE_LIST => {
                let request = request.downcast::<GetArticleRequest>()?;
                let response = self.get_article_list(request).await?;
                Ok(Payload::new(response))
            }
            other => Err(Status::unimplemented(format!("unknown method {other}")).into()),
        }
    }
}

impl std::fmt::Debug for ArticleHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArticleHandler").finish_non_exhaustive()
    }
}

fn store_failure(err: StoreError) -> Status {
    tracing::error!(error = %err, "article store failed");
    SERVER_ERROR.to_status_with(err.to_string())
}

impl UnaryHandler for ArticleHandler {
    fn call<'a>(&'a self, ctx: &'a mut CallContext, request: Payload) -> BoxFuture<'a, CallResult> {
        Box::pin(self.dispatch(ctx.method(), request))
    }
}

/// Serves [`ArticleService`] through a composed server chain.
#[derive(Debug, Clone)]
pub struct ArticleRpc {
    handler: ComposedHandler,
}

impl ArticleRpc {
    /// Wraps an already composed handler.
    pub fn new(handler: ComposedHandler) -> Self {
        Self { handler }
    }
}

#[tonic::async_trait]
impl ArticleService for ArticleRpc {
    async fn get_article_list(
        &self,
        request: tonic::Request<GetArticleRequest>,
    ) -> Result<tonic::Response<GetArticleResponse>, tonic::Status> {
        let mut ctx =
            CallContext::from_grpc_request(GET_ARTICLE_LIST, &request).with_peer(request.remote_addr());
        let result = self
            .handler
            .call(&mut ctx, Payload::new(request.into_inner()))
            .await;
        match result {
            Ok(payload) => payload
                .downcast::<GetArticleResponse>()
                .map(tonic::Response::new)
                .map_err(|status| status.to_wire()),
            Err(err) => Err(Status::from_error(&*err).to_wire()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ArticleRecord, MemoryStore};
    use futures_util::future::{self, BoxFuture as StoreFuture};
    use janus_middleware::server_chain;
    use janus_middleware::stages::AuthMode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn store_with(titles: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.migrate().await.unwrap();
        for title in titles {
            store.insert((*title).to_string()).await.unwrap();
        }
        store
    }

    /// Counts every call that reaches the store.
    #[derive(Default)]
    struct Counting {
        inner: MemoryStore,
        calls: AtomicUsize,
    }

    impl ArticleStore for Counting {
        fn migrate(&self) -> StoreFuture<'_, Result<(), StoreError>> {
            self.inner.migrate()
        }

        fn insert(&self, title: String) -> StoreFuture<'_, Result<ArticleRecord, StoreError>> {
            self.inner.insert(title)
        }

        fn find_page(
            &self,
            offset: i64,
            limit: i64,
        ) -> StoreFuture<'_, Result<Vec<ArticleRecord>, StoreError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.find_page(offset, limit)
        }

        fn count(&self) -> StoreFuture<'_, Result<i64, StoreError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.count()
        }

        fn close(&self) -> StoreFuture<'_, Result<(), StoreError>> {
            Box::pin(future::ready(Ok(())))
        }
    }

    #[tokio::test]
    async fn test_first_page() {
        let handler = ArticleHandler::new(store_with(&["a", "b", "c"]).await);
        let response = handler
            .get_article_list(GetArticleRequest { page: 1, size: 4 })
            .await
            .unwrap();

        let ids: Vec<_> = response.list.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(
            response.pager,
            Some(Pager {
                page: 1,
                size: 4,
                total_rows: 3
            })
        );
    }

    #[tokio::test]
    async fn test_page_past_end_is_empty() {
        let handler = ArticleHandler::new(store_with(&["a", "b", "c"]).await);
        let response = handler
            .get_article_list(GetArticleRequest { page: 3, size: 2 })
            .await
            .unwrap();
        assert!(response.list.is_empty());
        assert_eq!(response.pager.unwrap().total_rows, 3);
    }

    #[tokio::test]
    async fn test_invalid_pagination_skips_store() {
        let store = Arc::new(Counting::default());
        store.migrate().await.unwrap();
        let handler = ArticleHandler::new(Arc::clone(&store) as Arc<dyn ArticleStore>);

        for (page, size) in [(0, 4), (1, 0), (-1, 10), (3, -2)] {
            let status = handler
                .get_article_list(GetArticleRequest { page, size })
                .await
                .unwrap_err();
            assert_eq!(status.code(), Code::InvalidArgument);
            let detail = status.error_detail().unwrap();
            assert_eq!(detail.code, 20_010_001);
            assert_eq!(detail.message, "获取文章列表失败");
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_large_offset_does_not_overflow() {
        let handler = ArticleHandler::new(store_with(&["a"]).await);
        let response = handler
            .get_article_list(GetArticleRequest {
                page: i32::MAX,
                size: i32::MAX,
            })
            .await
            .unwrap();
        assert!(response.list.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_server_error() {
        let handler = ArticleHandler::new(Arc::new(MemoryStore::new()));
        let status = handler
            .get_article_list(GetArticleRequest { page: 1, size: 1 })
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.error_detail().unwrap().code, 10_000_000);
    }

    #[tokio::test]
    async fn test_dispatch_by_method() {
        let handler = ArticleHandler::new(store_with(&["a"]).await);

        let mut ctx = CallContext::new(GET_ARTICLE_LIST);
        let payload = handler
            .call(&mut ctx, Payload::new(GetArticleRequest { page: 1, size: 1 }))
            .await
            .unwrap();
        assert_eq!(payload.downcast::<GetArticleResponse>().unwrap().list.len(), 1);

        let mut ctx = CallContext::new("/proto.ArticleService/Delete");
        let err = handler
            .call(&mut ctx, Payload::new(GetArticleRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(Status::from_error(&*err).code(), Code::Unimplemented);
    }

    #[tokio::test]
    async fn test_rpc_adapter_returns_wire_details() {
        let handler = ArticleHandler::new(store_with(&[]).await);
        let rpc = ArticleRpc::new(server_chain(AuthMode::Disabled, None).wrap(handler));

        let wire = rpc
            .get_article_list(tonic::Request::new(GetArticleRequest { page: 0, size: 4 }))
            .await
            .unwrap_err();
        assert_eq!(wire.code(), tonic::Code::InvalidArgument);
        let status = Status::from_wire(&wire);
        assert_eq!(status.error_detail().unwrap().code, 20_010_001);
    }

    #[tokio::test]
    async fn test_rpc_adapter_enforces_auth() {
        let handler = ArticleHandler::new(store_with(&["a"]).await);
        let rpc = ArticleRpc::new(server_chain(AuthMode::Metadata, None).wrap(handler));

        let wire = rpc
            .get_article_list(tonic::Request::new(GetArticleRequest { page: 1, size: 1 }))
            .await
            .unwrap_err();
        assert_eq!(wire.code(), tonic::Code::Unauthenticated);

        let mut request = tonic::Request::new(GetArticleRequest { page: 1, size: 1 });
        request
            .metadata_mut()
            .insert("x-caller", "test".parse().unwrap());
        let response = rpc.get_article_list(request).await.unwrap().into_inner();
        assert_eq!(response.list[0].title, "a");
    }
}
