//! The gateway's loopback RPC client.
//!
//! REST calls reach the article service over the same endpoint the server
//! listens on, through the client chain (credentials, timeout, retry).

use std::net::SocketAddr;
use std::time::Duration;

use janus_core::{CallContext, Status};
use janus_middleware::stages::{Credentials, RetryInterceptor};
use janus_middleware::{client_chain, BoxFuture, CallResult, ComposedHandler, Payload, UnaryHandler};
use tonic::transport::{Channel, Endpoint};

use crate::proto::article_service_client::ArticleServiceClient;
use crate::proto::{GetArticleRequest, GetArticleResponse, GET_ARTICLE_LIST};

/// The transport end of the client chain.
#[derive(Debug, Clone)]
struct RemoteArticleService {
    client: ArticleServiceClient<Channel>,
}

impl RemoteArticleService {
    async fn send(&self, ctx: &CallContext, request: Payload) -> CallResult {
        if ctx.method() != GET_ARTICLE_LIST {
            return Err(Status::unimplemented(format!("unknown method {}", ctx.method())).into());
        }
        let message = request.downcast::<GetArticleRequest>()?;
        let mut request = tonic::Request::new(message);
        *request.metadata_mut() = ctx.metadata().to_metadata_map();
        if let Some(remaining) = ctx.remaining() {
            request.set_timeout(remaining);
        }

        let mut client = self.client.clone();
        let response = client
            .get_article_list(request)
            .await
            .map_err(Status::from)?;
        Ok(Payload::new(response.into_inner()))
    }
}

impl UnaryHandler for RemoteArticleService {
    fn call<'a>(&'a self, ctx: &'a mut CallContext, request: Payload) -> BoxFuture<'a, CallResult> {
        Box::pin(self.send(ctx, request))
    }
}

/// Calls `ArticleService` through the client chain.
#[derive(Debug, Clone)]
pub struct ArticleGatewayClient {
    handler: ComposedHandler,
}

impl ArticleGatewayClient {
    /// Wraps `channel` in the client chain.
    pub fn new(
        channel: Channel,
        credentials: Option<Credentials>,
        timeout: Duration,
        retry: RetryInterceptor,
    ) -> Self {
        let transport = RemoteArticleService {
            client: ArticleServiceClient::new(channel),
        };
        Self {
            handler: client_chain(credentials, timeout, retry).wrap(transport),
        }
    }

    /// Creates a client for `addr` that connects on first use.
    ///
    /// Must be called inside a tokio runtime.
    pub fn connect_lazy(
        addr: SocketAddr,
        credentials: Option<Credentials>,
        timeout: Duration,
        retry: RetryInterceptor,
    ) -> Result<Self, tonic::transport::Error> {
        let channel = Endpoint::from_shared(format!("http://{addr}"))?.connect_lazy();
        Ok(Self::new(channel, credentials, timeout, retry))
    }

    /// Runs `GetArticleList` with the caller's context.
    pub async fn get_article_list(
        &self,
        mut ctx: CallContext,
        request: GetArticleRequest,
    ) -> Result<GetArticleResponse, Status> {
        let payload = self
            .handler
            .call(&mut ctx, Payload::new(request))
            .await
            .map_err(|err| Status::from_error(&*err))?;
        payload.downcast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use janus_core::Code;

    #[tokio::test]
    async fn test_lazy_client_reports_unavailable() {
        // Nothing listens on port 1; the call must fail rather than hang.
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let client = ArticleGatewayClient::connect_lazy(
            addr,
            None,
            Duration::from_secs(2),
            RetryInterceptor::new().max_attempts(1),
        )
        .unwrap();

        let status = client
            .get_article_list(
                CallContext::new(GET_ARTICLE_LIST),
                GetArticleRequest { page: 1, size: 1 },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            status.code(),
            Code::Unavailable | Code::Unknown | Code::DeadlineExceeded
        ));
    }

    #[tokio::test]
    async fn test_unknown_method_is_unimplemented() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let client = ArticleGatewayClient::connect_lazy(
            addr,
            None,
            Duration::from_secs(1),
            RetryInterceptor::new().max_attempts(1),
        )
        .unwrap();

        let status = client
            .get_article_list(
                CallContext::new("/proto.ArticleService/Remove"),
                GetArticleRequest::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unimplemented);
    }
}
