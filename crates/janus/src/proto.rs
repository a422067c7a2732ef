//! Messages and service stubs for package `proto`.
//!
//! ```protobuf
//! service ArticleService {
//!   rpc GetArticleList(GetArticleRequest) returns (GetArticleResponse) {
//!     option (google.api.http) = { get: "/v1/articles" };
//!   }
//! }
//! ```
//!
//! Messages also derive serde with the JSON field names the gateway uses
//! (`totalRows`); every field is always written.

use serde::{Deserialize, Serialize};

/// The application error record carried in status details.
pub use janus_core::ErrorDetail as Error;

/// Full name of the `GetArticleList` method.
pub const GET_ARTICLE_LIST: &str = "/proto.ArticleService/GetArticleList";

/// Request for one page of articles.
#[derive(Clone, PartialEq, Eq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetArticleRequest {
    /// One-based page number.
    #[prost(int32, tag = "1")]
    pub page: i32,
    /// Page size.
    #[prost(int32, tag = "2")]
    pub size: i32,
}

/// An article as listed.
#[derive(Clone, PartialEq, Eq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Article {
    /// Store identifier.
    #[prost(int32, tag = "1")]
    pub id: i32,
    /// Title.
    #[prost(string, tag = "2")]
    pub title: String,
}

/// Pagination echo plus the total row count.
#[derive(Clone, PartialEq, Eq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pager {
    /// Requested page.
    #[prost(int32, tag = "1")]
    pub page: i32,
    /// Requested size.
    #[prost(int32, tag = "2")]
    pub size: i32,
    /// Rows in the store.
    #[prost(int32, tag = "3")]
    pub total_rows: i32,
}

/// One page of articles.
#[derive(Clone, PartialEq, Eq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetArticleResponse {
    /// Articles on the page, newest first.
    #[prost(message, repeated, tag = "1")]
    pub list: Vec<Article>,
    /// Pagination.
    #[prost(message, optional, tag = "2")]
    pub pager: Option<Pager>,
}

/// Server-side stubs.
pub mod article_service_server {
    #![allow(missing_docs, clippy::wildcard_imports)]

    use tonic::codegen::*;

    /// The service contract implemented by the RPC adapter.
    #[async_trait]
    pub trait ArticleService: Send + Sync + 'static {
        async fn get_article_list(
            &self,
            request: tonic::Request<super::GetArticleRequest>,
        ) -> std::result::Result<tonic::Response<super::GetArticleResponse>, tonic::Status>;
    }

    #[derive(Debug)]
    pub struct ArticleServiceServer<T> {
        inner: Arc<T>,
    }

    impl<T> ArticleServiceServer<T> {
        pub fn new(inner: T) -> Self {
            Self::from_arc(Arc::new(inner))
        }

        pub fn from_arc(inner: Arc<T>) -> Self {
            Self { inner }
        }
    }

    impl<T, B> Service<http::Request<B>> for ArticleServiceServer<T>
    where
        T: ArticleService,
        B: Body + Send + 'static,
        B::Error: Into<StdError> + Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = std::convert::Infallible;
        type Future = BoxFuture<Self::Response, Self::Error>;

        fn poll_ready(
            &mut self,
            _cx: &mut Context<'_>,
        ) -> Poll<std::result::Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            match req.uri().path() {
                super::GET_ARTICLE_LIST => {
                    struct GetArticleListSvc<T: ArticleService>(Arc<T>);

                    impl<T: ArticleService> tonic::server::UnaryService<super::GetArticleRequest>
                        for GetArticleListSvc<T>
                    {
                        type Response = super::GetArticleResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

                        fn call(
                            &mut self,
                            request: tonic::Request<super::GetArticleRequest>,
                        ) -> Self::Future {
                            let inner = Arc::clone(&self.0);
                            Box::pin(async move { inner.get_article_list(request).await })
                        }
                    }

                    let inner = Arc::clone(&self.inner);
                    Box::pin(async move {
                        let method = GetArticleListSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec);
                        Ok(grpc.unary(method, req).await)
                    })
                }
                _ => Box::pin(async move {
                    let mut response = http::Response::new(empty_body());
                    let headers = response.headers_mut();
                    headers.insert(
                        tonic::Status::GRPC_STATUS,
                        (tonic::Code::Unimplemented as i32).into(),
                    );
                    headers.insert(
                        http::header::CONTENT_TYPE,
                        tonic::metadata::GRPC_CONTENT_TYPE,
                    );
                    Ok(response)
                }),
            }
        }
    }

    impl<T> Clone for ArticleServiceServer<T> {
        fn clone(&self) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
            }
        }
    }

    pub const SERVICE_NAME: &str = "proto.ArticleService";

    impl<T> tonic::server::NamedService for ArticleServiceServer<T> {
        const NAME: &'static str = SERVICE_NAME;
    }
}

/// Client-side stubs.
pub mod article_service_client {
    #![allow(missing_docs, clippy::wildcard_imports)]

    use tonic::codegen::*;

    #[derive(Debug, Clone)]
    pub struct ArticleServiceClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl ArticleServiceClient<tonic::transport::Channel> {
        /// Dials `dst` and waits for the connection.
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }

    impl<T> ArticleServiceClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            Self {
                inner: tonic::client::Grpc::new(inner),
            }
        }

        pub async fn get_article_list(
            &mut self,
            request: impl tonic::IntoRequest<super::GetArticleRequest>,
        ) -> std::result::Result<tonic::Response<super::GetArticleResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(super::GET_ARTICLE_LIST);
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(tonic::GrpcMethod::new("proto.ArticleService", "GetArticleList"));
            self.inner.unary(req, path, codec).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message as _;

    #[test]
    fn test_json_field_names() {
        let response = GetArticleResponse {
            list: Vec::new(),
            pager: Some(Pager {
                page: 2,
                size: 2,
                total_rows: 3,
            }),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"list": [], "pager": {"page": 2, "size": 2, "totalRows": 3}})
        );
    }

    #[test]
    fn test_request_from_partial_json() {
        let request: GetArticleRequest = serde_json::from_str(r#"{"page": 3}"#).unwrap();
        assert_eq!(request, GetArticleRequest { page: 3, size: 0 });
    }

    #[test]
    fn test_wire_encoding() {
        let request = GetArticleRequest { page: 1, size: 4 };
        // field 1 varint 1, field 2 varint 4
        assert_eq!(request.encode_to_vec(), vec![0x08, 0x01, 0x10, 0x04]);
    }
}
