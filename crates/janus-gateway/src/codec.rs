//! Request decoding and response encoding.

use crate::error::error_response;
use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use janus_core::Status;
use janus_server::router::{HttpRequest, HttpResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Decodes the query string into `T`.
///
/// A missing query decodes like an empty one, so request types should
/// default their fields. Malformed input is `InvalidArgument`.
pub fn decode_query<T: DeserializeOwned>(request: &HttpRequest) -> Result<T, Status> {
    let query = request.uri().query().unwrap_or_default();
    serde_urlencoded::from_str(query)
        .map_err(|err| Status::invalid_argument(format!("invalid query: {err}")))
}

/// Decodes a JSON body into `T`; an empty body yields `T::default()`.
pub fn decode_json<T: DeserializeOwned + Default>(request: &HttpRequest) -> Result<T, Status> {
    let body = request.body();
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| Status::invalid_argument(format!("invalid JSON body: {err}")))
}

/// Serializes `value` as the JSON response body.
///
/// Encoding failures become an `Internal` error response.
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> HttpResponse {
    match serde_json::to_vec(value) {
        Ok(bytes) => {
            let mut response = Response::new(Full::new(Bytes::from(bytes)));
            *response.status_mut() = status;
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            response
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to encode response body");
            error_response(&Status::internal(format!("failed to encode response: {err}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;
    use http_body_util::BodyExt;
    use janus_core::Code;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Default, PartialEq, Deserialize)]
    #[serde(default)]
    struct PageQuery {
        page: i32,
        size: i32,
    }

    fn get(uri: &str) -> HttpRequest {
        Request::get(uri).body(Bytes::new()).unwrap()
    }

    #[test]
    fn test_decode_query() {
        let query: PageQuery = decode_query(&get("/v1/articles?page=2&size=10")).unwrap();
        assert_eq!(query, PageQuery { page: 2, size: 10 });

        let query: PageQuery = decode_query(&get("/v1/articles")).unwrap();
        assert_eq!(query, PageQuery::default());
    }

    #[test]
    fn test_decode_query_rejects_bad_numbers() {
        let err = decode_query::<PageQuery>(&get("/v1/articles?page=abc")).unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[test]
    fn test_decode_json() {
        let request = Request::post("/v1/articles")
            .body(Bytes::from_static(br#"{"page":3}"#))
            .unwrap();
        let decoded: PageQuery = decode_json(&request).unwrap();
        assert_eq!(decoded, PageQuery { page: 3, size: 0 });

        let empty = Request::post("/v1/articles").body(Bytes::new()).unwrap();
        assert_eq!(decode_json::<PageQuery>(&empty).unwrap(), PageQuery::default());

        let broken = Request::post("/v1/articles")
            .body(Bytes::from_static(b"{"))
            .unwrap();
        assert_eq!(
            decode_json::<PageQuery>(&broken).unwrap_err().code(),
            Code::InvalidArgument
        );
    }

    #[tokio::test]
    async fn test_json_response() {
        let mut value = BTreeMap::new();
        value.insert("totalRows", 3);
        let response = json_response(StatusCode::OK, &value);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"totalRows":3}"#);
    }

    #[tokio::test]
    async fn test_json_response_encode_failure_is_internal() {
        // Non-string map keys cannot be encoded as JSON object keys.
        let mut value = BTreeMap::new();
        value.insert((1, 2), "pair");
        let response = json_response(StatusCode::OK, &value);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], 13);
    }
}
