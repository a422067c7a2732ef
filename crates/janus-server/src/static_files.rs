//! Static documentation files.
//!
//! Serves a directory below a mount prefix, e.g. a Swagger UI bundle at
//! `/swagger-ui/` and generated `*.swagger.json` documents at `/swagger/`.
//!
//! - `GET` and `HEAD` only
//! - `..` components, hidden files and paths escaping the root are refused
//! - `index.html` fallback for directories
//! - `ETag` / `If-None-Match` and `Last-Modified` / `If-Modified-Since`
//!
//! ```rust
//! use janus_server::router::HttpRouter;
//! use janus_server::static_files::StaticFiles;
//!
//! let router = HttpRouter::new()
//!     .mount("/swagger-ui/", StaticFiles::new("third_party/swagger-ui"))
//!     .mount(
//!         "/swagger/",
//!         StaticFiles::new("proto").only_suffix(".swagger.json"),
//!     );
//! assert_eq!(router.mount_prefixes().len(), 2);
//! ```

use crate::router::{json_error, HttpHandler, HttpRequest, HttpResponse, MountedPath};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{header, HeaderMap, HeaderValue, Method, Response, StatusCode};
use http_body_util::Full;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Why a file could not be served.
#[derive(Debug, Error)]
pub enum StaticFileError {
    /// No such file.
    #[error("file not found: {0}")]
    NotFound(String),

    /// The path is not allowed.
    #[error("forbidden path: {0}")]
    Forbidden(String),

    /// Only `GET` and `HEAD` are served.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// Reading the file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StaticFileError {
    /// HTTP status for the error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn rpc_code(&self) -> i32 {
        match self {
            Self::NotFound(_) => 5,
            Self::Forbidden(_) => 7,
            Self::MethodNotAllowed => 12,
            Self::Io(_) => 13,
        }
    }
}

/// A directory served read-only.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    inner: Arc<Settings>,
}

#[derive(Debug, Clone)]
struct Settings {
    root: PathBuf,
    index_file: Option<String>,
    cache_control: Option<String>,
    only_suffix: Option<String>,
    serve_hidden: bool,
}

impl StaticFiles {
    /// Serves `root` with `index.html` fallback.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            inner: Arc::new(Settings {
                root: root.as_ref().to_path_buf(),
                index_file: Some("index.html".to_string()),
                cache_control: None,
                only_suffix: None,
                serve_hidden: false,
            }),
        }
    }

    fn settings(mut self, f: impl FnOnce(&mut Settings)) -> Self {
        f(Arc::make_mut(&mut self.inner));
        self
    }

    /// Sets the directory index file; `None` disables the fallback.
    pub fn index(self, index: Option<&str>) -> Self {
        let index = index.map(str::to_string);
        self.settings(|s| s.index_file = index)
    }

    /// Adds a `Cache-Control` header to every file response.
    pub fn cache_control(self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.settings(|s| s.cache_control = Some(value))
    }

    /// Serves only files whose name ends with `suffix`.
    pub fn only_suffix(self, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        self.settings(|s| s.only_suffix = Some(suffix))
    }

    /// Allows names starting with `.`.
    pub fn serve_hidden(self, enabled: bool) -> Self {
        self.settings(|s| s.serve_hidden = enabled)
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Serves `relative_path` below the root.
    pub async fn serve(
        &self,
        relative_path: &str,
        headers: &HeaderMap,
        method: &Method,
    ) -> Result<HttpResponse, StaticFileError> {
        if method != Method::GET && method != Method::HEAD {
            return Err(StaticFileError::MethodNotAllowed);
        }

        let mut path = self.resolve(relative_path).await?;
        if tokio::fs::metadata(&path).await?.is_dir() {
            let index = self
                .inner
                .index_file
                .as_deref()
                .map(|index| path.join(index))
                .ok_or_else(|| StaticFileError::NotFound(relative_path.to_string()))?;
            if !tokio::fs::metadata(&index).await.is_ok_and(|m| m.is_file()) {
                return Err(StaticFileError::NotFound(relative_path.to_string()));
            }
            path = index;
        } else if let Some(suffix) = &self.inner.only_suffix {
            if !relative_path.ends_with(suffix.as_str()) {
                return Err(StaticFileError::NotFound(relative_path.to_string()));
            }
        }

        self.serve_file(&path, headers, method).await
    }

    async fn resolve(&self, relative_path: &str) -> Result<PathBuf, StaticFileError> {
        let relative = relative_path.trim_start_matches('/');
        for component in Path::new(relative).components() {
            match component {
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StaticFileError::Forbidden(relative_path.to_string()));
                }
                Component::Normal(name) => {
                    let hidden = name.to_str().map_or(true, |n| n.starts_with('.'));
                    if hidden && !self.inner.serve_hidden {
                        return Err(StaticFileError::Forbidden(relative_path.to_string()));
                    }
                }
                Component::CurDir => {}
            }
        }

        let root = tokio::fs::canonicalize(&self.inner.root).await?;
        let full = tokio::fs::canonicalize(root.join(relative))
            .await
            .map_err(|_| StaticFileError::NotFound(relative_path.to_string()))?;
        if !full.starts_with(&root) {
            return Err(StaticFileError::Forbidden(relative_path.to_string()));
        }
        Ok(full)
    }

    async fn serve_file(
        &self,
        path: &Path,
        headers: &HeaderMap,
        method: &Method,
    ) -> Result<HttpResponse, StaticFileError> {
        let metadata = tokio::fs::metadata(path).await?;
        let modified = metadata.modified().ok();
        let etag = modified.map(|m| etag_for(path, metadata.len(), m));

        if is_not_modified(headers, etag.as_deref(), modified) {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::NOT_MODIFIED;
            if let Some(etag) = etag.as_deref().and_then(|e| HeaderValue::from_str(e).ok()) {
                response.headers_mut().insert(header::ETAG, etag);
            }
            return Ok(response);
        }

        let body = if method == Method::HEAD {
            Bytes::new()
        } else {
            Bytes::from(tokio::fs::read(path).await?)
        };

        let mut response = Response::new(Full::new(body));
        let response_headers = response.headers_mut();
        response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(mime_type(path)));
        response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()));
        if let Some(etag) = etag.as_deref().and_then(|e| HeaderValue::from_str(e).ok()) {
            response_headers.insert(header::ETAG, etag);
        }
        if let Some(modified) = modified {
            if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(modified)) {
                response_headers.insert(header::LAST_MODIFIED, value);
            }
        }
        if let Some(cache) = self
            .inner
            .cache_control
            .as_deref()
            .and_then(|c| HeaderValue::from_str(c).ok())
        {
            response_headers.insert(header::CACHE_CONTROL, cache);
        }
        Ok(response)
    }
}

impl HttpHandler for StaticFiles {
    fn handle(&self, request: HttpRequest) -> BoxFuture<'static, HttpResponse> {
        let files = self.clone();
        Box::pin(async move {
            let relative = request
                .extensions()
                .get::<MountedPath>()
                .map_or_else(|| request.uri().path().to_string(), |m| m.0.clone());
            match files.serve(&relative, request.headers(), request.method()).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(path = %relative, error = %e, "static file not served");
                    json_error(e.status_code(), e.rpc_code(), &e.to_string())
                }
            }
        })
    }
}

fn etag_for(path: &Path, len: u64, modified: SystemTime) -> String {
    let secs = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    format!("\"{secs:x}-{len:x}-{:x}\"", hasher.finish() & 0xffff)
}

fn is_not_modified(headers: &HeaderMap, etag: Option<&str>, modified: Option<SystemTime>) -> bool {
    if let Some(if_none_match) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    {
        // If-None-Match takes precedence over If-Modified-Since.
        return etag.is_some_and(|etag| {
            if_none_match == "*" || if_none_match.split(',').any(|tag| tag.trim() == etag)
        });
    }

    let since = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| httpdate::parse_http_date(v).ok());
    match (since, modified) {
        (Some(since), Some(modified)) => {
            let secs = |t: SystemTime| t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).ok();
            matches!((secs(modified), secs(since)), (Some(m), Some(s)) if m <= s)
        }
        _ => false,
    }
}

fn mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "yaml" | "yml" => "application/yaml",
        "txt" => "text/plain; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>docs</h1>").unwrap();
        std::fs::write(dir.path().join("article.swagger.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        std::fs::write(dir.path().join(".env"), "SECRET=1").unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css/app.css"), "body{}").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_serves_file_with_headers() {
        let dir = fixture();
        let files = StaticFiles::new(dir.path()).cache_control("max-age=60");
        let response = files
            .serve("css/app.css", &HeaderMap::new(), &Method::GET)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css; charset=utf-8");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=60");
        assert!(response.headers().contains_key(header::ETAG));
        assert!(response.headers().contains_key(header::LAST_MODIFIED));
    }

    #[tokio::test]
    async fn test_directory_falls_back_to_index() {
        let dir = fixture();
        let response = StaticFiles::new(dir.path())
            .serve("", &HeaderMap::new(), &Method::GET)
            .await
            .unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
    }

    #[tokio::test]
    async fn test_refuses_traversal_and_hidden_files() {
        let dir = fixture();
        let files = StaticFiles::new(dir.path());
        for path in ["../etc/passwd", "css/../../x", ".env"] {
            let err = files.serve(path, &HeaderMap::new(), &Method::GET).await.unwrap_err();
            assert_eq!(err.status_code(), StatusCode::FORBIDDEN, "{path}");
        }
    }

    #[tokio::test]
    async fn test_only_suffix() {
        let dir = fixture();
        let files = StaticFiles::new(dir.path()).only_suffix(".swagger.json");
        assert!(files
            .serve("article.swagger.json", &HeaderMap::new(), &Method::GET)
            .await
            .is_ok());
        let err = files
            .serve("notes.txt", &HeaderMap::new(), &Method::GET)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_if_none_match_gives_304() {
        let dir = fixture();
        let files = StaticFiles::new(dir.path());
        let first = files
            .serve("notes.txt", &HeaderMap::new(), &Method::GET)
            .await
            .unwrap();
        let etag = first.headers()[header::ETAG].clone();

        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, etag);
        let second = files.serve("notes.txt", &headers, &Method::GET).await.unwrap();
        assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn test_rejects_other_methods_and_missing_files() {
        let dir = fixture();
        let files = StaticFiles::new(dir.path());
        let err = files
            .serve("notes.txt", &HeaderMap::new(), &Method::POST)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        let err = files
            .serve("missing.txt", &HeaderMap::new(), &Method::GET)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
