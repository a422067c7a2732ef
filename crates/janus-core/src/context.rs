//! Per-call context.
//!
//! A [`CallContext`] is created when a call arrives (or when the gateway
//! issues one) and is threaded by `&mut` through every interceptor stage
//! into the handler. It is never shared between concurrent calls.

use crate::metadata::Metadata;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Header carrying the caller's timeout on RPC requests.
pub const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Unique identifier for a call, using UUID v7 so ids sort by time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
    /// Creates a new call id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State carried by one call through the interceptor chain.
///
/// # Example
///
/// ```
/// use janus_core::CallContext;
/// use std::time::Duration;
///
/// let mut ctx = CallContext::new("/proto.ArticleService/GetArticleList");
/// ctx.metadata_mut().insert("app_key", "janus");
/// ctx.set_timeout(Duration::from_secs(5));
///
/// assert_eq!(ctx.service(), "proto.ArticleService");
/// assert!(ctx.deadline().is_some());
/// ```
pub struct CallContext {
    call_id: CallId,
    method: String,
    metadata: Metadata,
    deadline: Option<Instant>,
    trace_id: Option<String>,
    span_id: Option<String>,
    peer: Option<SocketAddr>,
    started_at: Instant,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl CallContext {
    /// Creates a context for `method`, the full `/package.Service/Method` name.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            call_id: CallId::new(),
            method: method.into(),
            metadata: Metadata::new(),
            deadline: None,
            trace_id: None,
            span_id: None,
            peer: None,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Creates a context for an RPC arriving on the transport.
    ///
    /// Application metadata is copied from the request and a `grpc-timeout`
    /// header, when present and well formed, becomes the deadline.
    pub fn from_grpc_request<T>(method: impl Into<String>, request: &tonic::Request<T>) -> Self {
        let mut ctx = Self::new(method).with_metadata(Metadata::from_metadata_map(request.metadata()));
        let timeout = request
            .metadata()
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_grpc_timeout);
        if let Some(timeout) = timeout {
            ctx.set_timeout(timeout);
        }
        ctx
    }

    /// Replaces the metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the peer address.
    pub fn with_peer(mut self, peer: Option<SocketAddr>) -> Self {
        self.peer = peer;
        self
    }

    /// The call id.
    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    /// Full method name, e.g. `/proto.ArticleService/GetArticleList`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Service part of the method name.
    pub fn service(&self) -> &str {
        self.method
            .trim_start_matches('/')
            .split_once('/')
            .map_or("", |(service, _)| service)
    }

    /// Call metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Mutable call metadata.
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// The deadline, if one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Sets the deadline to `timeout` from now. An existing earlier
    /// deadline is kept.
    pub fn set_timeout(&mut self, timeout: Duration) {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
    }

    /// Time left before the deadline; `None` without a deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` once the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Trace id attached by the tracing stage.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Span id attached by the tracing stage.
    pub fn span_id(&self) -> Option<&str> {
        self.span_id.as_deref()
    }

    /// Attaches trace and span ids.
    pub fn set_trace(&mut self, trace_id: impl Into<String>, span_id: impl Into<String>) {
        self.trace_id = Some(trace_id.into());
        self.span_id = Some(span_id.into());
    }

    /// Remote address of the caller, if known.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Time elapsed since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension, replacing any previous value of that type.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Returns a typed extension.
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref())
    }

    /// Removes a typed extension.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast().ok())
            .map(|boxed| *boxed)
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("call_id", &self.call_id)
            .field("method", &self.method)
            .field("metadata", &self.metadata)
            .field("deadline", &self.deadline)
            .field("trace_id", &self.trace_id)
            .field("span_id", &self.span_id)
            .field("peer", &self.peer)
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

/// Parses a `grpc-timeout` value: at most eight digits followed by a unit
/// (`H`, `M`, `S`, `m`, `u`, `n`).
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.len() < 2 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;
    match unit {
        "H" => Some(Duration::from_secs(amount * 3600)),
        "M" => Some(Duration::from_secs(amount * 60)),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_and_method() {
        let ctx = CallContext::new("/proto.ArticleService/GetArticleList");
        assert_eq!(ctx.method(), "/proto.ArticleService/GetArticleList");
        assert_eq!(ctx.service(), "proto.ArticleService");
        assert_eq!(CallContext::new("bogus").service(), "");
    }

    #[test]
    fn test_call_ids_are_unique() {
        let a = CallContext::new("/a/b");
        let b = CallContext::new("/a/b");
        assert_ne!(a.call_id(), b.call_id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_timeout_keeps_earlier_deadline() {
        let mut ctx = CallContext::new("/a/b");
        ctx.set_timeout(Duration::from_secs(1));
        let first = ctx.deadline();
        ctx.set_timeout(Duration::from_secs(10));
        assert_eq!(ctx.deadline(), first);

        ctx.set_timeout(Duration::from_millis(10));
        assert!(ctx.deadline() < first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let mut ctx = CallContext::new("/a/b");
        assert!(!ctx.is_expired());
        assert!(ctx.remaining().is_none());

        ctx.set_timeout(Duration::from_millis(100));
        assert!(!ctx.is_expired());
        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_extensions() {
        #[derive(Debug, PartialEq)]
        struct Tenant(&'static str);

        let mut ctx = CallContext::new("/a/b");
        ctx.set_extension(Tenant("acme"));
        assert_eq!(ctx.get_extension::<Tenant>(), Some(&Tenant("acme")));
        assert_eq!(ctx.remove_extension::<Tenant>(), Some(Tenant("acme")));
        assert!(ctx.get_extension::<Tenant>().is_none());
    }

    #[test]
    fn test_parse_grpc_timeout() {
        assert_eq!(parse_grpc_timeout("5S"), Some(Duration::from_secs(5)));
        assert_eq!(parse_grpc_timeout("250m"), Some(Duration::from_millis(250)));
        assert_eq!(parse_grpc_timeout("2H"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_grpc_timeout("100u"), Some(Duration::from_micros(100)));
        assert_eq!(parse_grpc_timeout("S"), None);
        assert_eq!(parse_grpc_timeout("123456789S"), None);
        assert_eq!(parse_grpc_timeout("10x"), None);
        assert_eq!(parse_grpc_timeout("-1S"), None);
    }

    #[tokio::test]
    async fn test_from_grpc_request() {
        let mut request = tonic::Request::new(());
        request
            .metadata_mut()
            .insert("app_key", "janus".parse().unwrap());
        request
            .metadata_mut()
            .insert("grpc-timeout", "3S".parse().unwrap());

        let ctx = CallContext::from_grpc_request("/proto.ArticleService/GetArticleList", &request);
        assert_eq!(ctx.metadata().get("app_key"), Some("janus"));
        assert!(!ctx.metadata().contains_key("grpc-timeout"));
        assert!(ctx.remaining().is_some_and(|left| left <= Duration::from_secs(3)));
    }
}
