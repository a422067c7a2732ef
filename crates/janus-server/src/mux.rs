//! Connection multiplexer.
//!
//! One TCP listener, several protocol stacks. [`Mux::serve`] accepts each
//! connection, reads just enough of its opening bytes to evaluate the
//! registered [`Matcher`] rules in priority order, and hands it to the
//! [`SubListener`] of the first rule that matches. The bytes read while
//! classifying are replayed by [`MuxedStream`], so the consuming stack
//! parses from the true start of the stream.
//!
//! ```text
//!                       ┌─ Http2Preface ─→ SubListener "rpc"  → tonic
//! TcpListener → Mux ────┼─ Http1 ───────→ SubListener "http" → hyper
//!                       └─ (no match) ──→ closed, counted
//! ```
//!
//! The `Http2Preface` rule looks at the preface only. It does not wait for
//! a `content-type: application/grpc` header, so every HTTP/2 client on
//! the port is treated as binary RPC.
//!
//! Rules are fixed before serving starts. A rule that cannot decide yet
//! ([`MatchOutcome::NeedMore`]) holds up every lower-priority rule, so the
//! first registered rule that matches always wins.
//!
//! Classification runs in its own task per connection; the accept loop
//! never waits on a slow client or a busy sub-server.

use crate::config::ServerConfig;
use crate::error::MuxError;
use crate::shutdown::ShutdownSignal;
use bytes::{Buf, Bytes, BytesMut};
use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tonic::transport::server::{Connected, TcpConnectInfo};

/// Client connection preface that opens every HTTP/2 connection.
pub const HTTP2_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Routed connections a sub-listener buffers before dispatch waits.
const SUB_LISTENER_BACKLOG: usize = 128;

const ACCEPT_BACKOFF_START: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

const READ_CHUNK: usize = 512;

/// Longest method token the HTTP/1 matcher waits for.
const MAX_METHOD_LEN: usize = 24;

/// Result of evaluating a matcher against the bytes read so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The connection belongs to this rule.
    Matched,
    /// The connection cannot belong to this rule.
    Rejected,
    /// More bytes are needed to decide.
    NeedMore,
}

/// A predicate over a connection's opening bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// The HTTP/2 client preface; binary RPC traffic.
    Http2Preface,
    /// An HTTP/1.x request, recognised by its method token.
    ///
    /// Matches as soon as an upper-case token and a space have arrived.
    /// The rest of the request line is left to the HTTP stack, which
    /// answers oversized or malformed lines itself.
    Http1,
    /// Every connection. Must be the last rule.
    Any,
}

impl Matcher {
    /// Evaluates the matcher. With `eof` set no more bytes will arrive, so
    /// an undecided matcher rejects.
    pub fn evaluate(&self, prefix: &[u8], eof: bool) -> MatchOutcome {
        let outcome = match self {
            Matcher::Any => MatchOutcome::Matched,
            Matcher::Http2Preface => match_http2_preface(prefix),
            Matcher::Http1 => match_http1(prefix),
        };
        if eof && outcome == MatchOutcome::NeedMore {
            MatchOutcome::Rejected
        } else {
            outcome
        }
    }

    /// Returns `true` for [`Matcher::Any`].
    pub fn is_catch_all(&self) -> bool {
        matches!(self, Matcher::Any)
    }
}

fn match_http2_preface(prefix: &[u8]) -> MatchOutcome {
    if prefix.len() >= HTTP2_PREFACE.len() {
        if prefix.starts_with(HTTP2_PREFACE) {
            MatchOutcome::Matched
        } else {
            MatchOutcome::Rejected
        }
    } else if HTTP2_PREFACE.starts_with(prefix) {
        MatchOutcome::NeedMore
    } else {
        MatchOutcome::Rejected
    }
}

fn match_http1(prefix: &[u8]) -> MatchOutcome {
    let method_len = prefix.iter().take_while(|b| b.is_ascii_uppercase()).count();
    match prefix.get(method_len) {
        // `PRI` only ever opens the HTTP/2 preface.
        Some(b' ') if method_len > 0 && &prefix[..method_len] != b"PRI" => MatchOutcome::Matched,
        None if method_len <= MAX_METHOD_LEN => MatchOutcome::NeedMore,
        _ => MatchOutcome::Rejected,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    Route(usize),
    Unmatched,
    Pending,
}

fn classify<'a>(
    matchers: impl IntoIterator<Item = &'a Matcher>,
    prefix: &[u8],
    eof: bool,
) -> Classification {
    for (index, matcher) in matchers.into_iter().enumerate() {
        match matcher.evaluate(prefix, eof) {
            MatchOutcome::Matched => return Classification::Route(index),
            MatchOutcome::NeedMore => return Classification::Pending,
            MatchOutcome::Rejected => {}
        }
    }
    Classification::Unmatched
}

/// Classification limits and accept-loop tolerance.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Time allowed for a connection's opening bytes to arrive.
    pub sniff_timeout: Duration,
    /// Most bytes read while classifying.
    pub max_sniff_bytes: usize,
    /// Consecutive accept errors before [`Mux::serve`] fails.
    pub max_accept_errors: u32,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for MuxConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            sniff_timeout: config.sniff_timeout(),
            max_sniff_bytes: config.max_sniff_bytes(),
            max_accept_errors: config.max_accept_errors(),
        }
    }
}

/// Multiplexer counters.
#[derive(Debug, Default)]
pub struct MuxStats {
    accepted: AtomicU64,
    unmatched: AtomicU64,
    accept_errors: AtomicU64,
    routed: Mutex<HashMap<&'static str, u64>>,
}

impl MuxStats {
    /// Connections accepted from the base listener.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Connections closed because no rule matched.
    pub fn unmatched(&self) -> u64 {
        self.unmatched.load(Ordering::Relaxed)
    }

    /// Failed accepts on the base listener.
    pub fn accept_errors(&self) -> u64 {
        self.accept_errors.load(Ordering::Relaxed)
    }

    /// Connections routed to the named sub-listener.
    pub fn routed(&self, listener: &str) -> u64 {
        self.routed.lock().get(listener).copied().unwrap_or(0)
    }

    fn record_routed(&self, listener: &'static str) {
        *self.routed.lock().entry(listener).or_insert(0) += 1;
        janus_telemetry::metrics::record_mux_connection(listener);
    }

    fn record_unmatched(&self) {
        self.unmatched.fetch_add(1, Ordering::Relaxed);
        janus_telemetry::metrics::record_mux_unmatched();
    }
}

/// Source of raw connections for [`Mux`].
pub trait Acceptor: Send + Sync + 'static {
    /// Waits for the next connection.
    fn accept(&self) -> BoxFuture<'_, io::Result<(TcpStream, SocketAddr)>>;

    /// Address being listened on.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl Acceptor for TcpListener {
    fn accept(&self) -> BoxFuture<'_, io::Result<(TcpStream, SocketAddr)>> {
        Box::pin(TcpListener::accept(self))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

struct Rule {
    name: &'static str,
    matcher: Matcher,
    tx: mpsc::Sender<MuxedStream>,
}

/// The connection multiplexer.
pub struct Mux {
    listener: Box<dyn Acceptor>,
    rules: Vec<Rule>,
    config: MuxConfig,
    stats: Arc<MuxStats>,
}

impl Mux {
    /// Wraps a bound listener.
    pub fn new(listener: TcpListener, config: MuxConfig) -> Self {
        Self::with_acceptor(listener, config)
    }

    /// Wraps any connection source.
    pub fn with_acceptor(listener: impl Acceptor, config: MuxConfig) -> Self {
        Self {
            listener: Box::new(listener),
            rules: Vec::new(),
            config,
            stats: Arc::new(MuxStats::default()),
        }
    }

    /// Address of the base listener.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared counters; stay readable after [`Mux::serve`] consumes `self`.
    pub fn stats(&self) -> Arc<MuxStats> {
        Arc::clone(&self.stats)
    }

    /// Rule names in priority order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name).collect()
    }

    /// Appends a rule at the lowest priority so far and returns the
    /// sub-listener it feeds.
    pub fn register(
        &mut self,
        name: &'static str,
        matcher: Matcher,
    ) -> Result<SubListener, MuxError> {
        if self.rules.iter().any(|rule| rule.matcher.is_catch_all()) {
            return Err(MuxError::RuleAfterCatchAll(name));
        }
        if self.rules.iter().any(|rule| rule.name == name) {
            return Err(MuxError::DuplicateRule(name));
        }
        let (tx, rx) = mpsc::channel(SUB_LISTENER_BACKLOG);
        self.rules.push(Rule { name, matcher, tx });
        Ok(SubListener { name, rx })
    }

    /// Runs the accept loop until `shutdown` fires or accepting fails
    /// `max_accept_errors` times in a row.
    ///
    /// On return every sub-listener sees end-of-stream once the
    /// connections already being classified have been handed over.
    pub async fn serve(self, shutdown: ShutdownSignal) -> Result<(), MuxError> {
        let Mux {
            listener,
            rules,
            config,
            stats,
        } = self;
        let rules: Arc<[Rule]> = rules.into();
        let config = Arc::new(config);
        let stop = shutdown.recv();
        tokio::pin!(stop);

        tracing::info!(
            addr = ?listener.local_addr().ok(),
            rules = ?rules.iter().map(|rule| rule.name).collect::<Vec<_>>(),
            "multiplexer serving"
        );

        let mut consecutive_errors = 0_u32;
        let mut backoff = ACCEPT_BACKOFF_START;
        loop {
            let accepted = tokio::select! {
                result = listener.accept() => result,
                () = &mut stop => break,
            };

            match accepted {
                Ok((stream, remote_addr)) => {
                    consecutive_errors = 0;
                    backoff = ACCEPT_BACKOFF_START;
                    stats.accepted.fetch_add(1, Ordering::Relaxed);
                    tokio::spawn(dispatch(
                        stream,
                        remote_addr,
                        Arc::clone(&rules),
                        Arc::clone(&stats),
                        Arc::clone(&config),
                    ));
                }
                Err(e) => {
                    consecutive_errors += 1;
                    stats.accept_errors.fetch_add(1, Ordering::Relaxed);
                    janus_telemetry::metrics::record_accept_error();
                    if consecutive_errors >= config.max_accept_errors {
                        tracing::error!(error = %e, consecutive_errors, "accept failing, stopping multiplexer");
                        return Err(MuxError::AcceptFailed {
                            count: consecutive_errors,
                            source: e,
                        });
                    }
                    tracing::warn!(error = %e, consecutive_errors, ?backoff, "accept failed, retrying");
                    tokio::select! {
                        () = tokio::time::sleep(backoff) => {}
                        () = &mut stop => break,
                    }
                    backoff = (backoff * 2).min(ACCEPT_BACKOFF_MAX);
                }
            }
        }

        tracing::info!("multiplexer stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Mux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mux")
            .field("addr", &self.listener.local_addr().ok())
            .field("rules", &self.rule_names())
            .field("config", &self.config)
            .finish()
    }
}

async fn dispatch(
    mut stream: TcpStream,
    remote_addr: SocketAddr,
    rules: Arc<[Rule]>,
    stats: Arc<MuxStats>,
    config: Arc<MuxConfig>,
) {
    let (route, prefix) = match sniff(&mut stream, &rules, &config).await {
        Ok(result) => result,
        Err(e) => {
            tracing::debug!(%remote_addr, error = %e, "read failed while classifying connection");
            stats.record_unmatched();
            return;
        }
    };

    let Some(index) = route else {
        tracing::debug!(%remote_addr, sniffed = prefix.len(), "no rule matched, closing connection");
        stats.record_unmatched();
        return;
    };

    let rule = &rules[index];
    stats.record_routed(rule.name);
    tracing::trace!(listener = rule.name, %remote_addr, "connection routed");
    if rule.tx.send(MuxedStream::new(prefix, stream)).await.is_err() {
        tracing::debug!(listener = rule.name, %remote_addr, "sub-listener closed, dropping connection");
    }
}

async fn sniff(
    stream: &mut TcpStream,
    rules: &[Rule],
    config: &MuxConfig,
) -> io::Result<(Option<usize>, Bytes)> {
    let deadline = Instant::now() + config.sniff_timeout;
    let mut buf = BytesMut::with_capacity(config.max_sniff_bytes.min(READ_CHUNK * 2));
    let mut chunk = [0_u8; READ_CHUNK];
    let mut exhausted = false;

    loop {
        match classify(rules.iter().map(|rule| &rule.matcher), &buf, exhausted) {
            Classification::Route(index) => return Ok((Some(index), buf.freeze())),
            Classification::Unmatched => return Ok((None, buf.freeze())),
            Classification::Pending => {}
        }

        let room = config.max_sniff_bytes.saturating_sub(buf.len()).min(READ_CHUNK);
        if room == 0 {
            exhausted = true;
            continue;
        }
        match tokio::time::timeout_at(deadline, stream.read(&mut chunk[..room])).await {
            Ok(Ok(0)) | Err(_) => exhausted = true,
            Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
            Ok(Err(e)) => return Err(e),
        }
    }
}

/// A routed connection that replays the classified bytes before the live
/// socket.
#[derive(Debug)]
pub struct MuxedStream {
    prefix: Bytes,
    inner: TcpStream,
}

impl MuxedStream {
    /// Wraps `inner`, replaying `prefix` first.
    pub fn new(prefix: Bytes, inner: TcpStream) -> Self {
        Self { prefix, inner }
    }

    /// Bytes not yet replayed.
    pub fn pending_prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Remote address of the connection.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.inner.peer_addr()
    }

    /// Local address of the connection.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

impl AsyncRead for MuxedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.prefix.is_empty() {
            let n = this.prefix.len().min(buf.remaining());
            buf.put_slice(&this.prefix[..n]);
            this.prefix.advance(n);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for MuxedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

impl Connected for MuxedStream {
    type ConnectInfo = TcpConnectInfo;

    fn connect_info(&self) -> Self::ConnectInfo {
        self.inner.connect_info()
    }
}

/// A virtual listener fed by the multiplexer.
#[derive(Debug)]
pub struct SubListener {
    name: &'static str,
    rx: mpsc::Receiver<MuxedStream>,
}

impl SubListener {
    /// Rule name this listener was registered under.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Waits for the next routed connection; `None` once the multiplexer
    /// has stopped.
    pub async fn accept(&mut self) -> Option<MuxedStream> {
        self.rx.recv().await
    }

    /// Converts into an incoming-connection stream for tonic.
    pub fn into_stream(self) -> BoxStream<'static, io::Result<MuxedStream>> {
        stream::unfold(self.rx, |mut rx| async move {
            rx.recv().await.map(|conn| (Ok(conn), rx))
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http2_preface_matcher() {
        let m = Matcher::Http2Preface;
        assert_eq!(m.evaluate(b"", false), MatchOutcome::NeedMore);
        assert_eq!(m.evaluate(b"PRI * HT", false), MatchOutcome::NeedMore);
        assert_eq!(m.evaluate(b"PRI * HT", true), MatchOutcome::Rejected);
        assert_eq!(m.evaluate(HTTP2_PREFACE, false), MatchOutcome::Matched);

        let mut with_frames = HTTP2_PREFACE.to_vec();
        with_frames.extend_from_slice(&[0, 0, 0, 4, 0, 0, 0, 0, 0]);
        assert_eq!(m.evaluate(&with_frames, false), MatchOutcome::Matched);

        assert_eq!(m.evaluate(b"GET / HTTP/1.1\r\n", false), MatchOutcome::Rejected);
    }

    #[test]
    fn test_http1_matcher() {
        let m = Matcher::Http1;
        assert_eq!(
            m.evaluate(b"GET /v1/articles?page=1 HTTP/1.1\r\nHost: x\r\n", false),
            MatchOutcome::Matched
        );
        assert_eq!(m.evaluate(b"POST /x HTTP/1.0\n", false), MatchOutcome::Matched);
        assert_eq!(m.evaluate(b"GET /v1/art", false), MatchOutcome::Matched);
        assert_eq!(m.evaluate(b"OPTIONS ", false), MatchOutcome::Matched);
        assert_eq!(m.evaluate(b"", false), MatchOutcome::NeedMore);
        assert_eq!(m.evaluate(b"DELE", false), MatchOutcome::NeedMore);
        assert_eq!(m.evaluate(b"DELE", true), MatchOutcome::Rejected);
        assert_eq!(m.evaluate(HTTP2_PREFACE, false), MatchOutcome::Rejected);
        assert_eq!(m.evaluate(b"PRI", false), MatchOutcome::NeedMore);
        assert_eq!(m.evaluate(b"SSH-2.0-OpenSSH", false), MatchOutcome::Rejected);
        assert_eq!(m.evaluate(&[b'A'; 64], false), MatchOutcome::Rejected);
        assert_eq!(m.evaluate(b"hello world\r\n", false), MatchOutcome::Rejected);
        assert_eq!(m.evaluate(&[0x16, 0x03, 0x01], false), MatchOutcome::Rejected);
    }

    #[test]
    fn test_http1_matcher_ignores_request_line_length() {
        let mut line = b"GET /hello?q=".to_vec();
        line.resize(4096, b'a');
        assert_eq!(Matcher::Http1.evaluate(&line, false), MatchOutcome::Matched);
        assert_eq!(Matcher::Http1.evaluate(&line, true), MatchOutcome::Matched);
    }

    #[test]
    fn test_any_matches_everything() {
        assert_eq!(Matcher::Any.evaluate(b"", true), MatchOutcome::Matched);
        assert!(Matcher::Any.is_catch_all());
        assert!(!Matcher::Http1.is_catch_all());
    }

    #[test]
    fn test_classify_first_match_wins() {
        let rules = [Matcher::Http2Preface, Matcher::Http1, Matcher::Any];
        assert_eq!(classify(&rules, HTTP2_PREFACE, false), Classification::Route(0));
        assert_eq!(classify(&rules, b"GET / HTTP/1.1\r\n", false), Classification::Route(1));
        assert_eq!(classify(&rules, b"\x00\x01", false), Classification::Route(2));
    }

    #[test]
    fn test_classify_waits_on_undecided_higher_rule() {
        let rules = [Matcher::Http2Preface, Matcher::Any];
        assert_eq!(classify(&rules, b"PRI", false), Classification::Pending);
        assert_eq!(classify(&rules, b"PRI", true), Classification::Route(1));
    }

    #[test]
    fn test_classify_unmatched() {
        let rules = [Matcher::Http2Preface, Matcher::Http1];
        assert_eq!(classify(&rules, b"SSH-2.0-OpenSSH\r\n", false), Classification::Unmatched);
        assert_eq!(classify(&rules, b"", true), Classification::Unmatched);
    }

    #[tokio::test]
    async fn test_register_rejects_rules_after_catch_all() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut mux = Mux::new(listener, MuxConfig::default());
        mux.register("rpc", Matcher::Http2Preface).unwrap();
        assert!(matches!(
            mux.register("rpc", Matcher::Http1),
            Err(MuxError::DuplicateRule("rpc"))
        ));
        mux.register("fallback", Matcher::Any).unwrap();
        assert!(matches!(
            mux.register("http", Matcher::Http1),
            Err(MuxError::RuleAfterCatchAll("http"))
        ));
        assert_eq!(mux.rule_names(), vec!["rpc", "fallback"]);
    }

    /// Fails `failures` accepts, then hands out connections from `inner`.
    struct FlakyListener {
        failures: AtomicU64,
        inner: Option<TcpListener>,
    }

    impl FlakyListener {
        fn new(failures: u64, inner: Option<TcpListener>) -> Self {
            Self {
                failures: AtomicU64::new(failures),
                inner,
            }
        }
    }

    impl Acceptor for FlakyListener {
        fn accept(&self) -> BoxFuture<'_, io::Result<(TcpStream, SocketAddr)>> {
            Box::pin(async move {
                let left = self.failures.load(Ordering::SeqCst);
                if left > 0 {
                    self.failures.store(left - 1, Ordering::SeqCst);
                    return Err(io::Error::new(io::ErrorKind::Other, "too many open files"));
                }
                match &self.inner {
                    Some(listener) => listener.accept().await,
                    None => std::future::pending().await,
                }
            })
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            match &self.inner {
                Some(listener) => listener.local_addr(),
                None => Err(io::Error::new(io::ErrorKind::NotConnected, "no listener")),
            }
        }
    }

    fn tolerant(max_accept_errors: u32) -> MuxConfig {
        MuxConfig {
            max_accept_errors,
            ..MuxConfig::default()
        }
    }

    #[tokio::test]
    async fn test_accept_errors_below_limit_are_retried() {
        use tokio::io::AsyncWriteExt;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut mux = Mux::with_acceptor(FlakyListener::new(2, Some(listener)), tolerant(3));
        let mut http = mux.register("http", Matcher::Http1).unwrap();
        let stats = mux.stats();
        let shutdown = ShutdownSignal::new();
        let serving = tokio::spawn(mux.serve(shutdown.clone()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        let routed = tokio::time::timeout(Duration::from_secs(5), http.accept())
            .await
            .expect("routed after recovering")
            .unwrap();
        assert_eq!(routed.pending_prefix().first(), Some(&b'G'));
        assert_eq!(stats.accept_errors(), 2);
        assert_eq!(stats.accepted(), 1);

        shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), serving).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_accept_errors_at_limit_are_fatal() {
        let mut mux = Mux::with_acceptor(FlakyListener::new(u64::MAX, None), tolerant(3));
        let _http = mux.register("http", Matcher::Http1).unwrap();
        let stats = mux.stats();

        let result = tokio::time::timeout(Duration::from_secs(5), mux.serve(ShutdownSignal::new()))
            .await
            .expect("gave up in time");
        assert!(matches!(result, Err(MuxError::AcceptFailed { count: 3, .. })));
        assert_eq!(stats.accept_errors(), 3);
    }

    #[tokio::test]
    async fn test_muxed_stream_replays_prefix() {
        use tokio::io::AsyncWriteExt;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        let (server_side, _) = listener.accept().await.unwrap();

        client.write_all(b" world").await.unwrap();
        let mut stream = MuxedStream::new(Bytes::from_static(b"hello"), server_side);
        assert_eq!(stream.pending_prefix(), b"hello");

        let mut out = [0_u8; 11];
        stream.read_exact(&mut out).await.unwrap();
        assert_eq!(&out, b"hello world");
        assert!(stream.pending_prefix().is_empty());
    }
}
