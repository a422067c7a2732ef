//! Configuration schema types.
//!
//! One struct per configuration section. Every field has a default, so any
//! subset of a section may be written; unknown fields are rejected.

use serde::{Deserialize, Serialize};

/// Listener and serving behavior.
///
/// # Example
///
/// ```
/// use janus_config::ServerSection;
///
/// let section = ServerSection {
///     addr: "127.0.0.1:9000".to_string(),
///     ..ServerSection::default()
/// };
/// assert_eq!(section.max_sniff_bytes, 4096);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Bind address shared by RPC and HTTP (e.g., "0.0.0.0:8004").
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Grace period for in-flight calls at shutdown, in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// HTTP request timeout and default RPC deadline, in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// How long a new connection may take to send its opening bytes.
    #[serde(default = "default_sniff_timeout")]
    pub sniff_timeout_ms: u64,

    /// Upper bound on bytes read while classifying a connection.
    #[serde(default = "default_max_sniff_bytes")]
    pub max_sniff_bytes: usize,

    /// Consecutive accept failures tolerated before the server stops.
    #[serde(default = "default_max_accept_errors")]
    pub max_accept_errors: u32,

    /// HTTP/1.1 keep-alive.
    #[serde(default = "default_true")]
    pub keep_alive: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_ms: default_request_timeout(),
            sniff_timeout_ms: default_sniff_timeout(),
            max_sniff_bytes: default_max_sniff_bytes(),
            max_accept_errors: default_max_accept_errors(),
            keep_alive: true,
        }
    }
}

fn default_addr() -> String {
    "0.0.0.0:8004".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_sniff_timeout() -> u64 {
    5_000
}

fn default_max_sniff_bytes() -> usize {
    4096
}

fn default_max_accept_errors() -> u32 {
    16
}

/// What the authentication stage requires of a call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthModeSetting {
    /// Every call is accepted.
    Disabled,
    /// Calls must carry some application metadata.
    Metadata,
    /// Calls must carry the configured `app_key`/`app_secret`.
    #[default]
    Credentials,
}

/// Call authentication.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthSection {
    /// Check performed on each call.
    #[serde(default)]
    pub mode: AuthModeSetting,

    /// Expected application key; also sent by the gateway's client.
    #[serde(default = "default_app_key")]
    pub app_key: String,

    /// Expected application secret.
    #[serde(default = "default_app_secret")]
    pub app_secret: String,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            mode: AuthModeSetting::default(),
            app_key: default_app_key(),
            app_secret: default_app_secret(),
        }
    }
}

impl std::fmt::Debug for AuthSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSection")
            .field("mode", &self.mode)
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}

fn default_app_key() -> String {
    "janus".to_string()
}

fn default_app_secret() -> String {
    "janus-secret".to_string()
}

/// The gateway's loopback RPC client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    /// Deadline given to gateway calls that arrive without one.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,

    /// Total attempts per call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay between attempts; attempt `n` waits `n` times this.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

fn default_call_timeout() -> u64 {
    5_000
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_backoff() -> u64 {
    50
}

/// Documentation pass-through routes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DocsSection {
    /// Whether `/swagger-ui/` and `/swagger/` are mounted.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory served at `/swagger-ui/`.
    #[serde(default = "default_swagger_ui_dir")]
    pub swagger_ui_dir: String,

    /// Directory holding `*.swagger.json`, served at `/swagger/`.
    #[serde(default = "default_swagger_json_dir")]
    pub swagger_json_dir: String,
}

impl Default for DocsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            swagger_ui_dir: default_swagger_ui_dir(),
            swagger_json_dir: default_swagger_json_dir(),
        }
    }
}

fn default_swagger_ui_dir() -> String {
    "third_party/swagger-ui".to_string()
}

fn default_swagger_json_dir() -> String {
    "proto".to_string()
}

/// Article store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// Titles inserted at startup, in order.
    #[serde(default)]
    pub seed: Vec<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable.
    #[default]
    Pretty,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Span export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TracingSection {
    /// Export spans over OTLP.
    #[serde(default)]
    pub enabled: bool,

    /// Collector endpoint.
    #[serde(default = "default_otlp_endpoint")]
    pub otlp_endpoint: String,

    /// Fraction of root traces sampled, `0.0..=1.0`.
    #[serde(default = "default_sample_ratio")]
    pub sample_ratio: f64,
}

impl Default for TracingSection {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: default_otlp_endpoint(),
            sample_ratio: default_sample_ratio(),
        }
    }
}

fn default_otlp_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_sample_ratio() -> f64 {
    1.0
}

/// Prometheus metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Install the recorder and serve `GET /metrics`.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Observability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// `service.name` reported with spans.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Span export.
    #[serde(default)]
    pub tracing: TracingSection,

    /// Metrics.
    #[serde(default)]
    pub metrics: MetricsSection,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            logging: LoggingSection::default(),
            tracing: TracingSection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

fn default_service_name() -> String {
    "janus".to_string()
}

fn default_true() -> bool {
    true
}
