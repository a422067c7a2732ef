//! The root configuration type.

use serde::{Deserialize, Serialize};

use crate::{
    AuthModeSetting, AuthSection, ConfigError, DocsSection, GatewaySection, LogFormat,
    ServerSection, StoreSection, TelemetrySection,
};

/// Length of the HTTP/2 connection preface; classifying a connection needs
/// at least this many bytes.
pub const MIN_SNIFF_BYTES: usize = 24;

/// Complete Janus configuration.
///
/// Load it with [`ConfigLoader`](crate::ConfigLoader).
///
/// ```
/// use janus_config::JanusConfig;
///
/// let config = JanusConfig::default();
/// assert_eq!(config.server.addr, "0.0.0.0:8004");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct JanusConfig {
    /// Listener and serving behavior.
    #[serde(default)]
    pub server: ServerSection,

    /// Call authentication.
    #[serde(default)]
    pub auth: AuthSection,

    /// Gateway client behavior.
    #[serde(default)]
    pub gateway: GatewaySection,

    /// Documentation routes.
    #[serde(default)]
    pub docs: DocsSection,

    /// Article store.
    #[serde(default)]
    pub store: StoreSection,

    /// Logging, tracing and metrics.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl JanusConfig {
    /// Checks cross-field constraints the schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let server = &self.server;
        if server.addr.trim().is_empty() {
            return Err(ConfigError::invalid_value("server.addr", "must not be empty"));
        }
        for (field, value) in [
            ("server.shutdown_timeout_secs", server.shutdown_timeout_secs),
            ("server.request_timeout_ms", server.request_timeout_ms),
            ("server.sniff_timeout_ms", server.sniff_timeout_ms),
            ("gateway.call_timeout_ms", self.gateway.call_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid_value(field, "must be greater than zero"));
            }
        }
        if server.max_sniff_bytes < MIN_SNIFF_BYTES {
            return Err(ConfigError::invalid_value(
                "server.max_sniff_bytes",
                format!("must be at least {MIN_SNIFF_BYTES}"),
            ));
        }

        if self.auth.mode == AuthModeSetting::Credentials
            && (self.auth.app_key.is_empty() || self.auth.app_secret.is_empty())
        {
            return Err(ConfigError::invalid_value(
                "auth",
                "app_key and app_secret are required in credentials mode",
            ));
        }

        if self.gateway.max_attempts == 0 {
            return Err(ConfigError::invalid_value(
                "gateway.max_attempts",
                "must be at least 1",
            ));
        }

        if !(0.0..=1.0).contains(&self.telemetry.tracing.sample_ratio) {
            return Err(ConfigError::invalid_value(
                "telemetry.tracing.sample_ratio",
                "must be between 0.0 and 1.0",
            ));
        }

        Ok(())
    }

    /// Local development preset: pretty debug logs, metadata-only auth.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.auth.mode = AuthModeSetting::Metadata;
        config
    }

    /// Production preset: JSON logs at info, credentials auth.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config.auth.mode = AuthModeSetting::Credentials;
        config
    }

    /// Telemetry settings in the form `janus_telemetry` consumes.
    pub fn telemetry_config(&self) -> janus_telemetry::TelemetryConfig {
        let section = &self.telemetry;
        let logging = janus_telemetry::LogConfig {
            level: section.logging.level.clone(),
            json_format: section.logging.format == LogFormat::Json,
            ..janus_telemetry::LogConfig::default()
        };
        let tracing = janus_telemetry::TracingConfig {
            enabled: section.tracing.enabled,
            otlp_endpoint: section.tracing.otlp_endpoint.clone(),
            sample_ratio: section.tracing.sample_ratio,
            ..janus_telemetry::TracingConfig::default()
        };
        let metrics = janus_telemetry::MetricsConfig {
            enabled: section.metrics.enabled,
            ..janus_telemetry::MetricsConfig::default()
        };
        janus_telemetry::TelemetryConfig::builder()
            .service_name(&section.service_name)
            .logging(logging)
            .tracing(tracing)
            .metrics(metrics)
            .build()
    }
}
