//! Telemetry configuration.

use crate::logging::LogConfig;
use crate::metrics::MetricsConfig;
use crate::tracing::TracingConfig;

/// Combined configuration for logging, tracing and metrics.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Logging settings.
    pub logging: LogConfig,
    /// Tracing settings.
    pub tracing: TracingConfig,
    /// Metrics settings.
    pub metrics: MetricsConfig,
}

impl TelemetryConfig {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::default()
    }
}

/// Builder for [`TelemetryConfig`].
#[derive(Debug, Default)]
pub struct TelemetryConfigBuilder {
    config: TelemetryConfig,
}

impl TelemetryConfigBuilder {
    /// Sets the service name used by tracing.
    #[must_use]
    pub fn service_name(mut self, name: &str) -> Self {
        self.config.tracing.service_name = name.to_string();
        self
    }

    /// Replaces the logging settings.
    #[must_use]
    pub fn logging(mut self, logging: LogConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Replaces the tracing settings, keeping the service name if the new
    /// settings leave it at the default.
    #[must_use]
    pub fn tracing(mut self, tracing: TracingConfig) -> Self {
        let service_name = std::mem::take(&mut self.config.tracing.service_name);
        self.config.tracing = tracing;
        if self.config.tracing.service_name == TracingConfig::default().service_name {
            self.config.tracing.service_name = service_name;
        }
        self
    }

    /// Replaces the metrics settings.
    #[must_use]
    pub fn metrics(mut self, metrics: MetricsConfig) -> Self {
        self.config.metrics = metrics;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_service_name() {
        let config = TelemetryConfig::builder()
            .service_name("article-service")
            .tracing(TracingConfig {
                enabled: true,
                ..TracingConfig::default()
            })
            .build();

        assert!(config.tracing.enabled);
        assert_eq!(config.tracing.service_name, "article-service");
    }

    #[test]
    fn test_explicit_tracing_service_name_wins() {
        let config = TelemetryConfig::builder()
            .service_name("ignored")
            .tracing(TracingConfig {
                service_name: "explicit".to_string(),
                ..TracingConfig::default()
            })
            .build();
        assert_eq!(config.tracing.service_name, "explicit");
    }
}
