//! Server configuration.
//!
//! ```rust
//! use janus_server::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::builder()
//!     .addr("127.0.0.1:8004")
//!     .shutdown_timeout(Duration::from_secs(10))
//!     .build();
//!
//! assert_eq!(config.addr(), "127.0.0.1:8004");
//! ```

use crate::error::ServerError;
use std::net::SocketAddr;
use std::time::Duration;

/// Default listening address.
pub const DEFAULT_ADDR: &str = "0.0.0.0:8004";

/// Default graceful shutdown period in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default time allowed to receive an HTTP request body, in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Default time allowed to classify a new connection, in milliseconds.
pub const DEFAULT_SNIFF_TIMEOUT_MS: u64 = 5_000;

/// Default cap on bytes read while classifying a connection.
pub const DEFAULT_MAX_SNIFF_BYTES: usize = 4096;

/// Default number of consecutive accept errors tolerated.
pub const DEFAULT_MAX_ACCEPT_ERRORS: u32 = 16;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    addr: String,
    shutdown_timeout: Duration,
    request_timeout: Duration,
    sniff_timeout: Duration,
    max_sniff_bytes: usize,
    max_accept_errors: u32,
    keep_alive: bool,
}

impl ServerConfig {
    /// Creates a builder with default values.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Listening address as configured.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Parses the listening address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        self.addr.parse().map_err(|source| ServerError::InvalidAddress {
            addr: self.addr.clone(),
            source,
        })
    }

    /// Grace period for in-flight work at shutdown.
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Time allowed to receive an HTTP request body.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Time allowed to classify a new connection.
    pub fn sniff_timeout(&self) -> Duration {
        self.sniff_timeout
    }

    /// Cap on bytes read while classifying a connection.
    pub fn max_sniff_bytes(&self) -> usize {
        self.max_sniff_bytes
    }

    /// Consecutive accept errors tolerated before the server stops.
    pub fn max_accept_errors(&self) -> u32 {
        self.max_accept_errors
    }

    /// Whether HTTP/1.1 connections are kept alive between requests.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self {
            config: ServerConfig {
                addr: DEFAULT_ADDR.to_string(),
                shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
                request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
                sniff_timeout: Duration::from_millis(DEFAULT_SNIFF_TIMEOUT_MS),
                max_sniff_bytes: DEFAULT_MAX_SNIFF_BYTES,
                max_accept_errors: DEFAULT_MAX_ACCEPT_ERRORS,
                keep_alive: true,
            },
        }
    }
}

impl ServerConfigBuilder {
    /// Sets the listening address, e.g. `"127.0.0.1:0"`.
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    /// Sets the graceful shutdown period.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Sets the HTTP request body timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Sets the connection classification timeout.
    pub fn sniff_timeout(mut self, timeout: Duration) -> Self {
        self.config.sniff_timeout = timeout;
        self
    }

    /// Sets the classification byte cap.
    pub fn max_sniff_bytes(mut self, bytes: usize) -> Self {
        self.config.max_sniff_bytes = bytes;
        self
    }

    /// Sets the consecutive accept error threshold.
    pub fn max_accept_errors(mut self, errors: u32) -> Self {
        self.config.max_accept_errors = errors;
        self
    }

    /// Enables or disables HTTP/1.1 keep-alive.
    pub fn keep_alive(mut self, enabled: bool) -> Self {
        self.config.keep_alive = enabled;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:8004");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.sniff_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_sniff_bytes(), 4096);
        assert_eq!(config.max_accept_errors(), 16);
        assert!(config.keep_alive());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ServerConfig::builder()
            .addr("127.0.0.1:0")
            .sniff_timeout(Duration::from_millis(200))
            .max_sniff_bytes(64)
            .keep_alive(false)
            .build();
        let addr = tokio_test::assert_ok!(config.socket_addr());
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(config.sniff_timeout(), Duration::from_millis(200));
        assert_eq!(config.max_sniff_bytes(), 64);
        assert!(!config.keep_alive());
    }

    #[test]
    fn test_invalid_addr() {
        let config = ServerConfig::builder().addr("not-an-addr").build();
        assert!(matches!(
            config.socket_addr(),
            Err(ServerError::InvalidAddress { .. })
        ));
    }
}
