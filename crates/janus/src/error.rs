//! Application error types.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for application lifecycle operations.
pub type AppResult<T> = Result<T, AppError>;

/// Failures while starting or running the article server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] janus_config::ConfigError),

    /// The store could not be prepared or closed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The server failed to bind or stopped with an error.
    #[error("server error: {0}")]
    Server(#[from] janus_server::ServerError),

    /// Telemetry could not be installed.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] janus_telemetry::TelemetryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_wraps_source() {
        let err = AppError::from(StoreError::NotMigrated);
        assert_eq!(
            err.to_string(),
            "store error: article table does not exist, run migrate first"
        );
    }
}
