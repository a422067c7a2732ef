//! Layered configuration loading.
//!
//! Layers apply in call order, later ones overriding earlier ones key by
//! key: defaults or a preset, then files or strings, then environment
//! variables. Only the keys a layer actually writes replace earlier values.

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::{AuthModeSetting, ConfigError, JanusConfig, LogFormat};

/// Builds a [`JanusConfig`] from layered sources.
///
/// ```no_run
/// use janus_config::ConfigLoader;
///
/// # fn main() -> Result<(), janus_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_optional_file("janus.toml")?
///     .with_dotenv()?
///     .with_env_prefix("JANUS")
///     .load()?;
/// println!("listening on {}", config.server.addr);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    layered: Value,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader holding the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            layered: Value::Object(Map::new()),
            env_prefix: None,
        }
    }

    /// Resets to the default configuration.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.layered = Value::Object(Map::new());
        self
    }

    /// Resets to [`JanusConfig::development`].
    ///
    /// ```
    /// use janus_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(self) -> Self {
        self.with_preset(&JanusConfig::development())
    }

    /// Resets to [`JanusConfig::production`].
    #[must_use]
    pub fn with_production(self) -> Self {
        self.with_preset(&JanusConfig::production())
    }

    fn with_preset(mut self, preset: &JanusConfig) -> Self {
        self.layered = serde_json::to_value(preset).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "preset not representable, using defaults");
            Value::Object(Map::new())
        });
        self
    }

    /// Layers a TOML (`.toml`) or JSON (`.json`) file.
    ///
    /// Unknown fields and type errors are reported here, not at
    /// [`load`](Self::load).
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
        self.with_string(&content, &format)
    }

    /// Layers a file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Layers configuration text in `format` (`"toml"` or `"json"`).
    ///
    /// ```
    /// use janus_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[server]\naddr = \"127.0.0.1:9000\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert_eq!(config.server.addr, "127.0.0.1:9000");
    /// assert_eq!(config.server.max_sniff_bytes, 4096);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer: Value = match format.to_lowercase().as_str() {
            "toml" => {
                toml::from_str::<JanusConfig>(content)?;
                toml::from_str(content)?
            }
            "json" => {
                serde_json::from_str::<JanusConfig>(content)?;
                serde_json::from_str(content)?
            }
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        merge(&mut self.layered, layer);
        Ok(self)
    }

    /// Enables `PREFIX__SECTION__KEY` environment overrides at load time.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads a `.env` file from the working directory into the process
    /// environment. A missing file is not an error.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
            Err(err) if err.not_found() => {}
            Err(err) => return Err(err.into()),
        }
        Ok(self)
    }

    /// Applies environment overrides and returns the validated result.
    pub fn load(self) -> Result<JanusConfig, ConfigError> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load) without [`JanusConfig::validate`].
    pub fn load_unvalidated(mut self) -> Result<JanusConfig, ConfigError> {
        let mut config: JanusConfig = serde_json::from_value(self.layered)?;
        if let Some(prefix) = self.env_prefix.take() {
            let marker = format!("{prefix}__");
            for (key, value) in env::vars().filter(|(key, _)| key.starts_with(&marker)) {
                apply_env_var(&mut config, &key, &value, &prefix)?;
            }
        }
        Ok(config)
    }
}

/// Recursively overlays `layer` onto `base`; tables merge, everything else
/// replaces.
fn merge(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}

fn apply_env_var(
    config: &mut JanusConfig,
    key: &str,
    value: &str,
    prefix: &str,
) -> Result<(), ConfigError> {
    let path = key
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix("__"))
        .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;
    let parts: Vec<&str> = path.split("__").collect();

    match parts.as_slice() {
        ["SERVER", "ADDR"] => config.server.addr = value.to_string(),
        ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
            config.server.shutdown_timeout_secs = parse_number(key, value)?;
        }
        ["SERVER", "REQUEST_TIMEOUT_MS"] => {
            config.server.request_timeout_ms = parse_number(key, value)?;
        }
        ["SERVER", "SNIFF_TIMEOUT_MS"] => config.server.sniff_timeout_ms = parse_number(key, value)?,
        ["SERVER", "MAX_SNIFF_BYTES"] => config.server.max_sniff_bytes = parse_number(key, value)?,
        ["SERVER", "MAX_ACCEPT_ERRORS"] => {
            config.server.max_accept_errors = parse_number(key, value)?;
        }
        ["SERVER", "KEEP_ALIVE"] => config.server.keep_alive = parse_flag(key, value)?,

        ["AUTH", "MODE"] => {
            config.auth.mode = match value.to_lowercase().as_str() {
                "disabled" => AuthModeSetting::Disabled,
                "metadata" => AuthModeSetting::Metadata,
                "credentials" => AuthModeSetting::Credentials,
                _ => {
                    return Err(ConfigError::env_parse_error(
                        key,
                        "expected 'disabled', 'metadata', or 'credentials'",
                    ))
                }
            };
        }
        ["AUTH", "APP_KEY"] => config.auth.app_key = value.to_string(),
        ["AUTH", "APP_SECRET"] => config.auth.app_secret = value.to_string(),

        ["GATEWAY", "CALL_TIMEOUT_MS"] => config.gateway.call_timeout_ms = parse_number(key, value)?,
        ["GATEWAY", "MAX_ATTEMPTS"] => config.gateway.max_attempts = parse_number(key, value)?,
        ["GATEWAY", "RETRY_BACKOFF_MS"] => {
            config.gateway.retry_backoff_ms = parse_number(key, value)?;
        }

        ["DOCS", "ENABLED"] => config.docs.enabled = parse_flag(key, value)?,
        ["DOCS", "SWAGGER_UI_DIR"] => config.docs.swagger_ui_dir = value.to_string(),
        ["DOCS", "SWAGGER_JSON_DIR"] => config.docs.swagger_json_dir = value.to_string(),

        ["STORE", "SEED"] => {
            config.store.seed = value
                .split(',')
                .map(str::trim)
                .filter(|title| !title.is_empty())
                .map(str::to_string)
                .collect();
        }

        ["TELEMETRY", "SERVICE_NAME"] => config.telemetry.service_name = value.to_string(),
        ["TELEMETRY", "LOGGING", "LEVEL"] => config.telemetry.logging.level = value.to_string(),
        ["TELEMETRY", "LOGGING", "FORMAT"] => {
            config.telemetry.logging.format = match value.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                _ => return Err(ConfigError::env_parse_error(key, "expected 'json' or 'pretty'")),
            };
        }
        ["TELEMETRY", "TRACING", "ENABLED"] => {
            config.telemetry.tracing.enabled = parse_flag(key, value)?;
        }
        ["TELEMETRY", "TRACING", "OTLP_ENDPOINT"] => {
            config.telemetry.tracing.otlp_endpoint = value.to_string();
        }
        ["TELEMETRY", "TRACING", "SAMPLE_RATIO"] => {
            config.telemetry.tracing.sample_ratio = parse_number(key, value)?;
        }
        ["TELEMETRY", "METRICS", "ENABLED"] => {
            config.telemetry.metrics.enabled = parse_flag(key, value)?;
        }

        _ => tracing::warn!(var = key, "ignoring unknown configuration variable"),
    }

    Ok(())
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, format!("expected a number, got {value:?}")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
