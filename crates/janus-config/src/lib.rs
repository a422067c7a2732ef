//! Typed configuration for Janus.
//!
//! - TOML and JSON files, chosen by extension
//! - `PREFIX__SECTION__KEY` environment overrides and `.env` files
//! - strict schema: unknown fields are errors
//! - layered: defaults → files → environment
//!
//! # Example
//!
//! ```no_run
//! use janus_config::ConfigLoader;
//!
//! # fn main() -> Result<(), janus_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_file("janus.toml")?
//!     .with_env_prefix("JANUS")
//!     .load()?;
//!
//! println!("serving RPC and HTTP on {}", config.server.addr);
//! # Ok(())
//! # }
//! ```
//!
//! # File format
//!
//! ```toml
//! [server]
//! addr = "0.0.0.0:8004"
//! shutdown_timeout_secs = 30
//! request_timeout_ms = 30000
//! sniff_timeout_ms = 5000
//!
//! [auth]
//! mode = "credentials"   # disabled | metadata | credentials
//! app_key = "janus"
//! app_secret = "janus-secret"
//!
//! [gateway]
//! call_timeout_ms = 5000
//! max_attempts = 2
//!
//! [docs]
//! enabled = true
//! swagger_ui_dir = "third_party/swagger-ui"
//!
//! [store]
//! seed = ["first", "second", "third"]
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [telemetry.tracing]
//! enabled = false
//! otlp_endpoint = "http://localhost:4317"
//! ```
//!
//! # Environment overrides
//!
//! - `JANUS__SERVER__ADDR=127.0.0.1:9000`
//! - `JANUS__AUTH__MODE=metadata`
//! - `JANUS__TELEMETRY__LOGGING__LEVEL=debug`
//! - `JANUS__STORE__SEED=first,second,third`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{JanusConfig, MIN_SNIFF_BYTES};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
