//! # Janus Server
//!
//! One TCP endpoint serving binary RPC and HTTP side by side.
//!
//! - [`mux`]: classifies each connection by its opening bytes and feeds it
//!   to a sub-listener
//! - [`rpc`]: tonic over the `rpc` sub-listener
//! - [`http`]: hyper HTTP/1.1 over the `http` sub-listener, routed by
//!   [`HttpRouter`]
//! - [`static_files`]: documentation directory serving
//! - [`Server`]: binds, wires and runs the above; owns shutdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use janus_server::{HttpRouter, Server, ServerConfig};
//!
//! # async fn run() -> Result<(), janus_server::ServerError> {
//! let server = Server::builder()
//!     .config(ServerConfig::builder().addr("127.0.0.1:8004").build())
//!     .http(|_ctx| HttpRouter::new())
//!     .bind()
//!     .await?;
//! server.run().await
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/janus-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod http;
pub mod mux;
pub mod router;
pub mod rpc;
pub mod server;
pub mod shutdown;
pub mod static_files;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::{MuxError, ServerError};
pub use mux::{Acceptor, MatchOutcome, Matcher, Mux, MuxConfig, MuxStats, MuxedStream, SubListener};
pub use router::{HttpHandler, HttpRequest, HttpResponse, HttpRouter, MountedPath, RemoteAddr};
pub use server::{ServeContext, Server, ServerBuilder};
pub use shutdown::{ConnectionTracker, ShutdownSignal};
pub use static_files::{StaticFileError, StaticFiles};
