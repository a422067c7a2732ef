//! # Janus
//!
//! An article listing service that answers binary RPC and REST/JSON on
//! the same TCP port.
//!
//! ```text
//!                      ┌──────────── one listener ────────────┐
//! HTTP/2 preface ──────► rpc sub-server ── server chain ── ArticleHandler ── ArticleStore
//! HTTP/1.x ────────────► http sub-server
//!                          └─ GET /v1/articles ── client chain ── loopback RPC ──┘
//! ```
//!
//! - [`proto`]: messages and tonic stubs for `proto.ArticleService`
//! - [`store`]: the [`ArticleStore`] collaborator and [`MemoryStore`]
//! - [`service`]: [`ArticleHandler`] and its RPC adapter
//! - [`client`]: the gateway's loopback client
//! - [`app`]: [`ArticleServer`], wiring all of the above

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod app;
pub mod client;
pub mod error;
pub mod proto;
pub mod service;
pub mod store;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{ArticleServer, BoundArticleServer, ARTICLES_PATH};
pub use client::ArticleGatewayClient;
pub use error::{AppError, AppResult};
pub use service::{ArticleHandler, ArticleRpc, ERROR_GET_ARTICLE_LIST_FAIL};
pub use store::{ArticleRecord, ArticleStore, MemoryStore, StoreError};
