//! # Janus Core
//!
//! Core types shared by every Janus crate.
//!
//! - [`Metadata`] - Ordered, case-insensitive multi-value call metadata
//! - [`Status`] / [`Code`] - Structured error model shared by RPC and REST
//! - [`ErrorCode`] - Application-defined error codes carried as status details
//! - [`CallContext`] - Per-call state flowing through the interceptor chain

#![doc(html_root_url = "https://docs.rs/janus-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
pub mod errcode;
pub mod metadata;
pub mod status;

pub use context::{parse_grpc_timeout, CallContext, CallId, GRPC_TIMEOUT_HEADER};
pub use errcode::ErrorCode;
pub use metadata::Metadata;
pub use status::{AnyDetail, Code, Detail, ErrorDetail, Status};

/// Boxed error type accepted anywhere inside a call.
///
/// Stages below the error-normalization stage may fail with any error; it is
/// converted to a [`Status`] with [`Status::from_error`] before it reaches a
/// transport.
pub type CallError = Box<dyn std::error::Error + Send + Sync>;
