//! Server error types.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from the connection multiplexer.
#[derive(Debug, Error)]
pub enum MuxError {
    /// A rule was registered after the catch-all rule.
    #[error("rule `{0}` registered after the catch-all rule")]
    RuleAfterCatchAll(&'static str),

    /// Two rules were registered under the same name.
    #[error("rule `{0}` registered twice")]
    DuplicateRule(&'static str),

    /// The accept loop hit too many consecutive errors.
    #[error("accept failed {count} times in a row: {source}")]
    AcceptFailed {
        /// Consecutive failures.
        count: u32,
        /// Last error.
        #[source]
        source: io::Error,
    },
}

/// Errors from the server lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured address did not parse.
    #[error("invalid address `{addr}`: {source}")]
    InvalidAddress {
        /// Address as configured.
        addr: String,
        /// Parse failure.
        #[source]
        source: std::net::AddrParseError,
    },

    /// The base listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address being bound.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// I/O error while serving.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The multiplexer stopped with an error.
    #[error(transparent)]
    Mux(#[from] MuxError),

    /// The RPC sub-server failed.
    #[error("rpc server failed: {0}")]
    Rpc(#[from] tonic::transport::Error),

    /// A sub-server task panicked or was aborted.
    #[error("{name} sub-server task failed: {reason}")]
    Task {
        /// Sub-server name.
        name: &'static str,
        /// Join failure.
        reason: String,
    },
}
