//! Structured error model.
//!
//! A [`Status`] is the single error shape shared by the RPC transport, the
//! interceptor chain and the REST gateway: a [`Code`], a human message, and
//! an ordered list of typed [`Detail`] records.
//!
//! On the RPC wire a status travels as a `tonic::Status`; its details are
//! encoded as a `google.rpc.Status` message in the `grpc-status-details-bin`
//! trailer, so [`Status::to_wire`] and [`Status::from_wire`] round-trip the
//! code, the message, and every detail record.
//!
//! Application code ships domain error codes through the generic channel by
//! attaching an [`ErrorDetail`]; the gateway prefers that record over the
//! outer code when it builds the HTTP response.

use bytes::Bytes;
use prost::Message;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Type URL of the application-defined [`ErrorDetail`] record.
pub const ERROR_DETAIL_TYPE_URL: &str = "type.googleapis.com/proto.Error";

/// Canonical RPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum Code {
    /// Not an error.
    Ok = 0,
    /// The operation was cancelled, typically by the caller.
    Cancelled = 1,
    /// Unknown error.
    Unknown = 2,
    /// The client specified an invalid argument.
    InvalidArgument = 3,
    /// The deadline expired before the operation could complete.
    DeadlineExceeded = 4,
    /// Some requested entity was not found.
    NotFound = 5,
    /// The entity a client attempted to create already exists.
    AlreadyExists = 6,
    /// The caller does not have permission to execute the operation.
    PermissionDenied = 7,
    /// Some resource has been exhausted.
    ResourceExhausted = 8,
    /// The system is not in a state required for the operation.
    FailedPrecondition = 9,
    /// The operation was aborted.
    Aborted = 10,
    /// The operation was attempted past the valid range.
    OutOfRange = 11,
    /// The operation is not implemented or supported.
    Unimplemented = 12,
    /// Internal error.
    Internal = 13,
    /// The service is currently unavailable.
    Unavailable = 14,
    /// Unrecoverable data loss or corruption.
    DataLoss = 15,
    /// The request does not have valid authentication credentials.
    Unauthenticated = 16,
}

impl Code {
    /// Every code, ordered by numeric value.
    pub const ALL: [Code; 17] = [
        Code::Ok,
        Code::Cancelled,
        Code::Unknown,
        Code::InvalidArgument,
        Code::DeadlineExceeded,
        Code::NotFound,
        Code::AlreadyExists,
        Code::PermissionDenied,
        Code::ResourceExhausted,
        Code::FailedPrecondition,
        Code::Aborted,
        Code::OutOfRange,
        Code::Unimplemented,
        Code::Internal,
        Code::Unavailable,
        Code::DataLoss,
        Code::Unauthenticated,
    ];

    /// Maps a numeric code to a `Code`; values outside the canonical range
    /// become [`Code::Unknown`].
    pub fn from_i32(value: i32) -> Self {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .unwrap_or(Self::Unknown)
    }

    /// Returns `true` if `value` is one of the canonical numeric codes.
    pub fn is_canonical(value: i32) -> bool {
        (0..=16).contains(&value)
    }

    /// Numeric value of the code.
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Short human description, used when a status has no message.
    pub const fn description(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Cancelled => "the operation was cancelled",
            Self::Unknown => "unknown error",
            Self::InvalidArgument => "client specified an invalid argument",
            Self::DeadlineExceeded => "deadline expired before operation could complete",
            Self::NotFound => "some requested entity was not found",
            Self::AlreadyExists => "some entity that we attempted to create already exists",
            Self::PermissionDenied => {
                "the caller does not have permission to execute the specified operation"
            }
            Self::ResourceExhausted => "some resource has been exhausted",
            Self::FailedPrecondition => {
                "the system is not in a state required for the operation's execution"
            }
            Self::Aborted => "the operation was aborted",
            Self::OutOfRange => "operation was attempted past the valid range",
            Self::Unimplemented => "operation is not implemented or not supported",
            Self::Internal => "internal error",
            Self::Unavailable => "the service is currently unavailable",
            Self::DataLoss => "unrecoverable data loss or corruption",
            Self::Unauthenticated => "the request does not have valid authentication credentials",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<tonic::Code> for Code {
    fn from(code: tonic::Code) -> Self {
        Self::from_i32(code as i32)
    }
}

impl From<Code> for tonic::Code {
    fn from(code: Code) -> Self {
        tonic::Code::from_i32(code.as_i32())
    }
}

/// Application-defined error record (`proto.Error`).
#[derive(Clone, PartialEq, Eq, Message, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Domain error code.
    #[prost(int32, tag = "1")]
    pub code: i32,
    /// Domain error message.
    #[prost(string, tag = "2")]
    pub message: String,
}

impl ErrorDetail {
    /// Creates a detail record.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A detail record of a type this crate does not interpret
/// (`google.protobuf.Any`).
#[derive(Clone, PartialEq, Eq, Message)]
pub struct AnyDetail {
    /// Fully qualified type URL of the packed message.
    #[prost(string, tag = "1")]
    pub type_url: String,
    /// Encoded message bytes.
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

/// `google.rpc.Status`, the payload of `grpc-status-details-bin`.
#[derive(Clone, PartialEq, Message)]
struct RpcStatus {
    #[prost(int32, tag = "1")]
    code: i32,
    #[prost(string, tag = "2")]
    message: String,
    #[prost(message, repeated, tag = "3")]
    details: Vec<AnyDetail>,
}

/// One typed record in a status' detail list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detail {
    /// Application-defined `{code, message}` record.
    Error(ErrorDetail),
    /// Any other record, carried opaquely.
    Other(AnyDetail),
}

impl Detail {
    fn to_any(&self) -> AnyDetail {
        match self {
            Self::Error(detail) => AnyDetail {
                type_url: ERROR_DETAIL_TYPE_URL.to_string(),
                value: detail.encode_to_vec(),
            },
            Self::Other(any) => any.clone(),
        }
    }

    fn from_any(any: AnyDetail) -> Self {
        if any.type_url == ERROR_DETAIL_TYPE_URL {
            if let Ok(detail) = ErrorDetail::decode(any.value.as_slice()) {
                return Self::Error(detail);
            }
        }
        Self::Other(any)
    }
}

impl From<ErrorDetail> for Detail {
    fn from(detail: ErrorDetail) -> Self {
        Self::Error(detail)
    }
}

/// Structured call error.
///
/// The message is never empty unless the code is [`Code::Ok`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct Status {
    code: Code,
    message: String,
    details: Vec<Detail>,
}

impl Status {
    /// Creates a status. An empty message is replaced by the code's
    /// description.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.is_empty() && code != Code::Ok {
            message = code.description().to_string();
        }
        Self {
            code,
            message,
            details: Vec::new(),
        }
    }

    /// `Cancelled` status.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(Code::Cancelled, message)
    }

    /// `Unknown` status.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(Code::Unknown, message)
    }

    /// `InvalidArgument` status.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    /// `DeadlineExceeded` status.
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(Code::DeadlineExceeded, message)
    }

    /// `NotFound` status.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    /// `PermissionDenied` status.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(Code::PermissionDenied, message)
    }

    /// `Unimplemented` status.
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }

    /// `Internal` status.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    /// `Unavailable` status.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    /// `Unauthenticated` status.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(Code::Unauthenticated, message)
    }

    /// Appends a detail record.
    pub fn with_detail(mut self, detail: impl Into<Detail>) -> Self {
        self.details.push(detail.into());
        self
    }

    /// The status code.
    pub fn code(&self) -> Code {
        self.code
    }

    /// The human message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Detail records in order.
    pub fn details(&self) -> &[Detail] {
        &self.details
    }

    /// The first application-defined error record, if any.
    pub fn error_detail(&self) -> Option<&ErrorDetail> {
        self.details.iter().find_map(|detail| match detail {
            Detail::Error(record) => Some(record),
            Detail::Other(_) => None,
        })
    }

    /// Extracts a status from any error.
    ///
    /// The error and its `source()` chain are searched for a [`Status`] or a
    /// `tonic::Status`; if none is found the result is [`Code::Unknown`] with
    /// the error's display text.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        let mut current = Some(err);
        while let Some(candidate) = current {
            if let Some(status) = candidate.downcast_ref::<Status>() {
                return status.clone();
            }
            if let Some(status) = candidate.downcast_ref::<tonic::Status>() {
                return Self::from_wire(status);
            }
            current = candidate.source();
        }
        Self::unknown(err.to_string())
    }

    /// Converts to the RPC wire error.
    pub fn to_wire(&self) -> tonic::Status {
        let code = tonic::Code::from(self.code);
        if self.details.is_empty() {
            return tonic::Status::new(code, self.message.clone());
        }
        let encoded = RpcStatus {
            code: self.code.as_i32(),
            message: self.message.clone(),
            details: self.details.iter().map(Detail::to_any).collect(),
        }
        .encode_to_vec();
        tonic::Status::with_details(code, self.message.clone(), Bytes::from(encoded))
    }

    /// Reads a status from the RPC wire error.
    ///
    /// Malformed detail payloads are dropped; the code and message are kept.
    pub fn from_wire(status: &tonic::Status) -> Self {
        let details = if status.details().is_empty() {
            Vec::new()
        } else {
            match RpcStatus::decode(status.details()) {
                Ok(decoded) => decoded.details.into_iter().map(Detail::from_any).collect(),
                Err(err) => {
                    tracing::debug!(error = %err, "discarding undecodable status details");
                    Vec::new()
                }
            }
        };
        Self {
            details,
            ..Self::new(Code::from(status.code()), status.message())
        }
    }
}

impl From<tonic::Status> for Status {
    fn from(status: tonic::Status) -> Self {
        Self::from_wire(&status)
    }
}

impl From<Status> for tonic::Status {
    fn from(status: Status) -> Self {
        status.to_wire()
    }
}
