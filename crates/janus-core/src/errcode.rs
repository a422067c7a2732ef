//! Application-defined error codes.
//!
//! An [`ErrorCode`] pairs a domain code and message with the RPC [`Code`]
//! used on the transport. [`ErrorCode::to_status`] packs the domain pair
//! into an [`ErrorDetail`] so REST clients see the domain values while RPC
//! clients get a canonical code.
//!
//! Codes are eight digits: the first three identify the service (`100` is
//! shared), the remaining five the error within it.

use crate::status::{Code, ErrorDetail, Status};
use std::fmt;

/// A domain error code bound to an RPC status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode {
    code: i32,
    message: &'static str,
    rpc_code: Code,
}

impl ErrorCode {
    /// Defines a code.
    pub const fn new(code: i32, message: &'static str, rpc_code: Code) -> Self {
        Self {
            code,
            message,
            rpc_code,
        }
    }

    /// The domain code.
    pub const fn code(&self) -> i32 {
        self.code
    }

    /// The domain message.
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// The RPC code used on the transport.
    pub const fn rpc_code(&self) -> Code {
        self.rpc_code
    }

    /// Builds a status carrying this code as an [`ErrorDetail`].
    pub fn to_status(&self) -> Status {
        Status::new(self.rpc_code, self.message)
            .with_detail(ErrorDetail::new(self.code, self.message))
    }

    /// Like [`to_status`](Self::to_status) with a more specific outer message.
    ///
    /// The detail keeps the registered domain message.
    pub fn to_status_with(&self, message: impl Into<String>) -> Status {
        Status::new(self.rpc_code, message).with_detail(ErrorDetail::new(self.code, self.message))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message)
    }
}

impl From<ErrorCode> for Status {
    fn from(code: ErrorCode) -> Self {
        code.to_status()
    }
}

/// Success.
pub const SUCCESS: ErrorCode = ErrorCode::new(0, "成功", Code::Ok);
/// Unclassified server failure.
pub const SERVER_ERROR: ErrorCode = ErrorCode::new(10_000_000, "服务内部错误", Code::Internal);
/// Request parameters failed validation.
pub const INVALID_PARAMS: ErrorCode =
    ErrorCode::new(10_000_001, "入参错误", Code::InvalidArgument);
/// Requested entity does not exist.
pub const NOT_FOUND: ErrorCode = ErrorCode::new(10_000_002, "找不到", Code::NotFound);
/// Credentials absent.
pub const UNAUTHORIZED_AUTH_NOT_EXIST: ErrorCode = ErrorCode::new(
    10_000_003,
    "鉴权失败，找不到对应的 AppKey 和 AppSecret",
    Code::Unauthenticated,
);
/// Credentials present but wrong.
pub const UNAUTHORIZED_TOKEN_ERROR: ErrorCode =
    ErrorCode::new(10_000_004, "鉴权失败，Token 错误", Code::Unauthenticated);
/// Credentials expired.
pub const UNAUTHORIZED_TOKEN_TIMEOUT: ErrorCode =
    ErrorCode::new(10_000_005, "鉴权失败，Token 超时", Code::Unauthenticated);
/// Rate limited.
pub const TOO_MANY_REQUESTS: ErrorCode =
    ErrorCode::new(10_000_007, "请求过多", Code::ResourceExhausted);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Detail;

    #[test]
    fn test_to_status_attaches_detail() {
        let status = INVALID_PARAMS.to_status();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(
            status.details(),
            [Detail::Error(ErrorDetail::new(10_000_001, "入参错误"))]
        );
    }

    #[test]
    fn test_to_status_with_keeps_domain_message() {
        let status = UNAUTHORIZED_TOKEN_ERROR.to_status_with("app_secret mismatch");
        assert_eq!(status.message(), "app_secret mismatch");
        assert_eq!(
            status.error_detail().map(|d| d.message.as_str()),
            Some(UNAUTHORIZED_TOKEN_ERROR.message())
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(NOT_FOUND.to_string(), "10000002 找不到");
    }
}
