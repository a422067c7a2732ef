//! Error normalization.
//!
//! Any error coming back from the continuation is converted to a
//! [`Status`] and logged with its code, message and details. Stages outside
//! this one, and the transport, always see a `Status`.

use crate::interceptor::{BoxFuture, CallResult, Interceptor, Next};
use crate::payload::Payload;
use janus_core::{CallContext, Code, Status};

/// Error-normalization stage.
#[derive(Debug, Clone, Default)]
pub struct ErrorInterceptor {
    _private: (),
}

impl ErrorInterceptor {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Interceptor for ErrorInterceptor {
    fn name(&self) -> &'static str {
        "error"
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        request: Payload,
        next: Next<'a>,
    ) -> BoxFuture<'a, CallResult> {
        Box::pin(async move {
            let err = match next.run(ctx, request).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            let status = Status::from_error(err.as_ref());
            if matches!(
                status.code(),
                Code::Internal | Code::Unknown | Code::DataLoss
            ) {
                tracing::error!(
                    method = %ctx.method(),
                    code = %status.code(),
                    status_message = status.message(),
                    details = ?status.details(),
                    source = %err,
                    "call failed"
                );
            } else {
                tracing::warn!(
                    method = %ctx.method(),
                    code = %status.code(),
                    status_message = status.message(),
                    details = ?status.details(),
                    "call failed"
                );
            }
            Err(status.into())
        })
    }
}
