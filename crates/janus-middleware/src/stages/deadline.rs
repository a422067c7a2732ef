//! Deadline enforcement.
//!
//! Races the rest of the chain against the call deadline. When the
//! deadline passes first the inner future is dropped, which cancels any
//! store I/O or nested call it was awaiting, and the call fails with
//! `DeadlineExceeded`.

use crate::interceptor::{BoxFuture, CallResult, Interceptor, Next};
use crate::payload::Payload;
use janus_core::{CallContext, Status};
use std::time::Duration;

/// Deadline stage.
#[derive(Debug, Clone, Default)]
pub struct DeadlineInterceptor {
    default_timeout: Option<Duration>,
}

impl DeadlineInterceptor {
    /// Enforces caller-supplied deadlines only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `timeout` to calls that arrive without a deadline.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }
}

impl Interceptor for DeadlineInterceptor {
    fn name(&self) -> &'static str {
        "deadline"
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        request: Payload,
        next: Next<'a>,
    ) -> BoxFuture<'a, CallResult> {
        Box::pin(async move {
            if ctx.deadline().is_none() {
                if let Some(timeout) = self.default_timeout {
                    ctx.set_timeout(timeout);
                }
            }
            let Some(deadline) = ctx.deadline() else {
                return next.run(ctx, request).await;
            };
            if ctx.is_expired() {
                return Err(Status::deadline_exceeded("deadline exceeded before call started").into());
            }
            match tokio::time::timeout_at(deadline, next.run(ctx, request)).await {
                Ok(result) => result,
                Err(_) => Err(Status::deadline_exceeded("deadline exceeded").into()),
            }
        })
    }
}
