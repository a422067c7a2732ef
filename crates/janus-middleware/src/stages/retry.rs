//! Client-side retry.
//!
//! Re-runs the rest of the chain when it fails with a retryable code.
//! Attempts are spaced by a linear backoff and never scheduled past the
//! call deadline.

use crate::interceptor::{BoxFuture, CallResult, Interceptor, Next};
use crate::payload::Payload;
use janus_core::{CallContext, Code, Status};
use std::time::Duration;

/// Codes retried by default.
pub const DEFAULT_RETRYABLE: [Code; 3] = [Code::Unknown, Code::Internal, Code::DeadlineExceeded];

/// Retry stage.
#[derive(Debug, Clone)]
pub struct RetryInterceptor {
    max_attempts: u32,
    backoff: Duration,
    retryable: Vec<Code>,
}

impl Default for RetryInterceptor {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_millis(50),
            retryable: DEFAULT_RETRYABLE.to_vec(),
        }
    }
}

impl RetryInterceptor {
    /// Two attempts, 50 ms backoff, default retryable codes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total attempts including the first; values below one mean one.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Base backoff; attempt `n` waits `n * backoff` before the next one.
    #[must_use]
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replaces the retryable codes.
    #[must_use]
    pub fn retry_on(mut self, codes: impl IntoIterator<Item = Code>) -> Self {
        self.retryable = codes.into_iter().collect();
        self
    }
}

impl Interceptor for RetryInterceptor {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        request: Payload,
        next: Next<'a>,
    ) -> BoxFuture<'a, CallResult> {
        Box::pin(async move {
            let mut attempt = 1;
            loop {
                let err = match next.run(ctx, request.clone()).await {
                    Ok(response) => return Ok(response),
                    Err(err) => err,
                };
                let code = Status::from_error(err.as_ref()).code();
                if attempt >= self.max_attempts || !self.retryable.contains(&code) {
                    return Err(err);
                }
                let wait = self.backoff * attempt;
                if ctx.remaining().is_some_and(|left| left <= wait) {
                    return Err(err);
                }
                tracing::debug!(method = %ctx.method(), attempt, code = %code, "retrying call");
                janus_telemetry::metrics::record_client_retry(ctx.method());
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        })
    }
}
