//! Client-side default timeout.

use super::deadline::DeadlineInterceptor;
use crate::interceptor::{BoxFuture, CallResult, Interceptor, Next};
use crate::payload::Payload;
use janus_core::CallContext;
use std::time::Duration;

/// Gives calls without a deadline a default one and enforces it.
///
/// A deadline already on the context is kept when it is earlier.
#[derive(Debug, Clone)]
pub struct TimeoutInterceptor {
    timeout: Duration,
    inner: DeadlineInterceptor,
}

impl TimeoutInterceptor {
    /// Creates the stage.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            inner: DeadlineInterceptor::new().with_default_timeout(timeout),
        }
    }

    /// The default timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Interceptor for TimeoutInterceptor {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        request: Payload,
        next: Next<'a>,
    ) -> BoxFuture<'a, CallResult> {
        self.inner.intercept(ctx, request, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InterceptorChain;
    use crate::interceptor::{handler_fn, UnaryHandler};
    use janus_core::{Code, Status};

    #[tokio::test(start_paused = true)]
    async fn test_times_out_slow_calls() {
        let handler = InterceptorChain::builder()
            .stage(TimeoutInterceptor::new(Duration::from_millis(20)))
            .build()
            .wrap(handler_fn(|request: Payload| async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(request)
            }));

        let mut ctx = CallContext::new("/a.B/C");
        let err = handler.call(&mut ctx, Payload::new(())).await.unwrap_err();
        assert_eq!(Status::from_error(err.as_ref()).code(), Code::DeadlineExceeded);
        assert!(ctx.deadline().is_some());
    }
}
