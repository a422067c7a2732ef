//! Panic containment.
//!
//! Runs the rest of the chain under `catch_unwind`. A panic in the handler
//! or an inner stage is logged with its message and a backtrace and turned
//! into an `Internal` status, so the serving task keeps running and the
//! caller still gets a response.

use crate::interceptor::{BoxFuture, CallResult, Interceptor, Next};
use crate::payload::Payload;
use futures_util::FutureExt;
use janus_core::{CallContext, Status};
use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;

/// Panic-containment stage.
#[derive(Debug, Clone, Default)]
pub struct RecoveryInterceptor {
    _private: (),
}

impl RecoveryInterceptor {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Interceptor for RecoveryInterceptor {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        request: Payload,
        next: Next<'a>,
    ) -> BoxFuture<'a, CallResult> {
        Box::pin(async move {
            let outcome = AssertUnwindSafe(next.run(&mut *ctx, request))
                .catch_unwind()
                .await;
            match outcome {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(
                        method = %ctx.method(),
                        panic = %message,
                        backtrace = %Backtrace::force_capture(),
                        "recovered from panic"
                    );
                    janus_telemetry::metrics::record_panic(ctx.method());
                    Err(Status::internal(format!("panic: {message}")).into())
                }
            }
        })
    }
}

/// Extracts the message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InterceptorChain;
    use crate::interceptor::{handler_fn, UnaryHandler};
    use janus_core::Code;

    #[tokio::test]
    async fn test_panic_becomes_internal() {
        let handler = InterceptorChain::builder()
            .stage(RecoveryInterceptor::new())
            .build()
            .wrap(handler_fn(|_request: Payload| async move {
                if true {
                    panic!("index out of range");
                }
                Ok(Payload::new(()))
            }));

        let mut ctx = CallContext::new("/a.B/C");
        let err = handler.call(&mut ctx, Payload::new(())).await.unwrap_err();
        let status = Status::from_error(err.as_ref());

        assert_eq!(status.code(), Code::Internal);
        assert!(status.message().contains("index out of range"));
    }

    #[tokio::test]
    async fn test_chain_is_reusable_after_panic() {
        let handler = InterceptorChain::builder()
            .stage(RecoveryInterceptor::new())
            .build()
            .wrap(handler_fn(|request: Payload| async move {
                if request.downcast_ref::<bool>() == Some(&true) {
                    panic!("asked to panic");
                }
                Ok(request)
            }));

        let mut ctx = CallContext::new("/a.B/C");
        assert!(handler.call(&mut ctx, Payload::new(true)).await.is_err());
        let mut ctx = CallContext::new("/a.B/C");
        assert!(handler.call(&mut ctx, Payload::new(false)).await.is_ok());
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"static str"), "static str");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "unknown panic payload");
    }
}
