//! Call tracing.
//!
//! Opens an OpenTelemetry server span per call, parented on the trace
//! context carried in the call metadata (`traceparent`), and a `tracing`
//! span carrying the same ids so log lines correlate with the trace. The
//! ids are stored on the [`CallContext`] for later stages.
//!
//! When no exporter is installed the global tracer produces non-recording
//! spans; the stage then reuses the caller's trace id, or mints one, so
//! logs still carry ids.

use crate::interceptor::{BoxFuture, CallResult, Interceptor, Next};
use crate::payload::Payload;
use janus_core::{CallContext, Code, Status};
use opentelemetry::trace::{Span, SpanKind, TraceContextExt, Tracer};
use opentelemetry::KeyValue;
use tracing::Instrument;
use uuid::Uuid;

/// Instrumentation scope name for spans opened by Janus.
pub const TRACER_NAME: &str = "janus";

/// Tracing stage.
#[derive(Debug, Clone, Default)]
pub struct TracingInterceptor {
    _private: (),
}

impl TracingInterceptor {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Interceptor for TracingInterceptor {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        request: Payload,
        next: Next<'a>,
    ) -> BoxFuture<'a, CallResult> {
        Box::pin(async move {
            let parent = janus_telemetry::tracing::extract_context(ctx.metadata());
            let tracer = janus_telemetry::tracing::tracer(TRACER_NAME);
            let mut span = tracer
                .span_builder(ctx.method().to_string())
                .with_kind(SpanKind::Server)
                .with_attributes([
                    KeyValue::new("rpc.system", "grpc"),
                    KeyValue::new("rpc.service", ctx.service().to_string()),
                    KeyValue::new("rpc.method", ctx.method().to_string()),
                ])
                .start_with_context(&tracer, &parent);

            let (trace_id, span_id) = call_ids(span.span_context(), parent.span().span_context());
            ctx.set_trace(trace_id.clone(), span_id.clone());

            let log_span = tracing::info_span!(
                "rpc",
                method = %ctx.method(),
                call_id = %ctx.call_id(),
                trace_id = %trace_id,
                span_id = %span_id,
            );

            let result = next.run(ctx, request).instrument(log_span).await;

            let code = match &result {
                Ok(_) => Code::Ok,
                Err(err) => {
                    let status = Status::from_error(err.as_ref());
                    span.set_status(opentelemetry::trace::Status::error(
                        status.message().to_string(),
                    ));
                    status.code()
                }
            };
            span.set_attribute(KeyValue::new(
                "rpc.grpc.status_code",
                i64::from(code.as_i32()),
            ));
            span.end();

            result
        })
    }
}

fn call_ids(
    own: &opentelemetry::trace::SpanContext,
    parent: &opentelemetry::trace::SpanContext,
) -> (String, String) {
    if own.is_valid() {
        return (own.trace_id().to_string(), own.span_id().to_string());
    }
    let trace_id = if parent.is_valid() {
        parent.trace_id().to_string()
    } else {
        Uuid::now_v7().simple().to_string()
    };
    let span_id = Uuid::new_v4().simple().to_string()[..16].to_string();
    (trace_id, span_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InterceptorChain;
    use crate::interceptor::{handler_fn, UnaryHandler};
    use janus_core::Status;

    #[tokio::test]
    async fn test_assigns_trace_ids() {
        let handler = InterceptorChain::builder()
            .stage(TracingInterceptor::new())
            .build()
            .wrap(handler_fn(|request: Payload| async move { Ok(request) }));

        let mut ctx = CallContext::new("/proto.ArticleService/GetArticleList");
        handler.call(&mut ctx, Payload::new(())).await.unwrap();

        assert_eq!(ctx.trace_id().map(str::len), Some(32));
        assert_eq!(ctx.span_id().map(str::len), Some(16));
    }

    #[test]
    fn test_call_ids_without_span_context() {
        let none = opentelemetry::trace::SpanContext::empty_context();
        let (trace_id, span_id) = call_ids(&none, &none);
        assert_eq!(trace_id.len(), 32);
        assert_eq!(span_id.len(), 16);
        assert!(span_id.chars().all(|c| c.is_ascii_hexdigit()));

        let (_, other) = call_ids(&none, &none);
        assert_ne!(span_id, other);
    }

    #[tokio::test]
    async fn test_continues_caller_trace() {
        janus_telemetry::init_tracing(&janus_telemetry::TracingConfig::default()).unwrap();
        let handler = InterceptorChain::builder()
            .stage(TracingInterceptor::new())
            .build()
            .wrap(handler_fn(|_request: Payload| async move {
                Err(Status::internal("boom").into())
            }));

        let mut ctx = CallContext::new("/proto.ArticleService/GetArticleList");
        ctx.metadata_mut().insert(
            "traceparent",
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
        );
        let result = handler.call(&mut ctx, Payload::new(())).await;

        assert!(result.is_err());
        assert_eq!(ctx.trace_id(), Some("0af7651916cd43dd8448eb211c80319c"));
    }
}
