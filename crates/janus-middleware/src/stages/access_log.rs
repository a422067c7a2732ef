//! Access logging.
//!
//! Logs every call twice: once before the continuation runs (method,
//! start time, request summary) and once after (elapsed time, outcome). The
//! outcome is also recorded as `janus_rpc_calls_total` and
//! `janus_rpc_call_duration_seconds`.

use crate::interceptor::{BoxFuture, CallResult, Interceptor, Next};
use crate::payload::Payload;
use janus_core::{CallContext, Code, Status};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Access-log stage.
#[derive(Debug, Clone, Default)]
pub struct AccessLogInterceptor {
    log_payloads: bool,
}

impl AccessLogInterceptor {
    /// Logs method, timing and outcome without message bodies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Includes the `Debug` rendering of requests and responses.
    #[must_use]
    pub fn with_payloads(mut self, enabled: bool) -> Self {
        self.log_payloads = enabled;
        self
    }
}

impl Interceptor for AccessLogInterceptor {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        request: Payload,
        next: Next<'a>,
    ) -> BoxFuture<'a, CallResult> {
        Box::pin(async move {
            let begin_time = unix_seconds();
            let started = Instant::now();
            let request_summary = summarize(&request, self.log_payloads);
            tracing::info!(
                method = %ctx.method(),
                begin_time,
                request = %request_summary,
                "access request"
            );

            let result = next.run(ctx, request).await;

            let elapsed = started.elapsed();
            let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
            let code = match &result {
                Ok(response) => {
                    tracing::info!(
                        method = %ctx.method(),
                        begin_time,
                        end_time = unix_seconds(),
                        elapsed_ms,
                        code = %Code::Ok,
                        response = %summarize(response, self.log_payloads),
                        "access response"
                    );
                    Code::Ok
                }
                Err(err) => {
                    let status = Status::from_error(err.as_ref());
                    tracing::info!(
                        method = %ctx.method(),
                        begin_time,
                        end_time = unix_seconds(),
                        elapsed_ms,
                        code = %status.code(),
                        error = %status.message(),
                        "access response"
                    );
                    status.code()
                }
            };
            janus_telemetry::metrics::record_rpc_call(ctx.method(), &code.to_string(), elapsed);

            result
        })
    }
}

fn summarize(payload: &Payload, verbose: bool) -> String {
    if verbose {
        format!("{payload:?}")
    } else {
        payload.type_name().rsplit("::").next().unwrap_or_default().to_string()
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
