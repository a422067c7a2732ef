//! Chain composition.
//!
//! An [`InterceptorChain`] is an ordered list of stages assembled once at
//! startup. [`InterceptorChain::wrap`] binds it to a handler, producing a
//! [`ComposedHandler`] that behaves as
//! `stage₁(stage₂(…(stageₙ(handler))))`. The stage list is immutable after
//! composition and shared read-only by every call.
//!
//! # Example
//!
//! ```
//! use janus_middleware::chain::InterceptorChain;
//! use janus_middleware::stages::{AccessLogInterceptor, RecoveryInterceptor};
//! use janus_middleware::{handler_fn, Payload};
//!
//! let chain = InterceptorChain::builder()
//!     .stage(AccessLogInterceptor::new())
//!     .stage(RecoveryInterceptor::new())
//!     .build();
//! assert_eq!(chain.stage_names(), vec!["access_log", "recovery"]);
//!
//! let handler = chain.wrap(handler_fn(|request: Payload| async move { Ok(request) }));
//! # let _ = handler;
//! ```

use crate::interceptor::{BoxFuture, CallResult, Interceptor, Next, UnaryHandler};
use crate::payload::Payload;
use crate::stages::{
    AccessLogInterceptor, AuthInterceptor, AuthMode, Credentials, CredentialsInterceptor,
    DeadlineInterceptor, ErrorInterceptor, RecoveryInterceptor, RetryInterceptor,
    TimeoutInterceptor, TracingInterceptor,
};
use janus_core::CallContext;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Server stages in reference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Opens a span for the call.
    Tracing,
    /// Rejects calls without valid credentials.
    Authentication,
    /// Logs the request and the outcome.
    AccessLog,
    /// Normalizes and logs errors.
    ErrorNormalization,
    /// Enforces the call deadline.
    Deadline,
    /// Contains panics.
    Recovery,
}

impl Stage {
    /// All stages in order.
    pub const fn all() -> [Stage; 6] {
        [
            Stage::Tracing,
            Stage::Authentication,
            Stage::AccessLog,
            Stage::ErrorNormalization,
            Stage::Deadline,
            Stage::Recovery,
        ]
    }

    /// Name reported by the stage's interceptor.
    pub const fn name(&self) -> &'static str {
        match self {
            Stage::Tracing => "tracing",
            Stage::Authentication => "auth",
            Stage::AccessLog => "access_log",
            Stage::ErrorNormalization => "error",
            Stage::Deadline => "deadline",
            Stage::Recovery => "recovery",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An ordered, immutable list of stages.
#[derive(Clone)]
pub struct InterceptorChain {
    stages: Arc<[Arc<dyn Interceptor>]>,
}

impl InterceptorChain {
    /// Creates a builder.
    pub fn builder() -> InterceptorChainBuilder {
        InterceptorChainBuilder::default()
    }

    /// Stage names in application order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Binds the chain to its terminal handler.
    pub fn wrap<H: UnaryHandler>(&self, handler: H) -> ComposedHandler {
        ComposedHandler {
            stages: Arc::clone(&self.stages),
            handler: Arc::new(handler),
        }
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder for [`InterceptorChain`].
#[derive(Default)]
pub struct InterceptorChainBuilder {
    stages: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChainBuilder {
    /// Appends a stage; earlier stages wrap later ones.
    pub fn stage<I: Interceptor>(mut self, interceptor: I) -> Self {
        self.stages.push(Arc::new(interceptor));
        self
    }

    /// Appends a shared stage.
    pub fn shared_stage(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.stages.push(interceptor);
        self
    }

    /// Appends a stage only when `condition` holds.
    pub fn stage_if<I: Interceptor>(self, condition: bool, interceptor: I) -> Self {
        if condition {
            self.stage(interceptor)
        } else {
            self
        }
    }

    /// Freezes the stage list.
    pub fn build(self) -> InterceptorChain {
        InterceptorChain {
            stages: self.stages.into(),
        }
    }
}

/// A chain bound to its handler; a single callable for the transport.
#[derive(Clone)]
pub struct ComposedHandler {
    stages: Arc<[Arc<dyn Interceptor>]>,
    handler: Arc<dyn UnaryHandler>,
}

impl ComposedHandler {
    /// Stage names in application order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }
}

impl UnaryHandler for ComposedHandler {
    fn call<'a>(&'a self, ctx: &'a mut CallContext, request: Payload) -> BoxFuture<'a, CallResult> {
        Next::new(&self.stages, self.handler.as_ref()).run(ctx, request)
    }
}

impl fmt::Debug for ComposedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedHandler")
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}

/// Builds the reference server chain.
///
/// Stages run in [`Stage::all`] order. `default_timeout` bounds calls that
/// arrive without a deadline.
pub fn server_chain(auth: AuthMode, default_timeout: Option<Duration>) -> InterceptorChain {
    let deadline = match default_timeout {
        Some(timeout) => DeadlineInterceptor::new().with_default_timeout(timeout),
        None => DeadlineInterceptor::new(),
    };
    InterceptorChain::builder()
        .stage(TracingInterceptor::new())
        .stage(AuthInterceptor::new(auth))
        .stage(AccessLogInterceptor::new())
        .stage(ErrorInterceptor::new())
        .stage(deadline)
        .stage(RecoveryInterceptor::new())
        .build()
}

/// Builds the client chain: credentials, then timeout, then retry.
pub fn client_chain(
    credentials: Option<Credentials>,
    timeout: Duration,
    retry: RetryInterceptor,
) -> InterceptorChain {
    let credentials = match credentials {
        Some(credentials) => CredentialsInterceptor::new(credentials),
        None => CredentialsInterceptor::anonymous(),
    };
    InterceptorChain::builder()
        .stage(credentials)
        .stage(TimeoutInterceptor::new(timeout))
        .stage(retry)
        .build()
}
