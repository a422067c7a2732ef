//! Core interceptor traits.
//!
//! An [`Interceptor`] wraps a call: it receives the [`CallContext`], the
//! request [`Payload`], and a [`Next`] continuation. Calling
//! `next.run(ctx, request)` hands the call to the remaining stages and
//! finally to the [`UnaryHandler`]; returning without calling it
//! short-circuits the chain.
//!
//! `Next` is `Copy`, so a stage may run the continuation more than once.
//! The client retry stage relies on this.

use crate::payload::Payload;
use janus_core::{CallContext, CallError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed future used throughout the chain.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of a call at any point in the chain.
pub type CallResult = Result<Payload, CallError>;

/// The innermost target of a chain.
pub trait UnaryHandler: Send + Sync + 'static {
    /// Handles one call.
    fn call<'a>(&'a self, ctx: &'a mut CallContext, request: Payload) -> BoxFuture<'a, CallResult>;
}

impl<H: UnaryHandler + ?Sized> UnaryHandler for Arc<H> {
    fn call<'a>(&'a self, ctx: &'a mut CallContext, request: Payload) -> BoxFuture<'a, CallResult> {
        (**self).call(ctx, request)
    }
}

/// One call-wrapping stage.
///
/// Stages hold no per-call state; anything a stage learns about a call
/// lives in the [`CallContext`].
pub trait Interceptor: Send + Sync + 'static {
    /// Stage name, used for introspection and logs.
    fn name(&self) -> &'static str;

    /// Wraps one call.
    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        request: Payload,
        next: Next<'a>,
    ) -> BoxFuture<'a, CallResult>;
}

/// The remainder of a chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Interceptor>],
    handler: &'a dyn UnaryHandler,
}

impl<'a> Next<'a> {
    /// Creates a continuation over `stages` ending in `handler`.
    pub fn new(stages: &'a [Arc<dyn Interceptor>], handler: &'a dyn UnaryHandler) -> Self {
        Self { stages, handler }
    }

    /// Runs the next stage, or the handler once the stages are exhausted.
    pub fn run<'b>(self, ctx: &'b mut CallContext, request: Payload) -> BoxFuture<'b, CallResult>
    where
        'a: 'b,
    {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.intercept(
                ctx,
                request,
                Next {
                    stages: rest,
                    handler: self.handler,
                },
            ),
            None => self.handler.call(ctx, request),
        }
    }

    /// Number of stages left before the handler.
    pub fn remaining(&self) -> usize {
        self.stages.len()
    }
}

/// A handler built from an async function of the request alone.
///
/// Created with [`handler_fn`].
pub struct HandlerFn<F> {
    f: F,
}

/// Wraps an async function as a [`UnaryHandler`].
///
/// ```
/// use janus_middleware::{handler_fn, Payload};
///
/// let echo = handler_fn(|request: Payload| async move { Ok(request) });
/// # let _ = echo;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallResult> + Send + 'static,
{
    HandlerFn { f }
}

impl<F, Fut> UnaryHandler for HandlerFn<F>
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallResult> + Send + 'static,
{
    fn call<'a>(&'a self, _ctx: &'a mut CallContext, request: Payload) -> BoxFuture<'a, CallResult> {
        Box::pin((self.f)(request))
    }
}
