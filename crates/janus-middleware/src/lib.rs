//! # Janus Middleware
//!
//! Interceptor chain for unary calls.
//!
//! A chain is an ordered list of [`Interceptor`] stages composed around a
//! [`UnaryHandler`]. The first stage registered is the outermost: it sees
//! the request first and the result last. The same chain type serves both
//! directions:
//!
//! ```text
//! server: tracing → auth → access_log → error → deadline → recovery → handler
//! client: credentials → timeout → retry → transport
//! ```
//!
//! Requests and responses travel as type-erased [`Payload`]s so stages stay
//! independent of the message types they wrap.
//!
//! ## Example
//!
//! ```
//! use janus_middleware::chain::{server_chain, Stage};
//! use janus_middleware::stages::AuthMode;
//!
//! let chain = server_chain(AuthMode::Disabled, None);
//! assert_eq!(chain.len(), Stage::all().len());
//! assert_eq!(chain.stage_names()[0], "tracing");
//! ```

#![doc(html_root_url = "https://docs.rs/janus-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod interceptor;
pub mod payload;
pub mod stages;

pub use chain::{client_chain, server_chain, ComposedHandler, InterceptorChain, Stage};
pub use interceptor::{handler_fn, BoxFuture, CallResult, HandlerFn, Interceptor, Next, UnaryHandler};
pub use payload::{Message, Payload};
