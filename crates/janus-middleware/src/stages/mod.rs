//! Built-in stages.
//!
//! Server stages, in reference order:
//!
//! | Stage | Type |
//! |-------|------|
//! | tracing | [`TracingInterceptor`] |
//! | auth | [`AuthInterceptor`] |
//! | access_log | [`AccessLogInterceptor`] |
//! | error | [`ErrorInterceptor`] |
//! | deadline | [`DeadlineInterceptor`] |
//! | recovery | [`RecoveryInterceptor`] |
//!
//! Client stages: [`CredentialsInterceptor`], [`TimeoutInterceptor`],
//! [`RetryInterceptor`].

mod access_log;
pub mod auth;
mod credentials;
mod deadline;
mod error;
mod recovery;
mod retry;
mod timeout;
mod tracing;

pub use access_log::AccessLogInterceptor;
pub use auth::{AuthInterceptor, AuthMode, Credentials};
pub use credentials::CredentialsInterceptor;
pub use deadline::DeadlineInterceptor;
pub use error::ErrorInterceptor;
pub use recovery::{panic_message, RecoveryInterceptor};
pub use retry::{RetryInterceptor, DEFAULT_RETRYABLE};
pub use timeout::TimeoutInterceptor;
pub use self::tracing::{TracingInterceptor, TRACER_NAME};
