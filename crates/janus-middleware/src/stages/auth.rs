//! Metadata authentication.
//!
//! Reads credentials from the call metadata and rejects the call with
//! `Unauthenticated` before any later stage or the handler runs.
//!
//! | Mode | Accepts |
//! |------|---------|
//! | [`AuthMode::Disabled`] | every call |
//! | [`AuthMode::Metadata`] | calls carrying any application metadata |
//! | [`AuthMode::Credentials`] | calls whose `app_key`/`app_secret` match |

use crate::interceptor::{BoxFuture, CallResult, Interceptor, Next};
use crate::payload::Payload;
use janus_core::errcode::{UNAUTHORIZED_AUTH_NOT_EXIST, UNAUTHORIZED_TOKEN_ERROR};
use janus_core::{CallContext, Status};

/// Metadata key holding the application key.
pub const APP_KEY: &str = "app_key";
/// Metadata key holding the application secret.
pub const APP_SECRET: &str = "app_secret";

/// An application key/secret pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Application key.
    pub app_key: String,
    /// Application secret.
    pub app_secret: String,
}

impl Credentials {
    /// Creates a pair.
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}

/// What the stage requires of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// No check.
    Disabled,
    /// At least one metadata entry.
    Metadata,
    /// Matching `app_key` and `app_secret`.
    Credentials(Credentials),
}

/// Authentication stage.
#[derive(Debug, Clone)]
pub struct AuthInterceptor {
    mode: AuthMode,
}

impl AuthInterceptor {
    /// Creates the stage.
    pub fn new(mode: AuthMode) -> Self {
        Self { mode }
    }

    /// Requires the given credentials.
    pub fn credentials(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self::new(AuthMode::Credentials(Credentials::new(app_key, app_secret)))
    }

    /// The configured mode.
    pub fn mode(&self) -> &AuthMode {
        &self.mode
    }

    /// Checks a call's metadata.
    pub fn check(&self, ctx: &CallContext) -> Result<(), Status> {
        let metadata = ctx.metadata();
        match &self.mode {
            AuthMode::Disabled => Ok(()),
            AuthMode::Metadata if metadata.is_empty() => {
                Err(Status::unauthenticated("token不正确"))
            }
            AuthMode::Metadata => Ok(()),
            AuthMode::Credentials(expected) => {
                let (Some(key), Some(secret)) = (metadata.get(APP_KEY), metadata.get(APP_SECRET))
                else {
                    return Err(UNAUTHORIZED_AUTH_NOT_EXIST.to_status());
                };
                if key == expected.app_key && secret == expected.app_secret {
                    Ok(())
                } else {
                    Err(UNAUTHORIZED_TOKEN_ERROR.to_status())
                }
            }
        }
    }
}

impl Interceptor for AuthInterceptor {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        request: Payload,
        next: Next<'a>,
    ) -> BoxFuture<'a, CallResult> {
        Box::pin(async move {
            if let Err(status) = self.check(ctx) {
                tracing::warn!(method = %ctx.method(), reason = status.message(), "call rejected");
                return Err(status.into());
            }
            next.run(ctx, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use janus_core::Code;

    fn ctx_with(entries: &[(&str, &str)]) -> CallContext {
        let mut ctx = CallContext::new("/proto.ArticleService/GetArticleList");
        for (key, value) in entries {
            ctx.metadata_mut().append(key, *value);
        }
        ctx
    }

    #[test]
    fn test_disabled_accepts_everything() {
        let auth = AuthInterceptor::new(AuthMode::Disabled);
        assert!(auth.check(&ctx_with(&[])).is_ok());
    }

    #[test]
    fn test_metadata_mode() {
        let auth = AuthInterceptor::new(AuthMode::Metadata);
        let err = auth.check(&ctx_with(&[])).unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);
        assert!(auth.check(&ctx_with(&[("x-tag", "1")])).is_ok());
    }

    #[test]
    fn test_credentials_mode() {
        let auth = AuthInterceptor::credentials("janus", "s3cret");

        assert!(auth
            .check(&ctx_with(&[("App_Key", "janus"), ("APP_SECRET", "s3cret")]))
            .is_ok());

        let missing = auth.check(&ctx_with(&[("app_key", "janus")])).unwrap_err();
        assert_eq!(missing.code(), Code::Unauthenticated);
        assert_eq!(missing.error_detail().map(|d| d.code), Some(10_000_003));

        let wrong = auth
            .check(&ctx_with(&[("app_key", "janus"), ("app_secret", "nope")]))
            .unwrap_err();
        assert_eq!(wrong.error_detail().map(|d| d.code), Some(10_000_004));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("janus", "s3cret");
        assert!(!format!("{creds:?}").contains("s3cret"));
    }
}
