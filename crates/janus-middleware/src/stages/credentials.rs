//! Client-side credential injection.
//!
//! Writes the configured `app_key`/`app_secret` pair, and any fixed extra
//! entries, into the outgoing call metadata where the server's
//! authentication stage reads them.

use super::auth::{Credentials, APP_KEY, APP_SECRET};
use crate::interceptor::{BoxFuture, CallResult, Interceptor, Next};
use crate::payload::Payload;
use janus_core::CallContext;

/// Credential-injection stage.
#[derive(Debug, Clone)]
pub struct CredentialsInterceptor {
    credentials: Option<Credentials>,
    extra: Vec<(String, String)>,
}

impl CredentialsInterceptor {
    /// Injects `credentials` into every call.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            extra: Vec::new(),
        }
    }

    /// Injects only the extra entries.
    pub fn anonymous() -> Self {
        Self {
            credentials: None,
            extra: Vec::new(),
        }
    }

    /// Adds a fixed metadata entry.
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    fn apply(&self, ctx: &mut CallContext) {
        let metadata = ctx.metadata_mut();
        if let Some(credentials) = &self.credentials {
            metadata.insert(APP_KEY, credentials.app_key.clone());
            metadata.insert(APP_SECRET, credentials.app_secret.clone());
        }
        for (key, value) in &self.extra {
            metadata.append(key, value.clone());
        }
    }
}

impl Interceptor for CredentialsInterceptor {
    fn name(&self) -> &'static str {
        "credentials"
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        request: Payload,
        next: Next<'a>,
    ) -> BoxFuture<'a, CallResult> {
        self.apply(ctx);
        next.run(ctx, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_sets_credentials_and_extras() {
        let stage = CredentialsInterceptor::new(Credentials::new("janus", "s3cret"))
            .with_entry("aaa", "bbb");
        let mut ctx = CallContext::new("/a.B/C");
        ctx.metadata_mut().insert("app_key", "stale");

        stage.apply(&mut ctx);

        assert_eq!(ctx.metadata().get("app_key"), Some("janus"));
        assert_eq!(ctx.metadata().get("app_secret"), Some("s3cret"));
        assert_eq!(ctx.metadata().get("aaa"), Some("bbb"));
    }

    #[test]
    fn test_anonymous_sets_only_extras() {
        let stage = CredentialsInterceptor::anonymous().with_entry("x-client", "gateway");
        let mut ctx = CallContext::new("/a.B/C");
        stage.apply(&mut ctx);
        assert!(!ctx.metadata().contains_key("app_key"));
        assert_eq!(ctx.metadata().len(), 1);
    }
}
