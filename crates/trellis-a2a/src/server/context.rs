//! Per-request context: authenticated user identity and cancellation.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::A2aResult;

pub use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// Identity of the end user behind a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// User identifier
    pub id: String,
}

impl User {
    /// Create a user with the given ID
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Hook mapping an inbound HTTP request to a user identity.
///
/// Every non-card request passes through the configured provider before it
/// reaches the message processor.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Authenticate the request from its headers
    async fn authenticate(&self, headers: &HeaderMap) -> A2aResult<User>;
}

/// Fallback provider that mints a fresh anonymous identity per request.
///
/// Deployments normally install a header-extracting provider instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousAuthProvider;

#[async_trait]
impl AuthProvider for AnonymousAuthProvider {
    async fn authenticate(&self, _headers: &HeaderMap) -> A2aResult<User> {
        Ok(User::new(Uuid::new_v4().to_string()))
    }
}

/// Context carried through one request: the authenticated user plus the
/// cancellation token bounding all work done on its behalf.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    user: Option<User>,
    cancel: CancellationToken,
}

impl CallContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context carrying the given user
    pub fn with_user(user: User) -> Self {
        Self {
            user: Some(user),
            cancel: CancellationToken::new(),
        }
    }

    /// Create a context carrying a user with the given ID.
    ///
    /// Intended for tests and for forwarding an identity across process
    /// boundaries.
    pub fn with_user_id(id: impl Into<String>) -> Self {
        Self::with_user(User::new(id))
    }

    /// Replace the cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The authenticated user, if any
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// The authenticated user's ID, if any
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    /// Token cancelled when the caller abandons the request
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_with_user_id() {
        let ctx = CallContext::with_user_id("user-1");
        assert_eq!(ctx.user_id(), Some("user-1"));
    }

    #[test]
    fn test_empty_context_has_no_user() {
        let ctx = CallContext::new();
        assert!(ctx.user().is_none());
        assert!(!ctx.cancellation().is_cancelled());
    }

    #[tokio::test]
    async fn test_anonymous_provider_mints_distinct_ids() {
        let provider = AnonymousAuthProvider;
        let headers = HeaderMap::new();
        let a = provider.authenticate(&headers).await.unwrap();
        let b = provider.authenticate(&headers).await.unwrap();
        assert_ne!(a.id, b.id);
    }
}
