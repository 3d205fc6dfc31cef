//! Header-based user identity extraction.

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use trellis_a2a::A2aResult;
use trellis_a2a::server::{AuthProvider, HeaderMap, User};

/// Default header carrying the end-user identity.
pub const DEFAULT_USER_ID_HEADER: &str = "X-User-ID";

/// Auth provider reading the user identity from a configurable header.
///
/// When the header is absent or empty, a fresh identifier is minted and a
/// warning is logged; requests are never rejected for a missing identity.
#[derive(Debug, Clone)]
pub struct HeaderAuthProvider {
    header: String,
}

impl HeaderAuthProvider {
    /// Create a provider reading the given header.
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    /// The header this provider reads.
    pub fn header(&self) -> &str {
        &self.header
    }
}

impl Default for HeaderAuthProvider {
    fn default() -> Self {
        Self::new(DEFAULT_USER_ID_HEADER)
    }
}

#[async_trait]
impl AuthProvider for HeaderAuthProvider {
    async fn authenticate(&self, headers: &HeaderMap) -> A2aResult<User> {
        let value = headers
            .get(self.header.as_str())
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());

        match value {
            Some(id) => Ok(User::new(id)),
            None => {
                let minted = Uuid::new_v4().to_string();
                warn!(
                    header = %self.header,
                    user_id = %minted,
                    "Request carried no user identity; minted a fresh one"
                );
                Ok(User::new(minted))
            }
        }
    }
}
