//! Authentication context and credential verification

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::{RbacError, RbacResult},
    models::{Subject, UserId},
};

/// Header carrying the caller's user id for [`HeaderCredentialVerifier`]
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Header carrying an optional session id
pub const SESSION_ID_HEADER: &str = "X-Session-Id";

/// Authentication context for a user request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// User ID
    pub user_id: UserId,

    /// Session information
    pub session_id: Option<String>,
}

impl AuthContext {
    /// Create a new authentication context
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Subject used in authorization checks
    pub fn subject(&self) -> Subject {
        Subject::User(self.user_id)
    }

    /// Build a context from request headers once the user is known
    pub fn from_headers(user_id: UserId, headers: &HeaderMap) -> Self {
        let context = Self::new(user_id);
        match headers.get(SESSION_ID_HEADER).and_then(|value| value.to_str().ok()) {
            Some(session) => context.with_session(session),
            None => context,
        }
    }
}

/// Resolves the authenticated user of a request.
///
/// Token validation lives outside the policy engine; implementations wrap
/// whatever the deployment uses.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify_subject(&self, headers: &HeaderMap) -> RbacResult<UserId>;
}

/// Trusts a numeric `X-User-Id` header. For development and tests only.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderCredentialVerifier;

#[async_trait]
impl CredentialVerifier for HeaderCredentialVerifier {
    async fn verify_subject(&self, headers: &HeaderMap) -> RbacResult<UserId> {
        let value = headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| RbacError::unauthenticated("missing user id header"))?;

        value
            .to_str()
            .ok()
            .and_then(|id| id.trim().parse().ok())
            .ok_or_else(|| RbacError::unauthenticated("malformed user id header"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn test_header_verifier() {
        let verifier = HeaderCredentialVerifier;
        let mut headers = HeaderMap::new();
        assert!(verifier.verify_subject(&headers).await.is_err());

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("abc"));
        assert!(matches!(
            verifier.verify_subject(&headers).await,
            Err(RbacError::Unauthenticated { .. })
        ));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("42"));
        assert_eq!(verifier.verify_subject(&headers).await.unwrap(), 42);
    }

    #[test]
    fn test_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_ID_HEADER, HeaderValue::from_static("s-1"));

        let ctx = AuthContext::from_headers(7, &headers);
        assert_eq!(ctx, AuthContext::new(7).with_session("s-1"));
        assert_eq!(ctx.subject(), Subject::User(7));
    }
}
