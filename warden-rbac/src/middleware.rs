//! HTTP middleware for RBAC authorization

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self as axum_middleware, Next},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    auth::{AuthContext, CredentialVerifier},
    enforcer::RbacEnforcer,
    models::Resource,
};

/// RBAC middleware state
#[derive(Clone)]
pub struct RbacMiddleware {
    enforcer: RbacEnforcer,
    verifier: Arc<dyn CredentialVerifier>,
}

impl RbacMiddleware {
    /// Create new RBAC middleware
    pub fn new(enforcer: RbacEnforcer, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { enforcer, verifier }
    }

    /// Wrap every route of `router` in authentication then authorization
    pub fn protect<S>(self: Arc<Self>, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            .layer(axum_middleware::from_fn_with_state(
                self.clone(),
                Self::authorize_request,
            ))
            .layer(axum_middleware::from_fn_with_state(
                self,
                Self::authenticate_request,
            ))
    }

    /// Resolve the caller and attach an [`AuthContext`] to the request
    pub async fn authenticate_request(
        State(middleware): State<Arc<RbacMiddleware>>,
        mut request: Request<Body>,
        next: Next,
    ) -> Response {
        let user_id = match middleware.verifier.verify_subject(request.headers()).await {
            Ok(user_id) => user_id,
            Err(e) => {
                tracing::debug!(path = %request.uri().path(), error = %e, "Rejected unauthenticated request");
                return AuthResponse::unauthorized();
            }
        };

        let context = AuthContext::from_headers(user_id, request.headers());
        request.extensions_mut().insert(context);

        next.run(request).await
    }

    /// Check `(api:<path>, <METHOD>)` for the authenticated caller
    pub async fn authorize_request(
        State(middleware): State<Arc<RbacMiddleware>>,
        request: Request<Body>,
        next: Next,
    ) -> Response {
        let Some(auth_context) = request.extensions().get::<AuthContext>().cloned() else {
            return AuthResponse::unauthorized();
        };

        let subject = auth_context.subject();
        let resource = Resource::api(request.uri().path()).key();
        let action = request.method().as_str().to_string();

        match middleware.enforcer.enforce(&subject, &resource, &action).await {
            Ok(true) => next.run(request).await,
            Ok(false) => {
                tracing::info!(%subject, %resource, %action, "Request denied");
                AuthResponse::forbidden()
            }
            Err(e) => {
                tracing::warn!(%subject, %resource, %action, error = %e, "Denying request, policy check failed");
                AuthResponse::forbidden()
            }
        }
    }
}

/// Response helpers for authorization errors
pub struct AuthResponse;

impl AuthResponse {
    /// Create unauthorized response
    pub fn unauthorized() -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized", "message": "Authentication required"})),
        )
            .into_response()
    }

    /// Create forbidden response
    pub fn forbidden() -> Response {
        (
            StatusCode::FORBIDDEN,
            Json(json!({"error": "Forbidden", "message": "Insufficient permissions"})),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{HeaderCredentialVerifier, USER_ID_HEADER};
    use crate::models::{Permission, Subject};
    use crate::store::testing::FaultyStore;
    use crate::store::MemoryPolicyStore;
    use axum::routing::get;
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    fn app(enforcer: RbacEnforcer) -> Router {
        let middleware = Arc::new(RbacMiddleware::new(
            enforcer,
            Arc::new(HeaderCredentialVerifier),
        ));
        let router = Router::new().route("/v1/docs", get(|| async { "docs" }).post(|| async { "created" }));
        middleware.protect(router)
    }

    fn request(method: &str, user: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri("/v1/docs");
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn reader_enforcer() -> RbacEnforcer {
        let enforcer = RbacEnforcer::new(MemoryPolicyStore::new(), 1);
        enforcer
            .add_permissions(&Subject::User(5), &[Permission::api("/v1/docs", "GET")])
            .await
            .unwrap();
        enforcer
    }

    #[tokio::test]
    async fn test_missing_credentials_is_unauthorized() {
        let response = app(reader_enforcer().await)
            .oneshot(request("GET", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_granted_route_passes() {
        let response = app(reader_enforcer().await)
            .oneshot(request("GET", Some("5")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"docs");
    }

    #[tokio::test]
    async fn test_method_is_the_action() {
        let response = app(reader_enforcer().await)
            .oneshot(request("POST", Some("5")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Forbidden");
    }

    #[tokio::test]
    async fn test_super_admin_passes_everything() {
        let response = app(reader_enforcer().await)
            .oneshot(request("POST", Some("1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_store_failure_is_forbidden() {
        let (store, faults) = FaultyStore::new();
        let enforcer = RbacEnforcer::new(store, 1);
        enforcer
            .add_permissions(&Subject::User(5), &[Permission::api("/v1/docs", "GET")])
            .await
            .unwrap();
        faults.fail_reads.store(true, Ordering::SeqCst);

        let response = app(enforcer).oneshot(request("GET", Some("5"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
