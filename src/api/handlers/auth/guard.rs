//! Tier-gated access for protected routes.
//!
//! The guard resolves the caller and either hands an [`AuthContext`] to the
//! wrapped handler or answers 403 without running it. The response never says
//! whether the caller was anonymous or merely on the wrong tier.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::authorization::{AuthorizationResolver, Tier};
use super::errors::ApiError;
use super::events::{self, EventCode, Operation};
use super::identity::{Session, User};

/// Caller admitted by [`AccessGuard`], available to handlers as an extension.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthContext {
    pub user: User,
    pub session: Session,
    pub tier: Tier,
}

#[derive(Clone)]
pub struct AccessGuard {
    allowed: Arc<[Tier]>,
    resolver: Arc<AuthorizationResolver>,
}

impl AccessGuard {
    #[must_use]
    pub fn new(allowed: &[Tier], resolver: Arc<AuthorizationResolver>) -> Self {
        Self {
            allowed: Arc::from(allowed),
            resolver,
        }
    }

    #[must_use]
    pub fn allows(&self, tier: Tier) -> bool {
        self.allowed.contains(&tier)
    }

    /// Resolve the caller and check it against the allow-list.
    ///
    /// # Errors
    /// Returns [`ApiError::Forbidden`] when the caller has no session or the
    /// wrong tier.
    pub async fn admit(&self, headers: &HeaderMap) -> Result<AuthContext, ApiError> {
        let resolved = self.resolver.resolve(headers).await;
        match (resolved.user, resolved.session) {
            (Some(user), Some(session)) if self.allows(resolved.tier) => Ok(AuthContext {
                user,
                session,
                tier: resolved.tier,
            }),
            _ => {
                events::record_rejection(
                    Operation::Authorization,
                    EventCode::AccessDenied,
                    "Access denied",
                );
                Err(ApiError::Forbidden)
            }
        }
    }
}

/// Middleware form of [`AccessGuard`], for `from_fn_with_state`.
pub async fn access_guard(
    State(guard): State<AccessGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    match guard.admit(request.headers()).await {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::test_support::{
        CapturedLogs, MockIdentity, MockProfiles, session_cookie_headers,
    };
    use anyhow::Result;
    use axum::{
        Extension, Router,
        body::{Body, to_bytes},
        http::StatusCode,
        middleware,
        routing::get,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    fn guard(role: Option<&str>, allowed: &[Tier]) -> AccessGuard {
        let resolver = AuthorizationResolver::new(
            Arc::new(MockIdentity::with_live_session()),
            Arc::new(MockProfiles::with_role(role)),
            Duration::from_secs(5),
            false,
        );
        AccessGuard::new(allowed, Arc::new(resolver))
    }

    fn app(guard: AccessGuard, hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/premium",
                get(move |Extension(context): Extension<AuthContext>| {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        context.tier.as_str().to_string()
                    }
                }),
            )
            .route_layer(middleware::from_fn_with_state(guard, access_guard))
    }

    fn request(with_session: bool) -> Result<Request<Body>> {
        let mut request = axum::http::Request::builder()
            .uri("/premium")
            .body(Body::empty())?;
        if with_session {
            *request.headers_mut() = session_cookie_headers();
        }
        Ok(request)
    }

    #[tokio::test]
    async fn wrong_tier_is_forbidden_without_running_handler() -> Result<()> {
        let logs = CapturedLogs::new();
        let _guard = logs.install();
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(guard(Some("free"), &[Tier::PremiumUser]), hits.clone())
            .oneshot(request(true)?)
            .await?;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        let body: serde_json::Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await?)?;
        assert_eq!(body["error"], "INSUFFICIENT_PERMISSIONS");
        assert_eq!(body["message"], "Forbidden: Access denied");
        assert_eq!(logs.codes(), vec![6001]);
        Ok(())
    }

    #[tokio::test]
    async fn anonymous_gets_the_same_forbidden_body() -> Result<()> {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(guard(Some("premium"), &[Tier::PremiumUser]), hits.clone())
            .oneshot(request(false)?)
            .await?;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        let body: serde_json::Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await?)?;
        assert_eq!(body["message"], "Forbidden: Access denied");
        Ok(())
    }

    #[tokio::test]
    async fn allowed_tier_reaches_handler_with_context() -> Result<()> {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(
            guard(Some("license"), &[Tier::PremiumUser, Tier::LicenseUser]),
            hits.clone(),
        )
        .oneshot(request(true)?)
        .await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(body.as_ref(), b"license_user");
        Ok(())
    }
}
