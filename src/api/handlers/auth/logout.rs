//! Logout endpoint.
//!
//! Two independent effects: the upstream sign-out is best effort, the local
//! cookie clear always happens. Both outcomes are logged separately. A caller
//! over the logout rate limit only loses the upstream call.

use axum::{
    extract::{Extension, Request},
    http::HeaderMap,
    response::Response,
};
use std::sync::Arc;

use super::cookies;
use super::events::{self, EventCode, Operation};
use super::identity::with_timeout;
use super::pipeline;
use super::rate_limit::OperationType;
use super::request::client_identifier;
use super::state::AuthState;

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 302, description = "Session cookies cleared")
    ),
    tag = "auth"
)]
pub async fn logout(auth_state: Extension<Arc<AuthState>>, request: Request) -> Response {
    logout_pipeline(&auth_state, request).await
}

async fn logout_pipeline(state: &AuthState, request: Request) -> Response {
    let (parts, _body) = request.into_parts();

    let client = client_identifier(&parts, state.config().trust_proxy_headers());
    let limited = state
        .rate_limiter()
        .check(OperationType::Logout, &client)
        .is_limited;
    if limited {
        events::record_rejection(
            Operation::Logout,
            EventCode::RateLimited,
            "Rate limit exceeded, upstream sign-out skipped",
        );
    }

    let tokens = cookies::read(&parts.headers).filter(|_| !limited);
    if let Some(tokens) = tokens {
        let signed_out = with_timeout(
            state.config().identity_timeout(),
            state.identity().sign_out(&tokens.access_token),
        )
        .await;
        match signed_out {
            Ok(()) => events::record(
                Operation::Logout,
                EventCode::UpstreamSessionRevoked,
                "Upstream session revoked",
            ),
            Err(err) => events::record_failure(
                Operation::Logout,
                EventCode::SignOutFailed,
                "Upstream sign-out failed",
                &err,
                state.config().is_production(),
            ),
        }
    }

    let mut headers = HeaderMap::new();
    cookies::clear(&mut headers, &state.config().cookie_options());
    events::record(
        Operation::Logout,
        EventCode::LocalSessionCleared,
        "Local session cleared",
    );

    pipeline::redirect_home(headers)
}
