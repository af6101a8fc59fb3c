//! Registration endpoint.

use axum::{
    extract::{Extension, Request},
    http::HeaderMap,
    response::Response,
};
use std::sync::Arc;

use super::cookies;
use super::errors::{ApiError, ErrorBody};
use super::events::{self, EventCode, Operation};
use super::identity::with_timeout;
use super::pipeline;
use super::rate_limit::OperationType;
use super::request::{CredentialsRequest, client_identifier};
use super::state::AuthState;
use super::validation::CredentialKind;

const REGISTRATION_FAILED_MESSAGE: &str = "Registration failed. Please try again later.";

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body(
        content = CredentialsRequest,
        description = "JSON or form-encoded credentials",
        content_type = "application/json"
    ),
    responses(
        (status = 302, description = "Registered; session cookies set when a session was issued"),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody),
        (status = 500, description = "Registration failed", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(auth_state: Extension<Arc<AuthState>>, request: Request) -> Response {
    pipeline::respond(register_pipeline(&auth_state, request).await)
}

async fn register_pipeline(state: &AuthState, request: Request) -> Result<Response, ApiError> {
    let production = state.config().is_production();
    let (parts, body) = request.into_parts();

    let client = client_identifier(&parts, state.config().trust_proxy_headers());
    pipeline::rate_check(
        state,
        OperationType::Registration,
        Operation::Register,
        &client,
    )?;

    let credentials = pipeline::read_credentials(
        Operation::Register,
        CredentialKind::Registration,
        &parts.headers,
        body,
    )
    .await?;

    let signed_up = with_timeout(
        state.config().identity_timeout(),
        state
            .identity()
            .sign_up(&credentials.email, &credentials.password),
    )
    .await
    .map_err(|err| {
        events::record_failure(
            Operation::Register,
            EventCode::SignUpFailed,
            "Sign-up failed",
            &err,
            production,
        );
        ApiError::Upstream(REGISTRATION_FAILED_MESSAGE)
    })?;

    if signed_up.user.is_none() {
        events::record_failure(
            Operation::Register,
            EventCode::SignUpNoUser,
            "Sign-up returned no user",
            &"empty sign-up response",
            production,
        );
        return Err(ApiError::Upstream(REGISTRATION_FAILED_MESSAGE));
    }

    let mut headers = HeaderMap::new();
    if let Some(session) = signed_up.session {
        cookies::write(&mut headers, &session, &state.config().cookie_options())
            .map_err(|err| pipeline::unexpected(Operation::Register, &err, production))?;
        events::record(
            Operation::Register,
            EventCode::RegisterSuccess,
            "User registered and signed in",
        );
    } else {
        events::record(
            Operation::Register,
            EventCode::RegisterPendingVerification,
            "User registered, email verification pending",
        );
    }

    Ok(pipeline::redirect_home(headers))
}
