//! Password login endpoint.

use axum::{
    extract::{Extension, Request},
    http::HeaderMap,
    response::Response,
};
use std::sync::Arc;

use super::cookies;
use super::errors::{ApiError, ErrorBody};
use super::events::{self, EventCode, Operation};
use super::identity::{IdentityError, with_timeout};
use super::pipeline;
use super::rate_limit::OperationType;
use super::request::{CredentialsRequest, client_identifier};
use super::state::AuthState;
use super::validation::CredentialKind;

const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please try again later.";
const NO_SESSION_MESSAGE: &str = "Could not create session. Please try again later.";

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body(
        content = CredentialsRequest,
        description = "JSON or form-encoded credentials",
        content_type = "application/json"
    ),
    responses(
        (status = 302, description = "Signed in; session cookies set"),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 401, description = "Invalid credentials or unconfirmed email", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody),
        (status = 500, description = "Login failed", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(auth_state: Extension<Arc<AuthState>>, request: Request) -> Response {
    pipeline::respond(login_pipeline(&auth_state, request).await)
}

async fn login_pipeline(state: &AuthState, request: Request) -> Result<Response, ApiError> {
    let production = state.config().is_production();
    let (parts, body) = request.into_parts();

    let client = client_identifier(&parts, state.config().trust_proxy_headers());
    pipeline::rate_check(state, OperationType::Login, Operation::Login, &client)?;

    let credentials = pipeline::read_credentials(
        Operation::Login,
        CredentialKind::Login,
        &parts.headers,
        body,
    )
    .await?;

    let signed_in = with_timeout(
        state.config().identity_timeout(),
        state
            .identity()
            .sign_in_with_password(&credentials.email, &credentials.password),
    )
    .await
    .map_err(|err| sign_in_error(&err, production))?;

    if signed_in.user.is_none() {
        events::record_failure(
            Operation::Login,
            EventCode::SignInNoUser,
            "Sign-in returned no user",
            &"empty sign-in response",
            production,
        );
        return Err(ApiError::Upstream(LOGIN_FAILED_MESSAGE));
    }

    let Some(session) = signed_in.session else {
        events::record_failure(
            Operation::Login,
            EventCode::SignInNoSession,
            "Sign-in returned a user without a session",
            &"missing session",
            production,
        );
        return Err(ApiError::Upstream(NO_SESSION_MESSAGE));
    };

    let mut headers = HeaderMap::new();
    cookies::write(&mut headers, &session, &state.config().cookie_options())
        .map_err(|err| pipeline::unexpected(Operation::Login, &err, production))?;
    events::record(Operation::Login, EventCode::LoginSuccess, "User signed in");

    Ok(pipeline::redirect_home(headers))
}

fn sign_in_error(err: &IdentityError, production: bool) -> ApiError {
    match err {
        IdentityError::InvalidCredentials => {
            events::record_rejection(
                Operation::Login,
                EventCode::InvalidCredentials,
                "Invalid login credentials",
            );
            ApiError::InvalidCredentials
        }
        IdentityError::EmailNotConfirmed => {
            events::record_rejection(
                Operation::Login,
                EventCode::EmailNotConfirmed,
                "Email not confirmed",
            );
            ApiError::EmailNotConfirmed
        }
        IdentityError::Other(_) => {
            events::record_failure(
                Operation::Login,
                EventCode::SignInFailed,
                "Sign-in failed",
                err,
                production,
            );
            ApiError::Upstream(LOGIN_FAILED_MESSAGE)
        }
    }
}
