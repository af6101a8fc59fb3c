//! Password reset request endpoint.
//!
//! The answer is the same whether or not the account exists.

use axum::{
    Json,
    extract::{Extension, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::errors::{ApiError, ErrorBody};
use super::events::{self, EventCode, Operation};
use super::identity::with_timeout;
use super::pipeline;
use super::rate_limit::OperationType;
use super::request::{PasswordResetRequest, client_identifier};
use super::state::AuthState;
use super::validation::{validate_email, validate_email_structure};

pub const PASSWORD_RESET_MESSAGE: &str =
    "If an account exists for that email, a password reset link has been sent.";

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct PasswordResetResponse {
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/password-reset",
    request_body(
        content = PasswordResetRequest,
        description = "JSON or form-encoded email",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Reset requested", body = PasswordResetResponse),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn password_reset(auth_state: Extension<Arc<AuthState>>, request: Request) -> Response {
    pipeline::respond(password_reset_pipeline(&auth_state, request).await)
}

async fn password_reset_pipeline(
    state: &AuthState,
    request: Request,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();

    let client = client_identifier(&parts, state.config().trust_proxy_headers());
    pipeline::rate_check(
        state,
        OperationType::PasswordReset,
        Operation::PasswordReset,
        &client,
    )?;

    let raw = pipeline::read_raw_input(Operation::PasswordReset, &parts.headers, body).await?;
    let email = validate_email_structure(raw).map_err(|err| {
        events::record_rejection(
            Operation::PasswordReset,
            EventCode::InvalidFieldTypes,
            &err.to_string(),
        );
        ApiError::Validation(err.to_string())
    })?;
    let email = validate_email(&email).map_err(|err| {
        events::record_rejection(
            Operation::PasswordReset,
            EventCode::ValidationFailed,
            "Validation failed on email",
        );
        ApiError::Validation(err.message)
    })?;

    let requested = with_timeout(
        state.config().identity_timeout(),
        state.identity().reset_password_for_email(&email),
    )
    .await;
    match requested {
        Ok(()) => events::record(
            Operation::PasswordReset,
            EventCode::PasswordResetRequested,
            "Password reset requested",
        ),
        Err(err) => events::record_failure(
            Operation::PasswordReset,
            EventCode::PasswordResetFailed,
            "Password reset request failed",
            &err,
            state.config().is_production(),
        ),
    }

    Ok((
        StatusCode::OK,
        Json(PasswordResetResponse {
            message: PASSWORD_RESET_MESSAGE.to_string(),
        }),
    )
        .into_response())
}
