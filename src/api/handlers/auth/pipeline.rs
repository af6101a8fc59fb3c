//! Steps shared by the auth endpoints.
//!
//! Each endpoint runs a strictly linear sequence: rate check, shape check,
//! parse and validate, identity call, respond. The helpers here implement the
//! common steps and log each rejection with its event code before returning
//! the client-facing [`ApiError`].

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use std::fmt::Display;

use super::errors::ApiError;
use super::events::{self, EventCode, Operation};
use super::rate_limit::OperationType;
use super::request::read_input;
use super::state::AuthState;
use super::validation::{
    CredentialKind, Credentials, RawInput, validate_semantics, validate_structure,
};

/// Count this attempt and stop the request if the caller is over the limit.
///
/// # Errors
/// Returns [`ApiError::RateLimited`] with the window metadata.
pub fn rate_check(
    state: &AuthState,
    operation_type: OperationType,
    operation: Operation,
    identifier: &str,
) -> Result<(), ApiError> {
    let status = state.rate_limiter().check(operation_type, identifier);
    if status.is_limited {
        events::record_rejection(operation, EventCode::RateLimited, "Rate limit exceeded");
        return Err(ApiError::RateLimited(status));
    }
    Ok(())
}

/// Shape-check and parse the body, logging rejections.
///
/// # Errors
/// Returns [`ApiError::Validation`] for shape or parse failures.
pub async fn read_raw_input(
    operation: Operation,
    headers: &HeaderMap,
    body: Body,
) -> Result<RawInput, ApiError> {
    read_input(headers, body).await.map_err(|err| {
        events::record_rejection(operation, err.event_code(), &err.to_string());
        ApiError::Validation(err.to_string())
    })
}

/// Shape check, parse, structural and semantic validation.
///
/// # Errors
/// Returns [`ApiError::Validation`] carrying the first violated rule.
pub async fn read_credentials(
    operation: Operation,
    kind: CredentialKind,
    headers: &HeaderMap,
    body: Body,
) -> Result<Credentials, ApiError> {
    let raw = read_raw_input(operation, headers, body).await?;

    let fields = validate_structure(raw).map_err(|err| {
        events::record_rejection(operation, EventCode::InvalidFieldTypes, &err.to_string());
        ApiError::Validation(err.to_string())
    })?;

    validate_semantics(kind, fields).map_err(|err| {
        events::record_rejection(
            operation,
            EventCode::ValidationFailed,
            &format!("Validation failed on {}", err.field),
        );
        ApiError::Validation(err.message)
    })
}

/// Log an unforeseen failure and reduce it to the generic 500.
pub fn unexpected(operation: Operation, detail: &dyn Display, production: bool) -> ApiError {
    events::record_failure(
        operation,
        EventCode::Unexpected,
        "Unexpected error",
        detail,
        production,
    );
    ApiError::Internal
}

/// `302 Found` to the application root, carrying any cookies already set.
#[must_use]
pub fn redirect_home(mut headers: HeaderMap) -> Response {
    headers.insert(LOCATION, HeaderValue::from_static("/"));
    (StatusCode::FOUND, headers).into_response()
}

/// Collapse the pipeline result into a response.
pub fn respond(result: Result<Response, ApiError>) -> Response {
    result.unwrap_or_else(IntoResponse::into_response)
}
