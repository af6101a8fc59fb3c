//! JSON error responses for the auth surface.
//!
//! Every error renders `{error, message, statusCode, timestamp}` plus the
//! hardening header set. Messages are client-safe; upstream detail is only
//! ever logged.

use axum::{
    Json,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::rate_limit::RateLimitStatus;

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password.";
pub const EMAIL_NOT_CONFIRMED_MESSAGE: &str =
    "Please confirm your email address before signing in.";
pub const FORBIDDEN_MESSAGE: &str = "Forbidden: Access denied";
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please try again later.";
pub const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

const SECURITY_HEADERS: [(&str, &str); 6] = [
    (
        "content-security-policy",
        "default-src 'self'; frame-ancestors 'none'; base-uri 'self'; form-action 'self'",
    ),
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("x-xss-protection", "1; mode=block"),
    (
        "permissions-policy",
        "camera=(), microphone=(), geolocation=()",
    ),
];

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub status_code: u16,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    RateLimited(RateLimitStatus),
    Validation(String),
    InvalidCredentials,
    EmailNotConfirmed,
    Forbidden,
    /// Identity or profile backend failure; the message is already generic.
    Upstream(&'static str),
    Internal,
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::EmailNotConfirmed => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Upstream(_) | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "RATE_LIMIT_EXCEEDED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::EmailNotConfirmed => "EMAIL_NOT_CONFIRMED",
            Self::Forbidden => "INSUFFICIENT_PERMISSIONS",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::RateLimited(_) => RATE_LIMITED_MESSAGE,
            Self::Validation(message) => message,
            Self::InvalidCredentials => INVALID_CREDENTIALS_MESSAGE,
            Self::EmailNotConfirmed => EMAIL_NOT_CONFIRMED_MESSAGE,
            Self::Forbidden => FORBIDDEN_MESSAGE,
            Self::Upstream(message) => message,
            Self::Internal => UNEXPECTED_MESSAGE,
        }
    }

    fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code().to_string(),
            message: self.message().to_string(),
            status_code: self.status().as_u16(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        apply_security_headers(&mut headers);
        if let Self::RateLimited(status) = &self {
            apply_rate_limit_headers(&mut headers, status);
        }
        (self.status(), headers, Json(self.body())).into_response()
    }
}

/// Insert the hardening header set.
pub fn apply_security_headers(headers: &mut HeaderMap) {
    for (name, value) in SECURITY_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, status: &RateLimitStatus) {
    let now = Utc::now();
    let values = [
        ("x-ratelimit-limit", status.limit.to_string()),
        (
            "x-ratelimit-remaining",
            status.remaining_attempts.to_string(),
        ),
        ("x-ratelimit-reset", status.reset_time.timestamp().to_string()),
    ];
    for (name, value) in values {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
    if let Ok(value) = HeaderValue::from_str(&status.retry_after_seconds(now).to_string()) {
        headers.insert(RETRY_AFTER, value);
    }
}
