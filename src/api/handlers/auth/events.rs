//! Structured auth events.
//!
//! Every pipeline outcome emits exactly one `tracing` event carrying a numeric
//! `code`, its `category`, and the `operation` that produced it. Codes are
//! grouped by thousands: 1xxx success, 2xxx validation, 3xxx rate limiting,
//! 4xxx upstream, 5xxx unexpected, 6xxx authorization, 7xxx billing.

use std::fmt::Display;
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventCode {
    RegisterSuccess,
    LoginSuccess,
    LocalSessionCleared,
    RegisterPendingVerification,
    PasswordResetRequested,
    UpstreamSessionRevoked,
    MalformedBody,
    InvalidFieldTypes,
    ValidationFailed,
    RequestShapeRejected,
    RateLimited,
    SignUpFailed,
    SignUpNoUser,
    SignInNoUser,
    SignInNoSession,
    InvalidCredentials,
    EmailNotConfirmed,
    SignInFailed,
    SignOutFailed,
    ProfileDatabaseError,
    ProfileNotFound,
    PasswordResetFailed,
    SessionLookupFailed,
    Unexpected,
    AccessDenied,
    UnknownRole,
    WebhookRejected,
    WebhookAccepted,
}

impl EventCode {
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::RegisterSuccess => 1001,
            Self::LoginSuccess => 1002,
            Self::LocalSessionCleared => 1003,
            Self::RegisterPendingVerification => 1004,
            Self::PasswordResetRequested => 1005,
            Self::UpstreamSessionRevoked => 1006,
            Self::MalformedBody => 2001,
            Self::InvalidFieldTypes => 2002,
            Self::ValidationFailed => 2003,
            Self::RequestShapeRejected => 2004,
            Self::RateLimited => 3001,
            Self::SignUpFailed => 4001,
            Self::SignUpNoUser => 4002,
            Self::SignInNoUser => 4003,
            Self::SignInNoSession => 4004,
            Self::InvalidCredentials => 4005,
            Self::EmailNotConfirmed => 4006,
            Self::SignInFailed => 4007,
            Self::SignOutFailed => 4008,
            Self::ProfileDatabaseError => 4009,
            Self::ProfileNotFound => 4010,
            Self::PasswordResetFailed => 4011,
            Self::SessionLookupFailed => 4012,
            Self::Unexpected => 5001,
            Self::AccessDenied => 6001,
            Self::UnknownRole => 6002,
            Self::WebhookRejected => 7001,
            Self::WebhookAccepted => 7002,
        }
    }

    #[must_use]
    pub const fn category(self) -> &'static str {
        match self.code() / 1000 {
            1 => "AUTH",
            2 => "VALIDATION",
            3 => "RATE_LIMIT",
            4 => "UPSTREAM",
            6 => "AUTHORIZATION",
            7 => "BILLING",
            _ => "UNEXPECTED",
        }
    }
}

/// Operation the event belongs to, used as the `operation` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Register,
    Login,
    Logout,
    PasswordReset,
    Authorization,
    Billing,
    Request,
}

impl Operation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::PasswordReset => "password_reset",
            Self::Authorization => "authorization",
            Self::Billing => "billing",
            Self::Request => "request",
        }
    }
}

/// Record a successful or informational outcome.
pub fn record(operation: Operation, code: EventCode, message: &str) {
    info!(
        code = code.code(),
        category = code.category(),
        operation = operation.as_str(),
        "{message}"
    );
}

/// Record a caller-side rejection (validation, rate limit, authorization).
pub fn record_rejection(operation: Operation, code: EventCode, message: &str) {
    warn!(
        code = code.code(),
        category = code.category(),
        operation = operation.as_str(),
        "{message}"
    );
}

/// Record a failure. `detail` is only attached outside production.
pub fn record_failure(
    operation: Operation,
    code: EventCode,
    message: &str,
    detail: &dyn Display,
    production: bool,
) {
    if production {
        error!(
            code = code.code(),
            category = code.category(),
            operation = operation.as_str(),
            "{message}"
        );
    } else {
        error!(
            code = code.code(),
            category = code.category(),
            operation = operation.as_str(),
            detail = %detail,
            "{message}"
        );
    }
}
