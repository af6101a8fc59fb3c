//! Payment processor webhook receiver.
//!
//! Only the signature contract is enforced here. The `Stripe-Signature` header
//! carries `t=<unix seconds>` and one or more `v1=<hex>` entries, where `v1` is
//! `HMAC-SHA256(secret, "<t>.<raw body>")`. Timestamps older or newer than the
//! tolerance are rejected to limit replay.

use crate::api::handlers::auth::{
    ApiError,
    events::{self, EventCode, Operation},
};
use axum::{
    Json,
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;
use utoipa::ToSchema;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";
pub const SIGNATURE_TOLERANCE_SECONDS: i64 = 300;

pub struct BillingConfig {
    secret_key: SecretString,
    webhook_secret: SecretString,
}

impl std::fmt::Debug for BillingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingConfig")
            .field("secret_key", &"***")
            .field("webhook_secret", &"***")
            .finish()
    }
}

impl BillingConfig {
    #[must_use]
    pub fn new(secret_key: SecretString, webhook_secret: SecretString) -> Self {
        Self {
            secret_key,
            webhook_secret,
        }
    }

    /// Both credentials are needed before billing routes are mounted.
    #[must_use]
    pub fn from_options(
        secret_key: Option<SecretString>,
        webhook_secret: Option<SecretString>,
    ) -> Option<Self> {
        match (secret_key, webhook_secret) {
            (Some(secret_key), Some(webhook_secret))
                if !secret_key.expose_secret().is_empty()
                    && !webhook_secret.expose_secret().is_empty() =>
            {
                Some(Self::new(secret_key, webhook_secret))
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn secret_key(&self) -> &SecretString {
        &self.secret_key
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,
    #[error("malformed signature header")]
    MalformedSignature,
    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("invalid event payload")]
    InvalidPayload,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct WebhookAck {
    pub received: bool,
}

/// Check a signature header against the raw body.
///
/// # Errors
/// Returns a [`WebhookError`] describing why the signature was rejected.
pub fn verify_signature(
    header: &str,
    body: &[u8],
    secret: &[u8],
    now: i64,
) -> Result<(), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for item in header.split(',') {
        let Some((key, value)) = item.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedSignature)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedSignature);
    }
    if now.abs_diff(timestamp) > SIGNATURE_TOLERANCE_SECONDS.unsigned_abs() {
        return Err(WebhookError::StaleTimestamp);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| WebhookError::SignatureMismatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);

    let matched = signatures.iter().any(|signature| {
        hex::decode(signature).is_ok_and(|expected| mac.clone().verify_slice(&expected).is_ok())
    });
    if matched {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

/// Verify a delivery and return the event type.
///
/// # Errors
/// Returns a [`WebhookError`] for bad signatures or payloads.
pub fn verify_event(
    headers: &HeaderMap,
    body: &[u8],
    secret: &[u8],
    now: i64,
) -> Result<String, WebhookError> {
    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;
    verify_signature(header, body, secret, now)?;

    let event: Value = serde_json::from_slice(body).map_err(|_| WebhookError::InvalidPayload)?;
    event
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(WebhookError::InvalidPayload)
}

#[utoipa::path(
    post,
    path = "/api/billing/webhook",
    params(
        ("Stripe-Signature" = String, Header, description = "t=<unix>,v1=<hex hmac>")
    ),
    request_body(content = String, description = "Raw event payload", content_type = "application/json"),
    responses(
        (status = 200, description = "Event accepted", body = WebhookAck),
        (status = 400, description = "Signature rejected", body = crate::api::handlers::auth::ErrorBody)
    ),
    tag = "billing"
)]
pub async fn webhook(
    headers: HeaderMap,
    billing: Extension<Arc<BillingConfig>>,
    body: Bytes,
) -> Response {
    let secret = billing.webhook_secret.expose_secret().as_bytes();
    match verify_event(&headers, &body, secret, Utc::now().timestamp()) {
        Ok(event_type) => {
            events::record(
                Operation::Billing,
                EventCode::WebhookAccepted,
                &format!("Webhook event accepted: {event_type}"),
            );
            (StatusCode::OK, Json(WebhookAck { received: true })).into_response()
        }
        Err(err) => {
            events::record_rejection(
                Operation::Billing,
                EventCode::WebhookRejected,
                &format!("Webhook rejected: {err}"),
            );
            ApiError::Validation("Invalid webhook signature".to_string()).into_response()
        }
    }
}
