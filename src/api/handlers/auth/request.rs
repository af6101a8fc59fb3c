//! Request shape checks, body parsing and client identification.

use axum::{
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{
        HeaderMap,
        header::{CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT},
        request::Parts,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use utoipa::ToSchema;

use super::events::EventCode;
use super::validation::RawInput;

pub const MAX_BODY_BYTES: usize = 16 * 1024;

/// Credential body as documented; the handlers accept it as JSON or form data.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Form,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Request body too large")]
    TooLarge,
    #[error("User-Agent header is required")]
    MissingUserAgent,
    #[error("Content-Type must be application/json or application/x-www-form-urlencoded")]
    UnsupportedContentType,
    #[error("Malformed request body")]
    Malformed,
}

impl InputError {
    #[must_use]
    pub const fn event_code(&self) -> EventCode {
        match self {
            Self::Malformed => EventCode::MalformedBody,
            Self::TooLarge | Self::MissingUserAgent | Self::UnsupportedContentType => {
                EventCode::RequestShapeRejected
            }
        }
    }
}

/// Basic size, user-agent and content-type checks.
///
/// # Errors
/// Returns the first shape violation found.
pub fn check_shape(headers: &HeaderMap) -> Result<BodyFormat, InputError> {
    let declared_length = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<usize>().ok());
    if declared_length.is_some_and(|length| length > MAX_BODY_BYTES) {
        return Err(InputError::TooLarge);
    }

    let has_user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| !value.trim().is_empty());
    if !has_user_agent {
        return Err(InputError::MissingUserAgent);
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();
    match content_type.as_str() {
        "application/json" => Ok(BodyFormat::Json),
        "application/x-www-form-urlencoded" => Ok(BodyFormat::Form),
        _ => Err(InputError::UnsupportedContentType),
    }
}

/// Shape-check the request, then read and parse its body.
///
/// # Errors
/// Returns an [`InputError`] for shape violations or unparseable bodies.
pub async fn read_input(headers: &HeaderMap, body: Body) -> Result<RawInput, InputError> {
    let format = check_shape(headers)?;
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| InputError::TooLarge)?;
    parse_body(format, &bytes)
}

/// Parse a JSON or form-encoded body into untyped fields.
///
/// # Errors
/// Returns [`InputError::Malformed`] if the body cannot be parsed.
pub fn parse_body(format: BodyFormat, bytes: &[u8]) -> Result<RawInput, InputError> {
    match format {
        BodyFormat::Json => {
            let value: Value = serde_json::from_slice(bytes).map_err(|_| InputError::Malformed)?;
            let Value::Object(mut fields) = value else {
                return Ok(RawInput::default());
            };
            let confirm_password = fields
                .remove("confirmPassword")
                .or_else(|| fields.remove("confirm_password"));
            Ok(RawInput {
                email: fields.remove("email"),
                password: fields.remove("password"),
                confirm_password,
            })
        }
        BodyFormat::Form => {
            let text = std::str::from_utf8(bytes).map_err(|_| InputError::Malformed)?;
            let mut input = RawInput::default();
            for (key, value) in url::form_urlencoded::parse(text.as_bytes()) {
                let value = Some(Value::String(value.into_owned()));
                match key.as_ref() {
                    "email" => input.email = value,
                    "password" => input.password = value,
                    "confirmPassword" | "confirm_password" => input.confirm_password = value,
                    _ => {}
                }
            }
            Ok(input)
        }
    }
}

/// Extract a client IP for rate limiting from common proxy headers.
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Rate-limit identifier: proxy headers when trusted, then the peer address,
/// then `unknown`.
#[must_use]
pub fn client_identifier(parts: &Parts, trust_proxy_headers: bool) -> String {
    trust_proxy_headers
        .then(|| extract_client_ip(&parts.headers))
        .flatten()
        .or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};
    use serde_json::json;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("test-agent/1.0"));
        if let Ok(value) = HeaderValue::from_str(content_type) {
            headers.insert(CONTENT_TYPE, value);
        }
        headers
    }

    #[test]
    fn shape_accepts_json_and_form() {
        assert_eq!(
            check_shape(&headers("application/json; charset=utf-8")),
            Ok(BodyFormat::Json)
        );
        assert_eq!(
            check_shape(&headers("application/x-www-form-urlencoded")),
            Ok(BodyFormat::Form)
        );
    }

    #[test]
    fn shape_rejects_bad_requests() {
        assert_eq!(
            check_shape(&headers("text/plain")),
            Err(InputError::UnsupportedContentType)
        );

        let mut no_agent = headers("application/json");
        no_agent.remove(USER_AGENT);
        assert_eq!(check_shape(&no_agent), Err(InputError::MissingUserAgent));

        let mut too_large = headers("application/json");
        too_large.insert(CONTENT_LENGTH, HeaderValue::from_static("16385"));
        assert_eq!(check_shape(&too_large), Err(InputError::TooLarge));
        assert_eq!(
            InputError::TooLarge.event_code(),
            EventCode::RequestShapeRejected
        );
    }

    #[test]
    fn json_body_keeps_raw_values() {
        let body = json!({"email": "a@example.com", "password": 7, "confirmPassword": "x"});
        let input = parse_body(BodyFormat::Json, body.to_string().as_bytes());
        assert_eq!(
            input,
            Ok(RawInput {
                email: Some(json!("a@example.com")),
                password: Some(json!(7)),
                confirm_password: Some(json!("x")),
            })
        );
    }

    #[test]
    fn json_body_that_is_not_an_object_has_no_fields() {
        assert_eq!(
            parse_body(BodyFormat::Json, b"[1, 2]"),
            Ok(RawInput::default())
        );
    }

    #[test]
    fn malformed_json_is_rejected() {
        let result = parse_body(BodyFormat::Json, b"{\"email\":");
        assert_eq!(result, Err(InputError::Malformed));
        assert_eq!(InputError::Malformed.event_code(), EventCode::MalformedBody);
    }

    #[test]
    fn form_body_is_decoded() {
        let input = parse_body(
            BodyFormat::Form,
            b"email=a%40example.com&password=Pass+word1%21&confirm_password=Pass+word1%21",
        );
        assert_eq!(
            input,
            Ok(RawInput {
                email: Some(json!("a@example.com")),
                password: Some(json!("Pass word1!")),
                confirm_password: Some(json!("Pass word1!")),
            })
        );
    }

    #[test]
    fn client_identifier_prefers_trusted_proxy_headers() -> anyhow::Result<()> {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .header("x-real-ip", "198.51.100.2")
            .body(())?;
        let (mut parts, ()) = request.into_parts();
        assert_eq!(client_identifier(&parts, true), "203.0.113.9");

        parts.headers.remove("x-forwarded-for");
        assert_eq!(client_identifier(&parts, true), "198.51.100.2");

        parts.headers.remove("x-real-ip");
        assert_eq!(client_identifier(&parts, true), "unknown");

        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 7], 4242))));
        assert_eq!(client_identifier(&parts, true), "192.0.2.7");
        Ok(())
    }

    #[test]
    fn untrusted_proxy_headers_fall_back_to_peer() -> anyhow::Result<()> {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.9")
            .header("x-real-ip", "198.51.100.2")
            .body(())?;
        let (mut parts, ()) = request.into_parts();
        assert_eq!(client_identifier(&parts, false), "unknown");

        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 7], 4242))));
        assert_eq!(client_identifier(&parts, false), "192.0.2.7");
        Ok(())
    }
}
