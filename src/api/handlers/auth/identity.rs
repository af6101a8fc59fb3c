//! Identity provider contract consumed by the auth pipeline.
//!
//! The provider owns credential storage, verification and token issuance. The
//! pipeline only needs sign-up, password sign-in, sign-out, session lookup and
//! password-reset mail. Provider failures are classified here, at the boundary,
//! so handlers branch over a closed set of variants instead of message text.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Access/refresh token pair as carried in the session cookies.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

impl TokenPair {
    #[must_use]
    pub fn new(access_token: &str, refresh_token: &str) -> Self {
        Self {
            access_token: SecretString::from(access_token),
            refresh_token: SecretString::from(refresh_token),
        }
    }
}

impl PartialEq for TokenPair {
    fn eq(&self, other: &Self) -> bool {
        self.access_token.expose_secret() == other.access_token.expose_secret()
            && self.refresh_token.expose_secret() == other.refresh_token.expose_secret()
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub tokens: TokenPair,
    pub user: User,
}

/// Result of sign-up / sign-in. Either half may be absent on success.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthResponse {
    pub user: Option<User>,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid login credentials")]
    InvalidCredentials,
    #[error("email not confirmed")]
    EmailNotConfirmed,
    #[error("{0}")]
    Other(String),
}

impl IdentityError {
    /// Classify a provider error from its machine code, falling back to the message.
    ///
    /// Message matching is a fallback for providers that omit codes; wording
    /// changes upstream degrade to [`IdentityError::Other`].
    #[must_use]
    pub fn classify(error_code: Option<&str>, message: &str) -> Self {
        match error_code {
            Some("invalid_credentials") => return Self::InvalidCredentials,
            Some("email_not_confirmed") => return Self::EmailNotConfirmed,
            _ => {}
        }
        let lowered = message.to_lowercase();
        if lowered.contains("invalid login credentials") {
            Self::InvalidCredentials
        } else if lowered.contains("email not confirmed") {
            Self::EmailNotConfirmed
        } else {
            Self::Other(message.to_string())
        }
    }

    #[must_use]
    pub fn timed_out(after: Duration) -> Self {
        Self::Other(format!("identity provider timed out after {}s", after.as_secs()))
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthResponse, IdentityError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthResponse, IdentityError>;

    async fn sign_out(&self, access_token: &SecretString) -> Result<(), IdentityError>;

    /// Resolve cookie tokens into a live session; `Ok(None)` when there is none.
    async fn get_session(&self, tokens: Option<&TokenPair>)
    -> Result<Option<Session>, IdentityError>;

    async fn reset_password_for_email(&self, email: &str) -> Result<(), IdentityError>;
}

/// Bound a provider call by `limit`; expiry becomes [`IdentityError::Other`].
///
/// # Errors
/// Returns the call's own error, or a timeout error.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, IdentityError>
where
    F: std::future::Future<Output = Result<T, IdentityError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(IdentityError::timed_out(limit)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_prefers_error_code() {
        assert_eq!(
            IdentityError::classify(Some("invalid_credentials"), "whatever"),
            IdentityError::InvalidCredentials
        );
        assert_eq!(
            IdentityError::classify(Some("email_not_confirmed"), ""),
            IdentityError::EmailNotConfirmed
        );
    }

    #[test]
    fn classify_falls_back_to_message() {
        assert_eq!(
            IdentityError::classify(None, "Invalid login credentials"),
            IdentityError::InvalidCredentials
        );
        assert_eq!(
            IdentityError::classify(Some("unknown"), "Email not confirmed"),
            IdentityError::EmailNotConfirmed
        );
        assert_eq!(
            IdentityError::classify(None, "Database error saving new user"),
            IdentityError::Other("Database error saving new user".to_string())
        );
    }

    #[test]
    fn token_pair_debug_is_redacted() {
        let pair = TokenPair::new("tok-access", "tok-refresh");
        let debug = format!("{pair:?}");
        assert!(!debug.contains("tok-"));
        assert!(debug.contains("***"));
    }

    #[tokio::test]
    async fn with_timeout_maps_elapsed_to_other() {
        let result: Result<(), IdentityError> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(IdentityError::Other(message)) if message.contains("timed out")));
    }
}
