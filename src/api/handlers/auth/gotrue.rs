//! REST identity provider speaking the GoTrue auth API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{Instrument, debug, info_span};
use url::Url;

use super::identity::{AuthResponse, IdentityError, IdentityProvider, Session, TokenPair, User};

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error_code: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_error(self, status: StatusCode) -> IdentityError {
        let message = self
            .msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| format!("identity provider returned {status}"));
        IdentityError::classify(self.error_code.as_deref(), &message)
    }
}

pub struct GoTrueProvider {
    client: Client,
    base_url: Url,
    anon_key: SecretString,
}

impl std::fmt::Debug for GoTrueProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoTrueProvider")
            .field("base_url", &self.base_url.as_str())
            .field("anon_key", &"***")
            .finish()
    }
}

impl GoTrueProvider {
    /// Build a provider for the backend at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(mut base_url: Url, anon_key: SecretString, timeout: Duration) -> anyhow::Result<Self> {
        // Endpoint paths are joined relative to the base.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url,
            anon_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, IdentityError> {
        self.base_url
            .join(path)
            .map_err(|err| IdentityError::Other(format!("invalid identity endpoint {path}: {err}")))
    }

    fn request(&self, method: reqwest::Method, url: Url, bearer: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(bearer)
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, IdentityError> {
        let span = info_span!("identity.request", identity.operation = operation);
        request
            .send()
            .instrument(span)
            .await
            .map_err(|err| IdentityError::Other(format!("{operation} request failed: {err}")))
    }

    async fn status_or_error(response: Response) -> Result<(), IdentityError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.json::<ErrorBody>().await.unwrap_or_default();
        Err(body.into_error(status))
    }

    async fn json_or_error(response: Response) -> Result<Value, IdentityError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .map_err(|err| IdentityError::Other(format!("invalid provider response: {err}")));
        }
        let body = response.json::<ErrorBody>().await.unwrap_or_default();
        Err(body.into_error(status))
    }

    async fn credential_call(
        &self,
        operation: &'static str,
        path: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthResponse, IdentityError> {
        let url = self.endpoint(path)?;
        let request = self
            .request(reqwest::Method::POST, url, self.anon_key.expose_secret())
            .json(&json!({ "email": email, "password": password.expose_secret() }));
        let response = self.send(operation, request).await?;
        let body = Self::json_or_error(response).await?;
        Ok(auth_response_from(&body))
    }
}

/// Map a sign-up or token body to user and session halves.
///
/// Sign-up returns a bare user object while verification is pending and a
/// full token body otherwise.
fn auth_response_from(body: &Value) -> AuthResponse {
    let user_value = body.get("user").unwrap_or(body);
    let user = serde_json::from_value::<User>(user_value.clone()).ok();

    let access = body.get("access_token").and_then(Value::as_str);
    let refresh = body.get("refresh_token").and_then(Value::as_str);
    let session = match (access, refresh, &user) {
        (Some(access), Some(refresh), Some(user)) => Some(Session {
            tokens: TokenPair::new(access, refresh),
            user: user.clone(),
        }),
        _ => None,
    };

    AuthResponse { user, session }
}

#[async_trait]
impl IdentityProvider for GoTrueProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthResponse, IdentityError> {
        self.credential_call("sign_up", "auth/v1/signup", email, password)
            .await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthResponse, IdentityError> {
        self.credential_call(
            "sign_in",
            "auth/v1/token?grant_type=password",
            email,
            password,
        )
        .await
    }

    async fn sign_out(&self, access_token: &SecretString) -> Result<(), IdentityError> {
        let url = self.endpoint("auth/v1/logout")?;
        let request = self.request(reqwest::Method::POST, url, access_token.expose_secret());
        let response = self.send("sign_out", request).await?;
        Self::status_or_error(response).await
    }

    async fn get_session(
        &self,
        tokens: Option<&TokenPair>,
    ) -> Result<Option<Session>, IdentityError> {
        let Some(tokens) = tokens else {
            return Ok(None);
        };
        let url = self.endpoint("auth/v1/user")?;
        let request = self.request(
            reqwest::Method::GET,
            url,
            tokens.access_token.expose_secret(),
        );
        let response = self.send("get_user", request).await?;
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            debug!("access token rejected by identity provider");
            return Ok(None);
        }
        let body = Self::json_or_error(response).await?;
        let user = serde_json::from_value::<User>(body)
            .map_err(|err| IdentityError::Other(format!("invalid user payload: {err}")))?;
        Ok(Some(Session {
            tokens: tokens.clone(),
            user,
        }))
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<(), IdentityError> {
        let url = self.endpoint("auth/v1/recover")?;
        let request = self
            .request(reqwest::Method::POST, url, self.anon_key.expose_secret())
            .json(&json!({ "email": email }));
        let response = self.send("recover", request).await?;
        Self::status_or_error(response).await
    }
}
