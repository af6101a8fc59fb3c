//! Profile store lookups for the caller's `role`.
//!
//! Two backends: direct Postgres access through `sqlx`, or the backend's REST
//! interface using the caller's own access token (row-level security applies).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{Instrument, info_span};
use url::Url;
use uuid::Uuid;

use super::identity::Session;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileStoreError {
    #[error("profile store error: {0}")]
    Database(String),
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Single-row lookup keyed by the session's user id.
    async fn fetch_profile(&self, session: &Session) -> Result<Option<Profile>, ProfileStoreError>;

    /// Backend name reported by `/health`.
    fn kind(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn fetch_profile(&self, session: &Session) -> Result<Option<Profile>, ProfileStoreError> {
        // Ids that are not UUIDs cannot match a row.
        let Ok(user_id) = Uuid::parse_str(&session.user.id) else {
            return Ok(None);
        };
        let query = "SELECT role FROM profiles WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT"
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| ProfileStoreError::Database(err.to_string()))?;

        row.map(|row| {
            row.try_get::<Option<String>, _>("role")
                .map(|role| Profile { role })
                .map_err(|err| ProfileStoreError::Database(err.to_string()))
        })
        .transpose()
    }

    fn kind(&self) -> &'static str {
        "postgres"
    }
}

pub struct RestProfileStore {
    client: Client,
    base_url: Url,
    anon_key: SecretString,
}

impl std::fmt::Debug for RestProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestProfileStore")
            .field("base_url", &self.base_url.as_str())
            .field("anon_key", &"***")
            .finish()
    }
}

impl RestProfileStore {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(mut base_url: Url, anon_key: SecretString, timeout: Duration) -> anyhow::Result<Self> {
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
}

#[async_trait]
impl ProfileStore for RestProfileStore {
    async fn fetch_profile(&self, session: &Session) -> Result<Option<Profile>, ProfileStoreError> {
        let mut url = self
            .base_url
            .join("rest/v1/profiles")
            .map_err(|err| ProfileStoreError::Database(err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{}", session.user.id))
            .append_pair("select", "role");

        let span = info_span!("db.query", db.system = "postgrest", db.operation = "SELECT");
        let response = self
            .client
            .get(url)
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(session.tokens.access_token.expose_secret())
            .send()
            .instrument(span)
            .await
            .map_err(|err| ProfileStoreError::Database(err.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(ProfileStoreError::Database(format!(
                "profile lookup returned {}",
                response.status()
            )));
        }

        let rows = response
            .json::<Vec<Profile>>()
            .await
            .map_err(|err| ProfileStoreError::Database(err.to_string()))?;
        Ok(rows.into_iter().next())
    }

    fn kind(&self) -> &'static str {
        "rest"
    }
}
