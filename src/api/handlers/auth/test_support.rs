//! Shared helpers for auth handler tests.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, header::COOKIE};
use secrecy::SecretString;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use super::identity::{AuthResponse, IdentityError, IdentityProvider, Session, TokenPair, User};
use super::profiles::{Profile, ProfileStore, ProfileStoreError};
use super::rate_limit::RateLimiter;
use super::state::{AuthConfig, AuthState};

pub(crate) const TEST_USER_ID: &str = "0b6f7c1e-3a52-4d8e-9f3b-6c1d2e4f5a60";

pub(crate) fn test_user() -> User {
    User {
        id: TEST_USER_ID.to_string(),
        email: Some("new@example.com".to_string()),
    }
}

pub(crate) fn test_session() -> Session {
    Session {
        tokens: TokenPair::new("access-token", "refresh-token"),
        user: test_user(),
    }
}

/// Request headers of a browser holding the test session.
pub(crate) fn session_cookie_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        COOKIE,
        HeaderValue::from_static("sb-access-token=access-token; sb-refresh-token=refresh-token"),
    );
    headers
}

/// Scripted identity provider that records which operations were called.
pub(crate) struct MockIdentity {
    pub sign_up: Result<AuthResponse, IdentityError>,
    pub sign_in: Result<AuthResponse, IdentityError>,
    pub sign_out: Result<(), IdentityError>,
    pub session: Result<Option<Session>, IdentityError>,
    pub reset: Result<(), IdentityError>,
    pub delay: Option<Duration>,
    pub(crate) calls: Mutex<Vec<&'static str>>,
}

impl Default for MockIdentity {
    fn default() -> Self {
        Self {
            sign_up: Ok(AuthResponse::default()),
            sign_in: Ok(AuthResponse::default()),
            sign_out: Ok(()),
            session: Ok(None),
            reset: Ok(()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockIdentity {
    pub(crate) fn with_live_session() -> Self {
        Self {
            session: Ok(Some(test_session())),
            ..Self::default()
        }
    }

    pub(crate) fn with_session_lookup_error() -> Self {
        Self {
            session: Err(IdentityError::Other("connection refused".to_string())),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn get_session_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == "get_session")
            .count()
    }

    async fn record<T: Clone>(&self, call: &'static str, result: &T) -> T {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        result.clone()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn sign_up(
        &self,
        _email: &str,
        _password: &SecretString,
    ) -> Result<AuthResponse, IdentityError> {
        self.record("sign_up", &self.sign_up).await
    }

    async fn sign_in_with_password(
        &self,
        _email: &str,
        _password: &SecretString,
    ) -> Result<AuthResponse, IdentityError> {
        self.record("sign_in_with_password", &self.sign_in).await
    }

    async fn sign_out(&self, _access_token: &SecretString) -> Result<(), IdentityError> {
        self.record("sign_out", &self.sign_out).await
    }

    async fn get_session(
        &self,
        _tokens: Option<&TokenPair>,
    ) -> Result<Option<Session>, IdentityError> {
        self.record("get_session", &self.session).await
    }

    async fn reset_password_for_email(&self, _email: &str) -> Result<(), IdentityError> {
        self.record("reset_password_for_email", &self.reset).await
    }
}

/// Profile store returning a fixed result and counting lookups.
pub(crate) struct MockProfiles {
    result: Result<Option<Profile>, ProfileStoreError>,
    calls: AtomicUsize,
}

impl MockProfiles {
    pub(crate) fn with_role(role: Option<&str>) -> Self {
        Self::returning(Ok(Some(Profile {
            role: role.map(str::to_string),
        })))
    }

    pub(crate) fn missing() -> Self {
        Self::returning(Ok(None))
    }

    pub(crate) fn failing() -> Self {
        Self::returning(Err(ProfileStoreError::Database(
            "relation \"profiles\" does not exist".to_string(),
        )))
    }

    fn returning(result: Result<Option<Profile>, ProfileStoreError>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for MockProfiles {
    async fn fetch_profile(
        &self,
        _session: &Session,
    ) -> Result<Option<Profile>, ProfileStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }

    fn kind(&self) -> &'static str {
        "mock"
    }
}

pub(crate) fn auth_state(identity: Arc<MockIdentity>, profiles: Arc<MockProfiles>) -> Arc<AuthState> {
    Arc::new(AuthState::new(
        AuthConfig::new(false)
            .with_identity_timeout(Duration::from_secs(5))
            .with_trust_proxy_headers(true),
        Arc::new(RateLimiter::in_memory()),
        identity,
        profiles,
    ))
}

/// JSON log capture for asserting emitted event codes.
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Route this thread's events into the buffer until the guard drops.
    pub(crate) fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Event codes in emission order.
    pub(crate) fn codes(&self) -> Vec<u64> {
        let buffer = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
            .filter_map(|event| event["fields"]["code"].as_u64())
            .collect()
    }

    pub(crate) fn contents(&self) -> String {
        let buffer = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
