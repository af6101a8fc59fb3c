//! Auth state and configuration shared by the handlers.

use std::sync::Arc;
use std::time::Duration;

use super::authorization::{AuthorizationResolver, Tier};
use super::cookies::CookieOptions;
use super::guard::AccessGuard;
use super::identity::IdentityProvider;
use super::profiles::ProfileStore;
use super::rate_limit::RateLimiter;

const DEFAULT_IDENTITY_TIMEOUT_SECONDS: u64 = 5;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    production: bool,
    identity_timeout: Duration,
    trust_proxy_headers: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(production: bool) -> Self {
        Self {
            production,
            identity_timeout: Duration::from_secs(DEFAULT_IDENTITY_TIMEOUT_SECONDS),
            trust_proxy_headers: false,
        }
    }

    /// Key rate limits on `X-Forwarded-For`/`X-Real-IP` instead of the peer
    /// address. Only safe behind a proxy that overwrites those headers.
    #[must_use]
    pub fn with_trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    #[must_use]
    pub fn with_identity_timeout(mut self, timeout: Duration) -> Self {
        self.identity_timeout = timeout;
        self
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.production
    }

    #[must_use]
    pub fn trust_proxy_headers(&self) -> bool {
        self.trust_proxy_headers
    }

    #[must_use]
    pub fn identity_timeout(&self) -> Duration {
        self.identity_timeout
    }

    #[must_use]
    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions::new(self.production)
    }
}

pub struct AuthState {
    config: AuthConfig,
    rate_limiter: Arc<RateLimiter>,
    identity: Arc<dyn IdentityProvider>,
    resolver: Arc<AuthorizationResolver>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        rate_limiter: Arc<RateLimiter>,
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        let resolver = Arc::new(AuthorizationResolver::new(
            identity.clone(),
            profiles,
            config.identity_timeout(),
            config.is_production(),
        ));
        Self {
            config,
            rate_limiter,
            identity,
            resolver,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<AuthorizationResolver> {
        &self.resolver
    }

    /// Guard admitting only the given tiers.
    #[must_use]
    pub fn guard(&self, allowed: &[Tier]) -> AccessGuard {
        AccessGuard::new(allowed, self.resolver.clone())
    }
}
