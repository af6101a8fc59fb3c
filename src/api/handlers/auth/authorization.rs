//! Caller tier resolution.
//!
//! Flow Overview: read the session cookies, ask the identity provider for the
//! session behind them, then look up the profile `role` and map it to a tier.
//! Every failure resolves to [`Tier::Anonymous`]; this is an authorization
//! decision, never a request failure.

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use super::cookies;
use super::events::{self, EventCode, Operation};
use super::identity::{IdentityProvider, Session, User, with_timeout};
use super::profiles::{ProfileStore, ProfileStoreError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Anonymous,
    FreeUser,
    PremiumUser,
    LicenseUser,
}

impl Tier {
    /// Total mapping from a profile role. Anything unrecognized is a free user.
    #[must_use]
    pub fn from_role(role: Option<&str>) -> Self {
        match role {
            Some("premium") => Self::PremiumUser,
            Some("license") => Self::LicenseUser,
            _ => Self::FreeUser,
        }
    }

    /// Roles the mapping knows about, including the explicit free default.
    fn is_known_role(role: Option<&str>) -> bool {
        matches!(role, None | Some("" | "free" | "premium" | "license"))
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::FreeUser => "free_user",
            Self::PremiumUser => "premium_user",
            Self::LicenseUser => "license_user",
        }
    }
}

/// Resolved caller: tier plus the user and session it was derived from.
#[derive(Clone, Debug, PartialEq)]
pub struct Authorization {
    pub tier: Tier,
    pub user: Option<User>,
    pub session: Option<Session>,
}

impl Authorization {
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            tier: Tier::Anonymous,
            user: None,
            session: None,
        }
    }
}

pub struct AuthorizationResolver {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    timeout: Duration,
    production: bool,
}

impl AuthorizationResolver {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        timeout: Duration,
        production: bool,
    ) -> Self {
        Self {
            identity,
            profiles,
            timeout,
            production,
        }
    }

    #[must_use]
    pub fn profile_store_kind(&self) -> &'static str {
        self.profiles.kind()
    }

    /// Resolve the caller behind `headers`. Never fails.
    pub async fn resolve(&self, headers: &HeaderMap) -> Authorization {
        let Some(tokens) = cookies::read(headers) else {
            return Authorization::anonymous();
        };

        let lookup = with_timeout(self.timeout, self.identity.get_session(Some(&tokens)));
        let session = match lookup.await {
            Ok(Some(session)) => session,
            Ok(None) => return Authorization::anonymous(),
            Err(err) => {
                events::record_failure(
                    Operation::Authorization,
                    EventCode::SessionLookupFailed,
                    "Session lookup failed",
                    &err,
                    self.production,
                );
                return Authorization::anonymous();
            }
        };

        let lookup = with_profile_timeout(self.timeout, self.profiles.fetch_profile(&session));
        let profile = match lookup.await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                events::record_failure(
                    Operation::Authorization,
                    EventCode::ProfileNotFound,
                    "Profile not found",
                    &session.user.id,
                    self.production,
                );
                return Authorization::anonymous();
            }
            Err(err) => {
                events::record_failure(
                    Operation::Authorization,
                    EventCode::ProfileDatabaseError,
                    "Profile lookup failed",
                    &err,
                    self.production,
                );
                return Authorization::anonymous();
            }
        };

        let role = profile.role.as_deref();
        if !Tier::is_known_role(role) {
            events::record_rejection(
                Operation::Authorization,
                EventCode::UnknownRole,
                "Unrecognized profile role, treating as free user",
            );
        }

        Authorization {
            tier: Tier::from_role(role),
            user: Some(session.user.clone()),
            session: Some(session),
        }
    }
}

async fn with_profile_timeout<T, F>(limit: Duration, call: F) -> Result<T, ProfileStoreError>
where
    F: std::future::Future<Output = Result<T, ProfileStoreError>>,
{
    tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
        Err(ProfileStoreError::Database(format!(
            "profile lookup timed out after {}s",
            limit.as_secs()
        )))
    })
}
