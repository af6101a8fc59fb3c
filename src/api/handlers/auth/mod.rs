//! Auth handlers and supporting modules.
//!
//! This module owns the session and authorization core: rate limiting, input
//! validation, the identity provider contract, session cookies, tier
//! resolution and the access guard for tier-gated routes.
//!
//! ## Request pipeline
//!
//! `register`, `login` and `logout` run the same linear sequence, stopping at
//! the first failure:
//!
//! 1. rate check (`429` with `X-RateLimit-*` and `Retry-After`)
//! 2. request shape check and body parsing (skipped for logout, `400`)
//! 3. structural then semantic validation (skipped for logout, `400`)
//! 4. identity provider call, bounded by the configured timeout
//! 5. cookies written or cleared, `302` to `/`
//!
//! Logout always clears both cookies, even when the upstream sign-out fails.
//!
//! ## Rate limits
//!
//! Fixed one-hour windows per client: registration 5, login 10, logout 30,
//! password reset 3. Expired windows are swept every 15 minutes.

pub(crate) mod authorization;
pub(crate) mod cookies;
pub(crate) mod errors;
pub(crate) mod events;
pub(crate) mod gotrue;
pub(crate) mod guard;
pub(crate) mod identity;
pub(crate) mod login;
pub(crate) mod logout;
pub(crate) mod password_reset;
mod pipeline;
pub(crate) mod profiles;
pub(crate) mod rate_limit;
pub(crate) mod register;
mod request;
pub(crate) mod session;
mod state;
pub(crate) mod validation;

pub use authorization::{Authorization, AuthorizationResolver, Tier};
pub use errors::{ApiError, ErrorBody};
pub use gotrue::GoTrueProvider;
pub use guard::{AccessGuard, AuthContext, access_guard};
pub use identity::{IdentityError, IdentityProvider};
pub use profiles::{PgProfileStore, ProfileStore, RestProfileStore};
pub use rate_limit::{RateLimiter, SWEEP_INTERVAL, spawn_sweeper};
pub use request::{CredentialsRequest, PasswordResetRequest};
pub use state::{AuthConfig, AuthState};

#[cfg(test)]
pub(crate) mod test_support;
