//! Tier-gated routes.
//!
//! These handlers only run after [`access_guard`] admitted the caller, so they
//! read the [`AuthContext`] extension instead of resolving the session again.

use super::auth::{AccessGuard, AuthContext, AuthState, Tier, access_guard, identity::User};
use axum::{
    Json, Router,
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode, header::CACHE_CONTROL},
    middleware,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};

pub const ACCOUNT_TIERS: &[Tier] = &[Tier::FreeUser, Tier::PremiumUser, Tier::LicenseUser];
pub const PREMIUM_TIERS: &[Tier] = &[Tier::PremiumUser, Tier::LicenseUser];

const PREMIUM_FEATURES: &[&str] = &["advanced_search", "bulk_export", "priority_support"];
const LICENSE_FEATURES: &[&str] = &["commercial_use"];

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct AccountResponse {
    pub user: User,
    pub tier: Tier,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct FeaturesResponse {
    pub tier: Tier,
    pub features: Vec<String>,
}

fn no_store() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers
}

pub async fn account(Extension(context): Extension<AuthContext>) -> impl IntoResponse {
    (
        StatusCode::OK,
        no_store(),
        Json(AccountResponse {
            user: context.user,
            tier: context.tier,
        }),
    )
}

pub async fn premium_features(Extension(context): Extension<AuthContext>) -> impl IntoResponse {
    let mut features: Vec<String> = PREMIUM_FEATURES.iter().map(ToString::to_string).collect();
    if context.tier == Tier::LicenseUser {
        features.extend(LICENSE_FEATURES.iter().map(ToString::to_string));
    }
    (
        StatusCode::OK,
        no_store(),
        Json(FeaturesResponse {
            tier: context.tier,
            features,
        }),
    )
}

fn guarded(router: Router, guard: AccessGuard) -> Router {
    router.route_layer(middleware::from_fn_with_state(guard, access_guard))
}

/// Routes behind the access guard, each with its own tier allow-list.
#[must_use]
pub fn router(auth_state: &AuthState) -> Router {
    let account_routes = guarded(
        Router::new().route("/api/account", get(account)),
        auth_state.guard(ACCOUNT_TIERS),
    );
    let premium_routes = guarded(
        Router::new().route("/api/premium/features", get(premium_features)),
        auth_state.guard(PREMIUM_TIERS),
    );
    account_routes.merge(premium_routes)
}
