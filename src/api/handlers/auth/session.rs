//! Session introspection for the frontend.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode, header::CACHE_CONTROL},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::authorization::Tier;
use super::identity::User;
use super::state::AuthState;

#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq)]
pub struct SessionResponse {
    pub tier: Tier,
    pub user: Option<User>,
}

#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses(
        (status = 200, description = "Resolved caller; anonymous when there is no session", body = SessionResponse)
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let resolved = auth_state.resolver().resolve(&headers).await;
    let mut response_headers = HeaderMap::new();
    response_headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    (
        StatusCode::OK,
        response_headers,
        Json(SessionResponse {
            tier: resolved.tier,
            user: resolved.user,
        }),
    )
}
