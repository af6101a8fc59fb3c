use crate::api::handlers::{
    auth::{
        self, ApiError, AuthState,
        events::{self, EventCode, Operation},
    },
    billing::BillingConfig,
    health, premium,
};
use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    response::{IntoResponse, Response},
    routing::options,
};
use std::{any::Any, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;

pub mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Assemble the full application: documented routes, the optional billing
/// webhook, tier-gated routes and the shared middleware stack.
#[must_use]
pub fn app(auth_state: Arc<AuthState>, billing: Option<Arc<BillingConfig>>) -> Router {
    let documented = match billing.as_ref() {
        Some(_) => router().merge(openapi::billing_router()),
        None => router(),
    };
    let (router, _openapi) = documented.split_for_parts();

    let production = auth_state.config().is_production();
    let mut app = router
        .route("/health", options(health::health))
        .merge(premium::router(&auth_state));

    if let Some(billing) = billing {
        app = app.layer(Extension(billing));
    }

    app.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static(REQUEST_ID_HEADER),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                REQUEST_ID_HEADER,
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(CatchPanicLayer::custom(
                move |panic: Box<dyn Any + Send + 'static>| panic_response(panic, production),
            ))
            .layer(Extension(auth_state)),
    )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    auth_state: Arc<AuthState>,
    billing: Option<Arc<BillingConfig>>,
) -> Result<()> {
    let sweeper = auth::spawn_sweeper(auth_state.rate_limiter().clone(), auth::SWEEP_INTERVAL);

    if billing.is_some() {
        info!("Billing webhook enabled");
    }

    let app = app(auth_state, billing);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Gracefully shutdown");
    })
    .await?;

    sweeper.abort();

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn panic_response(panic: Box<dyn Any + Send + 'static>, production: bool) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    };
    events::record_failure(
        Operation::Request,
        EventCode::Unexpected,
        "Unexpected error while handling request",
        &detail,
        production,
    );
    ApiError::Internal.into_response()
}
