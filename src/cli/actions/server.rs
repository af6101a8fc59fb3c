use crate::{
    api::{
        self,
        handlers::{
            auth::{
                AuthConfig, AuthState, GoTrueProvider, PgProfileStore, ProfileStore, RateLimiter,
                RestProfileStore,
            },
            billing::BillingConfig,
        },
    },
    cli::{commands::Environment, telemetry},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub environment: Environment,
    pub trust_proxy_headers: bool,
    pub identity_url: Url,
    pub identity_anon_key: SecretString,
    pub identity_timeout_seconds: u64,
    pub payment_secret_key: Option<SecretString>,
    pub payment_webhook_secret: Option<SecretString>,
}

fn log_startup_args(args: &Args) {
    debug!(
        port = args.port,
        environment = ?args.environment,
        trust_proxy_headers = args.trust_proxy_headers,
        identity_url = %args.identity_url,
        identity_timeout_seconds = args.identity_timeout_seconds,
        profile_store = if args.dsn.is_some() { "postgres" } else { "rest" },
        billing_key = args.payment_secret_key.is_some(),
        billing_webhook = args.payment_webhook_secret.is_some(),
        "server arguments"
    );
}

async fn profile_store(args: &Args, timeout: Duration) -> Result<Arc<dyn ProfileStore>> {
    if let Some(dsn) = &args.dsn {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .acquire_timeout(timeout)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Arc::new(PgProfileStore::new(pool)))
    } else {
        let store = RestProfileStore::new(
            args.identity_url.clone(),
            args.identity_anon_key.clone(),
            timeout,
        )
        .context("Failed to build profile store client")?;
        Ok(Arc::new(store))
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database or HTTP clients cannot be set up, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let timeout = Duration::from_secs(args.identity_timeout_seconds);
    let identity = GoTrueProvider::new(
        args.identity_url.clone(),
        args.identity_anon_key.clone(),
        timeout,
    )
    .context("Failed to build identity client")?;
    let profiles = profile_store(&args, timeout).await?;

    let auth_config = AuthConfig::new(args.environment.is_production())
        .with_identity_timeout(timeout)
        .with_trust_proxy_headers(args.trust_proxy_headers);
    let auth_state = Arc::new(AuthState::new(
        auth_config,
        Arc::new(RateLimiter::in_memory()),
        Arc::new(identity),
        profiles,
    ));

    let billing = BillingConfig::from_options(args.payment_secret_key, args.payment_webhook_secret)
        .map(Arc::new);
    if billing.is_none() {
        info!("Billing not configured, webhook routes disabled");
    }

    let result = api::new(args.port, auth_state, billing).await;

    telemetry::shutdown_tracer();

    result
}
