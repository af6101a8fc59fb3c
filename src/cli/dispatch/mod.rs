//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action the binary runs, which today is
//! always the API server with its full configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{
    ARG_DSN, ARG_PORT, ARG_TRUST_PROXY_HEADERS, Environment, billing, identity,
};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .filter(|v| !v.trim().is_empty());

    let identity_opts = identity::Options::parse(matches)?;
    let billing_opts = billing::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        dsn,
        environment: Environment::from_matches(matches),
        trust_proxy_headers: matches.get_flag(ARG_TRUST_PROXY_HEADERS),
        identity_url: identity_opts.url,
        identity_anon_key: identity_opts.anon_key,
        identity_timeout_seconds: identity_opts.timeout_seconds,
        payment_secret_key: billing_opts.secret_key,
        payment_webhook_secret: billing_opts.webhook_secret,
    }))
}
