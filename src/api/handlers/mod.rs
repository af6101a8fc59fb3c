//! API handlers for the gateway.
//!
//! `auth` holds the session and authorization core, `billing` the payment
//! webhook, `premium` the tier-gated routes.

pub mod auth;
pub mod billing;
pub mod health;
pub mod premium;
