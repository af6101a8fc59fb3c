//! # Gatehouse (Session & Subscription-Tier Gateway)
//!
//! `gatehouse` sits in front of a GoTrue-compatible identity backend and turns
//! its tokens into first-party session cookies, then decides what each caller
//! may reach based on a subscription tier.
//!
//! ## Sessions
//!
//! Registration and login exchange credentials with the identity backend and
//! store the returned access/refresh pair in `HttpOnly`, `SameSite=Lax`
//! cookies (`Secure` in production). Logout always clears both cookies, even
//! when the upstream sign-out fails.
//!
//! ## Tiers
//!
//! Callers resolve to one of `anonymous`, `free_user`, `premium_user` or
//! `license_user` from the `role` column of their profile. Any failure along
//! the way (no cookie, expired token, missing profile, database error) resolves
//! to `anonymous`; tier-gated routes answer `403` with one generic body.
//!
//! ## Abuse Protection
//!
//! Auth endpoints are rate limited per client in fixed one-hour windows and
//! reject oversized, malformed or agent-less requests before any upstream call.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
