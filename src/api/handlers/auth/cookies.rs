//! Session cookie codec.
//!
//! A session travels as two `HttpOnly` cookies carrying the access and refresh
//! tokens with identical attributes. Clearing always emits both deletions,
//! whether or not the client currently holds a session.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
};
use secrecy::ExposeSecret;

use super::identity::{Session, TokenPair};

pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
pub const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";
pub const SESSION_MAX_AGE_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: &'static str,
    pub path: &'static str,
    pub max_age_seconds: i64,
}

impl CookieOptions {
    #[must_use]
    pub const fn new(is_production: bool) -> Self {
        Self {
            http_only: true,
            secure: is_production,
            same_site: "Lax",
            path: "/",
            max_age_seconds: SESSION_MAX_AGE_SECONDS,
        }
    }

    fn render(&self, name: &str, value: &str, max_age_seconds: i64) -> String {
        let mut cookie = format!(
            "{name}={value}; Path={}; SameSite={}; Max-Age={max_age_seconds}",
            self.path, self.same_site
        );
        if max_age_seconds == 0 {
            cookie.push_str("; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Append `Set-Cookie` headers for both session tokens.
///
/// # Errors
/// Returns an error if a token contains bytes that are not valid in a header.
pub fn write(
    headers: &mut HeaderMap,
    session: &Session,
    options: &CookieOptions,
) -> Result<(), InvalidHeaderValue> {
    let access = HeaderValue::from_str(&options.render(
        ACCESS_TOKEN_COOKIE,
        session.tokens.access_token.expose_secret(),
        options.max_age_seconds,
    ))?;
    let refresh = HeaderValue::from_str(&options.render(
        REFRESH_TOKEN_COOKIE,
        session.tokens.refresh_token.expose_secret(),
        options.max_age_seconds,
    ))?;
    headers.append(SET_COOKIE, access);
    headers.append(SET_COOKIE, refresh);
    Ok(())
}

/// Append deletions for both session cookies.
pub fn clear(headers: &mut HeaderMap, options: &CookieOptions) {
    for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
        // Names and attributes are static ASCII, so this cannot fail.
        if let Ok(value) = HeaderValue::from_str(&options.render(name, "", 0)) {
            headers.append(SET_COOKIE, value);
        }
    }
}

/// Read the token pair from the request `Cookie` header(s).
#[must_use]
pub fn read(headers: &HeaderMap) -> Option<TokenPair> {
    let access = cookie_value(headers, ACCESS_TOKEN_COOKIE)?;
    let refresh = cookie_value(headers, REFRESH_TOKEN_COOKIE).unwrap_or_default();
    Some(TokenPair::new(&access, &refresh))
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name && !val.trim().is_empty()).then(|| val.trim().to_string())
        })
}
