//! Defines functions for reading and writing the auth cookie.

use std::cmp::max;

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::{Error, auth::token::Token, user::UserID};

pub(crate) const COOKIE_TOKEN: &str = "token";
/// The default duration for which auth cookies are valid.
pub const DEFAULT_COOKIE_DURATION: Duration = Duration::minutes(5);

/// Add an auth cookie to the cookie jar, indicating that a user is logged in and authenticated.
///
/// Sets the initial expiry of the cookie to `duration` from the current time.
/// You can use [DEFAULT_COOKIE_DURATION] for the default duration.
///
/// Returns the cookie jar with the cookie added.
///
/// # Errors
///
/// Returns [Error::InvalidToken] if the token cannot be serialized.
pub fn set_auth_cookie(
    jar: PrivateCookieJar,
    user_id: UserID,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let expires_at = OffsetDateTime::now_utc() + duration;

    set_token_cookie(
        jar,
        Token {
            user_id,
            expires_at,
        },
    )
}

/// Set the expiry of the auth cookie in `jar` to the latest of UTC now
/// plus `duration` and the cookie's expiry.
///
/// # Errors
///
/// The cookie jar is not modified if an error is returned.
///
/// Returns:
/// - [Error::CookieMissing] if the auth cookie is not in the cookie jar.
/// - [Error::InvalidToken] if the token is invalid or extending it would
///   overflow the date time.
pub(crate) fn extend_auth_cookie_duration_if_needed(
    jar: PrivateCookieJar,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let token = get_token_from_cookies(&jar)?;

    let new_expiry = OffsetDateTime::now_utc()
        .checked_add(duration)
        .ok_or(Error::InvalidToken)?;

    set_token_cookie(
        jar,
        Token {
            expires_at: max(token.expires_at, new_expiry),
            ..token
        },
    )
}

/// Get the auth token from the cookie jar.
///
/// # Errors
///
/// Returns:
/// - [Error::CookieMissing] if the auth cookie is not in the cookie jar.
/// - [Error::InvalidToken] if the token cannot be parsed or has expired.
pub(crate) fn get_token_from_cookies(jar: &PrivateCookieJar) -> Result<Token, Error> {
    let cookie = jar.get(COOKIE_TOKEN).ok_or(Error::CookieMissing)?;

    let token: Token = serde_json::from_str(cookie.value_trimmed()).map_err(|error| {
        tracing::debug!("Could not parse auth token: {error}");
        Error::InvalidToken
    })?;

    if token.is_expired(OffsetDateTime::now_utc()) {
        return Err(Error::InvalidToken);
    }

    Ok(token)
}

fn set_token_cookie(jar: PrivateCookieJar, token: Token) -> Result<PrivateCookieJar, Error> {
    let token_string = serde_json::to_string(&token).map_err(|error| {
        tracing::error!("Could not serialize auth token: {error}");
        Error::InvalidToken
    })?;

    Ok(jar.add(
        Cookie::build((COOKIE_TOKEN, token_string))
            .expires(token.expires_at)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    ))
}
