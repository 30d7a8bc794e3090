//! Authentication middleware that validates the auth cookie and extends sessions.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use time::Duration;

use crate::{
    AppState, Error,
    auth::cookie::{extend_auth_cookie_duration_if_needed, get_token_from_cookies},
    user::{UserID, get_user_by_id},
};

/// The state needed for the auth middleware
#[derive(Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The database connection for checking that the user still exists.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Checks for a valid auth cookie, then runs the request with the user ID
/// in the request extensions. Rejected requests get the response from
/// `reject`.
#[inline]
async fn auth_guard_internal(
    state: AuthState,
    request: Request,
    next: Next,
    reject: impl Fn(Error) -> Response,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(err) => {
            tracing::error!("Error getting cookie jar: {err:?}");
            return reject(Error::CookieMissing);
        }
    };
    let user_id = match get_token_from_cookies(&jar) {
        Ok(token) => token.user_id,
        Err(error) => {
            tracing::debug!("Rejected request to {}: {error}", parts.uri.path());
            return reject(error);
        }
    };

    if let Err(error) = check_user_exists(user_id, &state) {
        tracing::debug!("Rejected request to {}: {error}", parts.uri.path());
        return reject(error);
    }

    parts.extensions.insert(user_id);
    let request = Request::from_parts(parts, body);
    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();
    let jar = match extend_auth_cookie_duration_if_needed(jar.clone(), state.cookie_duration) {
        Ok(updated_jar) => updated_jar,
        Err(err) => {
            tracing::error!("Error extending cookie duration: {err:?}. Rolling back cookie jar.");
            jar
        }
    };
    for (key, val) in jar.into_response().headers().iter() {
        if key != SET_COOKIE {
            continue;
        }

        parts.headers.append(key, val.to_owned());
    }

    Response::from_parts(parts, body)
}

/// A token for a user that has since been deleted is treated as invalid.
fn check_user_exists(user_id: UserID, state: &AuthState) -> Result<(), Error> {
    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    match get_user_by_id(user_id, &connection) {
        Ok(_) => Ok(()),
        Err(Error::NotFound) => Err(Error::InvalidToken),
        Err(error) => Err(error),
    }
}

/// Middleware function that checks for a valid authorization cookie.
/// The user ID is placed into request and then the request executed normally if the cookie is valid, otherwise a 401 error page is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
///
/// **Note**: The app state must contain an `axum_extra::extract::cookie::Key` for decrypting and verifying the cookie contents.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    auth_guard_internal(state, request, next, Error::into_response).await
}

/// Middleware function that checks for a valid authorization cookie.
/// The user ID is placed into request and then the request executed normally if the cookie is valid, otherwise a 401 alert is returned for HTMX to display.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
///
/// **Note**: The app state must contain an `axum_extra::extract::cookie::Key` for decrypting and verifying the cookie contents.
pub async fn auth_guard_hx(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    auth_guard_internal(state, request, next, Error::into_alert_response).await
}
