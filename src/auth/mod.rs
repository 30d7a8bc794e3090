//! Cookie based authentication.
//!
//! Logging in happens elsewhere: it calls [set_auth_cookie] once the user is
//! verified. The guards in this module only read the cookie back and reject
//! requests without a valid token.

mod cookie;
mod middleware;
mod token;

pub use cookie::{DEFAULT_COOKIE_DURATION, set_auth_cookie};
pub use middleware::{auth_guard, auth_guard_hx};
pub use token::Token;

#[cfg(test)]
pub(crate) use cookie::COOKIE_TOKEN;

#[cfg(test)]
pub use middleware::AuthState;
