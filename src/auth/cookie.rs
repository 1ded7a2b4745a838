//! Defines functions for carrying the session token in a private cookie.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::session::Session;

/// The name of the cookie that holds the session token.
pub(crate) const COOKIE_SESSION_ID: &str = "SESSION_ID";

/// Add the session cookie to the cookie jar, indicating that a user is signed in.
///
/// The cookie expires with the session. It is sent cross-site so that a
/// frontend served from another origin can use the API.
///
/// Returns the cookie jar with the cookie added.
pub(crate) fn set_session_cookie(jar: PrivateCookieJar, session: &Session) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_SESSION_ID, session.token.to_string()))
            .expires(session.expires_at)
            .path("/")
            .http_only(true)
            .same_site(SameSite::None)
            .secure(true),
    )
}

/// Set the session cookie to an invalid value and set its max age to zero, which should delete the cookie on the client side.
pub(crate) fn invalidate_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_SESSION_ID, "deleted"))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .path("/")
            .http_only(true)
            .same_site(SameSite::None)
            .secure(true),
    )
}

/// Get the session token from the cookie jar.
///
/// Returns `None` if the cookie is missing, empty or could not be decrypted.
pub(crate) fn get_session_token(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(COOKIE_SESSION_ID)
        .map(|cookie| cookie.value_trimmed().to_owned())
        .filter(|token| !token.is_empty())
}
