//! Authentication middleware that checks the session cookie on protected routes.

use std::sync::Arc;

use axum::{
    extract::{FromRef, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};

use crate::{
    AppState, Error,
    auth::cookie::get_session_token,
    session::{SessionData, validate_session},
    store::KeyValueStore,
};

/// The state needed for the auth middleware and the sign-up, sign-in and log-out routes.
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The store that holds sessions and accounts.
    pub store: Arc<dyn KeyValueStore>,
    /// The bcrypt cost used when hashing new passwords.
    pub password_hash_cost: u32,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            store: state.store.clone(),
            password_hash_cost: state.password_hash_cost,
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Get the session for the token in the session cookie, if the cookie is
/// present and refers to a live session.
///
/// # Errors
/// Returns an error if the session store could not be read.
pub(crate) fn current_session(
    store: &dyn KeyValueStore,
    jar: &PrivateCookieJar,
) -> Result<Option<SessionData>, Error> {
    validate_session(store, get_session_token(jar).as_deref())
}

/// Middleware function that checks for a valid session cookie.
///
/// The [SessionData] is placed into the request and then the request executed
/// normally if the session is valid, otherwise a 401 Unauthorized response is
/// returned.
///
/// **Note**: Route handlers can use the function argument `Extension(session): Extension<SessionData>` to receive the session.
pub async fn auth_guard(
    State(state): State<AuthState>,
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match current_session(state.store.as_ref(), &jar) {
        Ok(Some(session)) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Ok(None) => Error::Unauthorized.into_response(),
        Err(error) => {
            tracing::error!("Could not validate session: {error}");
            error.into_response()
        }
    }
}

/// Route handler for the sign-in and sign-up pages.
///
/// Responds with 200 OK if the client may sign in or sign up, or 401
/// Unauthorized if it already has a valid session.
pub async fn get_signed_out_status(
    State(state): State<AuthState>,
    jar: PrivateCookieJar,
) -> Response {
    match current_session(state.store.as_ref(), &jar) {
        Ok(Some(_)) => StatusCode::UNAUTHORIZED.into_response(),
        Ok(None) => StatusCode::OK.into_response(),
        Err(error) => error.into_response(),
    }
}
