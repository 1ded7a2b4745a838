//! The route for signing in to an account.

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, WithRejection};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    account::verify_account,
    auth::{AuthState, cookie::set_session_cookie, middleware::current_session},
};

/// The credentials for signing in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInData {
    /// The email of the account.
    pub email: String,
    /// The plaintext password of the account.
    pub password: String,
}

/// Handler for sign-in requests via the POST method.
///
/// On success the session cookie is set and the body is the JSON boolean
/// `false`, i.e. the client was not signed in before this request.
/// Responds with 401 Unauthorized if the credentials are wrong, or 403
/// Forbidden if the client is already signed in.
pub async fn post_sign_in(
    State(state): State<AuthState>,
    jar: PrivateCookieJar,
    WithRejection(Json(credentials), _): WithRejection<Json<SignInData>, Error>,
) -> Response {
    match current_session(state.store.as_ref(), &jar) {
        Ok(None) => {}
        Ok(Some(_)) => return Error::AlreadyAuthenticated.into_response(),
        Err(error) => return error.into_response(),
    }

    match verify_account(state.store.as_ref(), &credentials.email, &credentials.password) {
        Ok(session) => (set_session_cookie(jar, &session), Json(false)).into_response(),
        Err(Error::InvalidCredentials) => {
            tracing::warn!("Failed sign-in attempt for {}", credentials.email);
            Error::InvalidCredentials.into_response()
        }
        Err(error) => error.into_response(),
    }
}
