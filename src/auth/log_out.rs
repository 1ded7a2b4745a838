//! Log-out route handler that ends the session and invalidates the session cookie.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::PrivateCookieJar;

use crate::{
    auth::{
        AuthState,
        cookie::{get_session_token, invalidate_session_cookie},
    },
    session::destroy_session,
};

/// Delete the caller's session, if any, and invalidate the session cookie.
///
/// Always responds with 200 OK. A failure to delete the session record is
/// logged and the record is left to expire.
pub async fn get_log_out(State(state): State<AuthState>, jar: PrivateCookieJar) -> Response {
    if let Some(token) = get_session_token(&jar)
        && let Err(error) = destroy_session(state.store.as_ref(), &token)
    {
        tracing::error!("Could not delete session on log out: {error}");
    }

    (invalidate_session_cookie(jar), StatusCode::OK).into_response()
}

#[cfg(test)]
mod log_out_tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        extract::State,
        http::{Response, StatusCode, header::SET_COOKIE},
    };
    use axum_extra::extract::{
        PrivateCookieJar,
        cookie::{Cookie, Key},
    };
    use sha2::{Digest, Sha512};
    use time::{Duration, OffsetDateTime};

    use crate::{
        auth::{
            AuthState,
            cookie::{COOKIE_SESSION_ID, set_session_cookie},
            log_out::get_log_out,
        },
        session::{create_session, validate_session},
        test_utils::must_create_store,
    };

    fn get_state() -> AuthState {
        AuthState {
            cookie_key: Key::from(&Sha512::digest("42")),
            store: Arc::new(must_create_store()),
            password_hash_cost: 4,
        }
    }

    #[tokio::test]
    async fn log_out_deletes_session_and_invalidates_cookie() {
        let state = get_state();
        let session = create_session(state.store.as_ref(), "jo@example.com", "Jo").unwrap();
        let jar = set_session_cookie(PrivateCookieJar::new(state.cookie_key.clone()), &session);

        let response = get_log_out(State(state.clone()), jar).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_cookie_expired(&response);
        assert_eq!(
            validate_session(state.store.as_ref(), Some(session.token.as_str())),
            Ok(None)
        );
    }

    #[tokio::test]
    async fn log_out_without_session_succeeds() {
        let state = get_state();
        let jar = PrivateCookieJar::new(state.cookie_key.clone());

        let response = get_log_out(State(state), jar).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_cookie_expired(&response);
    }

    fn assert_cookie_expired(response: &Response<Body>) {
        let mut found = false;

        for cookie_header in response.headers().get_all(SET_COOKIE) {
            let cookie_string = cookie_header.to_str().unwrap();
            let cookie = Cookie::parse(cookie_string).unwrap();

            if cookie.name() != COOKIE_SESSION_ID {
                continue;
            }

            found = true;
            assert_eq!(
                cookie.expires_datetime(),
                Some(OffsetDateTime::UNIX_EPOCH),
                "got expires {:?}, want {:?}",
                cookie.expires_datetime(),
                Some(OffsetDateTime::UNIX_EPOCH),
            );
            assert_eq!(
                cookie.max_age(),
                Some(Duration::ZERO),
                "got max age {:?}, want {:?}",
                cookie.max_age(),
                Some(Duration::ZERO),
            );
        }

        assert!(found, "want {COOKIE_SESSION_ID} cookie in response");
    }
}
