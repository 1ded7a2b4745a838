//! The route for creating an account.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, WithRejection};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    account::create_account,
    auth::{AuthState, middleware::current_session},
};

/// The data needed to create an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpData {
    /// The email the user will sign in with.
    pub email: String,
    /// The user's display name.
    pub name: String,
    /// The plaintext password, hashed before it is stored.
    pub password: String,
}

/// Handler for sign-up requests via the POST method.
///
/// Responds with 201 Created when the account is created, 409 Conflict if the
/// email is taken, or 403 Forbidden if the client is already signed in.
pub async fn post_sign_up(
    State(state): State<AuthState>,
    jar: PrivateCookieJar,
    WithRejection(Json(data), _): WithRejection<Json<SignUpData>, Error>,
) -> Response {
    match current_session(state.store.as_ref(), &jar) {
        Ok(None) => {}
        Ok(Some(_)) => return Error::AlreadyAuthenticated.into_response(),
        Err(error) => return error.into_response(),
    }

    match create_account(
        state.store.as_ref(),
        &data.email,
        &data.name,
        &data.password,
        state.password_hash_cost,
    ) {
        Ok(_) => StatusCode::CREATED.into_response(),
        Err(Error::DuplicateEmail) => {
            tracing::debug!("Rejected sign-up for existing account {}", data.email);
            Error::DuplicateEmail.into_response()
        }
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod sign_up_tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;

    use crate::{
        AppState,
        account::get_account,
        build_router, endpoints,
        session::create_session,
        test_utils::{StubExchangeRates, StubParser, must_create_state, session_cookie},
    };

    fn get_test_server() -> (TestServer, AppState) {
        let state = must_create_state(StubParser::new(vec![]), StubExchangeRates::failing());
        let server =
            TestServer::try_new(build_router(state.clone())).expect("Could not create test server.");

        (server, state)
    }

    #[tokio::test]
    async fn sign_up_creates_account() {
        let (server, state) = get_test_server();

        server
            .post(endpoints::SIGN_UP)
            .json(&json!({"email": "jo@example.com", "name": "Jo", "password": "hunter2"}))
            .await
            .assert_status(StatusCode::CREATED);

        let account = get_account(state.store.as_ref(), "jo@example.com").unwrap();
        assert_eq!(account.name, "Jo");
    }

    #[tokio::test]
    async fn sign_up_with_existing_email_is_a_conflict() {
        let (server, _) = get_test_server();
        let body = json!({"email": "jo@example.com", "name": "Jo", "password": "hunter2"});
        server.post(endpoints::SIGN_UP).json(&body).await;

        server
            .post(endpoints::SIGN_UP)
            .json(&body)
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn sign_up_with_missing_field_is_bad_request() {
        let (server, _) = get_test_server();

        server
            .post(endpoints::SIGN_UP)
            .json(&json!({"email": "jo@example.com", "password": "hunter2"}))
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn sign_up_while_signed_in_is_forbidden() {
        let (server, state) = get_test_server();
        let session = create_session(state.store.as_ref(), "jo@example.com", "Jo").unwrap();

        server
            .post(endpoints::SIGN_UP)
            .add_cookie(session_cookie(&state.cookie_key, &session))
            .json(&json!({"email": "max@example.com", "name": "Max", "password": "hunter2"}))
            .await
            .assert_status_forbidden();
    }
}
