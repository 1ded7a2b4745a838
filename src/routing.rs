//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router,
    extract::FromRef,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, put},
};

use crate::{
    AppState,
    account::{get_budget_endpoint, update_budget_endpoint},
    auth::{AuthState, auth_guard, get_log_out, get_signed_out_status, post_sign_in, post_sign_up},
    endpoints,
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, edit_transaction_endpoint,
        get_transactions_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::COFFEE, get(get_coffee))
        .route(
            endpoints::SIGN_UP,
            get(get_signed_out_status).post(post_sign_up),
        )
        .route(
            endpoints::SIGN_IN,
            get(get_signed_out_status).post(post_sign_in),
        )
        .route(endpoints::LOG_OUT, get(get_log_out));

    let protected_routes = Router::new()
        .route(
            endpoints::BUDGET,
            get(get_budget_endpoint).put(update_budget_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            put(edit_transaction_endpoint).delete(delete_transaction_endpoint),
        )
        .route_layer(middleware::from_fn_with_state(
            AuthState::from_ref(&state),
            auth_guard,
        ));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// Attempt to get a cup of coffee from the server.
async fn get_coffee() -> Response {
    (StatusCode::IM_A_TEAPOT, "I'm a teapot").into_response()
}

async fn get_404_not_found() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

#[cfg(test)]
mod router_tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::{
        Category, DataResponse, build_router,
        auth::COOKIE_SESSION_ID,
        endpoints::{self, format_endpoint},
        test_utils::{StubExchangeRates, StubParser, line_item, must_create_state},
        transaction::Transaction,
    };

    fn get_test_server() -> TestServer {
        let parser = StubParser::new(vec![
            line_item("Lunch", Category::Dining, json!(12), "SGD"),
            line_item("Taxi", Category::Transport, json!(8), "USD"),
        ]);
        let state = must_create_state(parser, StubExchangeRates::new(&[("USD", "1.35")]));

        TestServer::try_new(build_router(state)).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn coffee_is_a_teapot() {
        let server = get_test_server();

        server
            .get(endpoints::COFFEE)
            .await
            .assert_status(StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let server = get_test_server();

        server
            .get("/definitely/not/a/route")
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn protected_routes_require_session() {
        let server = get_test_server();
        let transaction = format_endpoint(endpoints::TRANSACTION, "42");

        server.get(endpoints::BUDGET).await.assert_status_unauthorized();
        server
            .put(endpoints::BUDGET)
            .json(&json!({"budget": 1}))
            .await
            .assert_status_unauthorized();
        server
            .get(endpoints::TRANSACTIONS)
            .await
            .assert_status_unauthorized();
        server
            .put(&transaction)
            .json(&json!({}))
            .await
            .assert_status_unauthorized();
        server.delete(&transaction).await.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn sign_up_record_spending_and_log_out() {
        let server = get_test_server();
        let credentials = json!({"email": "jo@example.com", "password": "hunter2"});

        server
            .post(endpoints::SIGN_UP)
            .json(&json!({"email": "jo@example.com", "name": "Jo", "password": "hunter2"}))
            .await
            .assert_status(StatusCode::CREATED);
        let cookie = server
            .post(endpoints::SIGN_IN)
            .json(&credentials)
            .await
            .cookie(COOKIE_SESSION_ID);

        server
            .put(endpoints::BUDGET)
            .add_cookie(cookie.clone())
            .json(&json!({"budget": 1500}))
            .await
            .assert_status_ok();
        let budget = server
            .get(endpoints::BUDGET)
            .add_cookie(cookie.clone())
            .await
            .json::<DataResponse<Decimal>>()
            .data;
        assert_eq!(budget, Decimal::from(1500));

        let created = server
            .post(endpoints::TRANSACTIONS)
            .add_cookie(cookie.clone())
            .json(&json!({"description": "Lunch 12 SGD, taxi 8 USD"}))
            .await
            .json::<DataResponse<Vec<Transaction>>>()
            .data;
        let listed = server
            .get(endpoints::TRANSACTIONS)
            .add_cookie(cookie.clone())
            .await
            .json::<DataResponse<Vec<Transaction>>>()
            .data;
        assert_eq!(created.len(), 2);
        assert_eq!(listed.len(), 2);

        server
            .get(endpoints::LOG_OUT)
            .add_cookie(cookie.clone())
            .await
            .assert_status_ok();
        server
            .get(endpoints::TRANSACTIONS)
            .add_cookie(cookie)
            .await
            .assert_status_unauthorized();
    }
}
