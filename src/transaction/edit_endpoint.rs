//! Defines the endpoint for updating a transaction.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;

use crate::{
    AppState, CurrencyCode, Error, ExchangeRates,
    session::SessionData,
    store::KeyValueStore,
    transaction::{
        core::parse_transaction_id,
        update::{TransactionPatch, update_transaction},
    },
};

/// The state needed to edit a transaction.
#[derive(Debug, Clone)]
pub struct EditTransactionState {
    /// The store that holds transactions.
    pub store: Arc<dyn KeyValueStore>,
    /// Converts amounts into the base currency.
    pub exchange_rates: Arc<dyn ExchangeRates>,
    /// The currency transaction amounts are converted into.
    pub base_currency: CurrencyCode,
}

impl FromRef<AppState> for EditTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            exchange_rates: state.exchange_rates.clone(),
            base_currency: state.ingestion.base_currency.clone(),
        }
    }
}

/// A route handler for merging a partial update into a transaction.
///
/// Responds with 200 OK, 404 Not Found if the signed-in account has no such
/// transaction, or 400 Bad Request if a field is invalid.
pub async fn edit_transaction_endpoint(
    State(state): State<EditTransactionState>,
    Extension(session): Extension<SessionData>,
    Path(transaction_id): Path<String>,
    WithRejection(Json(patch), _): WithRejection<Json<TransactionPatch>, Error>,
) -> Response {
    let Some(id) = parse_transaction_id(&transaction_id) else {
        return Error::NotFound.into_response();
    };

    match update_transaction(
        state.store.as_ref(),
        state.exchange_rates.as_ref(),
        &state.base_currency,
        &session.email,
        id,
        patch,
    )
    .await
    {
        Ok(_) => StatusCode::OK.into_response(),
        Err(error @ (Error::NotFound | Error::Validation(_))) => error.into_response(),
        Err(error) => {
            tracing::error!("Could not update transaction {transaction_id}: {error}");
            error.into_response()
        }
    }
}

#[cfg(test)]
mod edit_transaction_tests {
    use std::str::FromStr;

    use axum::http::StatusCode;
    use axum_extra::extract::cookie::Cookie;
    use axum_test::TestServer;
    use rust_decimal::Decimal;
    use serde_json::json;
    use uuid::Uuid;

    use crate::{
        AppState, Category, DataResponse, build_router,
        endpoints::{self, format_endpoint},
        session::create_session,
        test_utils::{StubExchangeRates, StubParser, line_item, must_create_state, session_cookie},
        transaction::core::{Transaction, get_transaction},
    };

    fn get_test_server() -> (TestServer, AppState) {
        let parser = StubParser::new(vec![line_item("Taxi", Category::Transport, json!(8), "USD")]);
        let rates = StubExchangeRates::new(&[("USD", "1.35"), ("EUR", "1.45")]);
        let state = must_create_state(parser, rates);
        let server =
            TestServer::try_new(build_router(state.clone())).expect("Could not create test server.");

        (server, state)
    }

    fn sign_in(state: &AppState, email: &str) -> Cookie<'static> {
        let session = create_session(state.store.as_ref(), email, "Jo").unwrap();

        session_cookie(&state.cookie_key, &session)
    }

    async fn create_taxi(server: &TestServer, cookie: Cookie<'static>) -> Transaction {
        server
            .post(endpoints::TRANSACTIONS)
            .add_cookie(cookie)
            .json(&json!({"description": "taxi 8 USD"}))
            .await
            .json::<DataResponse<Vec<Transaction>>>()
            .data
            .remove(0)
    }

    #[tokio::test]
    async fn changing_currency_recomputes_sgd_amount() {
        let (server, state) = get_test_server();
        let cookie = sign_in(&state, "jo@example.com");
        let taxi = create_taxi(&server, cookie.clone()).await;

        server
            .put(&format_endpoint(endpoints::TRANSACTION, &taxi.id.to_string()))
            .add_cookie(cookie)
            .json(&json!({"original_currency": "eur", "category": "dining"}))
            .await
            .assert_status_ok();

        let got = get_transaction(state.store.as_ref(), "jo@example.com", taxi.id).unwrap();
        assert_eq!(got.original_currency.as_str(), "EUR");
        assert_eq!(got.original_amount, Decimal::from(8));
        assert_eq!(got.base_amount, Decimal::from_str("11.60").unwrap());
        assert_eq!(got.category, Category::Dining);
    }

    #[tokio::test]
    async fn missing_transaction_is_not_found() {
        let (server, state) = get_test_server();

        server
            .put(&format_endpoint(
                endpoints::TRANSACTION,
                &Uuid::new_v4().to_string(),
            ))
            .add_cookie(sign_in(&state, "jo@example.com"))
            .json(&json!({"simple_description": "Cab"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_accounts_transaction_is_not_found() {
        let (server, state) = get_test_server();
        let theirs = create_taxi(&server, sign_in(&state, "max@example.com")).await;

        server
            .put(&format_endpoint(endpoints::TRANSACTION, &theirs.id.to_string()))
            .add_cookie(sign_in(&state, "jo@example.com"))
            .json(&json!({"simple_description": "Mine now"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        assert_eq!(
            get_transaction(state.store.as_ref(), "max@example.com", theirs.id),
            Ok(theirs)
        );
    }

    #[tokio::test]
    async fn non_numeric_amount_is_bad_request() {
        let (server, state) = get_test_server();
        let cookie = sign_in(&state, "jo@example.com");
        let taxi = create_taxi(&server, cookie.clone()).await;

        server
            .put(&format_endpoint(endpoints::TRANSACTION, &taxi.id.to_string()))
            .add_cookie(cookie)
            .json(&json!({"original_amount": "eight"}))
            .await
            .assert_status_bad_request();
    }
}
