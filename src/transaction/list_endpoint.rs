//! Defines the endpoint for reading the signed-in account's transactions.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    AppState, DataResponse, Error,
    session::SessionData,
    store::KeyValueStore,
    transaction::core::{get_transaction, list_transactions, parse_transaction_id},
};

/// The state needed to read transactions.
#[derive(Debug, Clone)]
pub struct ListTransactionsState {
    /// The store that holds transactions.
    pub store: Arc<dyn KeyValueStore>,
}

impl FromRef<AppState> for ListTransactionsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }
}

/// The query string of a transaction read.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    /// The ID of a single transaction to get.
    pub id: Option<String>,
}

/// A route handler for reading transactions.
///
/// Without a query string, responds with `{"data": [...]}` holding every
/// transaction of the signed-in account in no particular order. With
/// `?id=<transaction ID>`, responds with `{"data": {...}}` holding that
/// transaction, or 404 Not Found.
pub async fn get_transactions_endpoint(
    State(state): State<ListTransactionsState>,
    Extension(session): Extension<SessionData>,
    Query(query): Query<TransactionQuery>,
) -> Response {
    let store = state.store.as_ref();

    match query.id {
        Some(raw_id) => {
            let result = parse_transaction_id(&raw_id)
                .ok_or(Error::NotFound)
                .and_then(|id| get_transaction(store, &session.email, id));

            match result {
                Ok(transaction) => Json(DataResponse { data: transaction }).into_response(),
                Err(Error::NotFound) => Error::NotFound.into_response(),
                Err(error) => {
                    tracing::error!("Could not get transaction {raw_id}: {error}");
                    error.into_response()
                }
            }
        }
        None => match list_transactions(store, &session.email) {
            Ok(transactions) => Json(DataResponse { data: transactions }).into_response(),
            Err(error) => {
                tracing::error!("Could not list transactions for {}: {error}", session.email);
                error.into_response()
            }
        },
    }
}
