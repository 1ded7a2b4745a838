//! Defines the endpoint for deleting a transaction.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    session::SessionData,
    store::KeyValueStore,
    transaction::core::{delete_transaction, parse_transaction_id},
};

/// The state needed to delete a transaction.
#[derive(Debug, Clone)]
pub struct DeleteTransactionState {
    /// The store that holds transactions.
    pub store: Arc<dyn KeyValueStore>,
}

impl FromRef<AppState> for DeleteTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }
}

/// A route handler for deleting a transaction.
///
/// Responds with 200 OK whether or not the signed-in account had such a transaction.
pub async fn delete_transaction_endpoint(
    State(state): State<DeleteTransactionState>,
    Extension(session): Extension<SessionData>,
    Path(transaction_id): Path<String>,
) -> Response {
    let Some(id) = parse_transaction_id(&transaction_id) else {
        return StatusCode::OK.into_response();
    };

    match delete_transaction(state.store.as_ref(), &session.email, id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(error) => {
            tracing::error!("Could not delete transaction {transaction_id}: {error}");
            error.into_response()
        }
    }
}
