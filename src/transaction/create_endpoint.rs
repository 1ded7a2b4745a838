//! Defines the endpoint for turning a description into new transactions.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, DataResponse, Error, ExchangeRates,
    parser::DescriptionParser,
    session::SessionData,
    store::KeyValueStore,
    transaction::{IngestionConfig, ingest::Ingestor},
};

/// The state needed to create transactions.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The store that holds transactions.
    pub store: Arc<dyn KeyValueStore>,
    /// Splits descriptions into line items.
    pub parser: Arc<dyn DescriptionParser>,
    /// Converts amounts into the base currency.
    pub exchange_rates: Arc<dyn ExchangeRates>,
    /// The base currency, timezone and failure policy.
    pub ingestion: IngestionConfig,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            parser: state.parser.clone(),
            exchange_rates: state.exchange_rates.clone(),
            ingestion: state.ingestion.clone(),
        }
    }
}

/// The body of a request to create transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionForm {
    /// Free text describing one or more purchases, e.g. "Lunch 12 SGD, taxi 8 USD".
    pub description: String,
}

/// A route handler for creating transactions from a description.
///
/// Responds with 201 Created and `{"data": [...]}` holding the new
/// transactions. Failures of the description parser or the exchange rate
/// service are reported as 500 Internal Server Error.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    Extension(session): Extension<SessionData>,
    WithRejection(Json(form), _): WithRejection<Json<DescriptionForm>, Error>,
) -> Response {
    let ingestor = Ingestor {
        store: state.store.as_ref(),
        parser: state.parser.as_ref(),
        exchange_rates: state.exchange_rates.as_ref(),
        config: &state.ingestion,
    };

    match ingestor.ingest(&session.email, &form.description).await {
        Ok(transactions) => {
            tracing::info!(
                "Created {} transactions for {}",
                transactions.len(),
                session.email
            );
            (StatusCode::CREATED, Json(DataResponse { data: transactions })).into_response()
        }
        Err(error) => {
            tracing::error!(
                "Could not create transactions for {} from {:?}: {error}",
                session.email,
                form.description
            );
            error.into_response()
        }
    }
}
