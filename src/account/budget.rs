//! Defines the endpoints for reading and updating the signed-in account's budget.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    AppState, DataResponse, Error,
    account::core::{get_budget, update_budget},
    currency::parse_amount,
    session::SessionData,
    store::KeyValueStore,
};

/// The state needed to read and update budgets.
#[derive(Debug, Clone)]
pub struct BudgetState {
    /// The store that holds accounts.
    pub store: Arc<dyn KeyValueStore>,
}

impl FromRef<AppState> for BudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }
}

/// The body of a budget update. A missing budget leaves the budget unchanged.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BudgetForm {
    #[serde(default)]
    budget: Option<Value>,
}

/// Respond with `{"data": "<budget>"}` for the signed-in account.
pub async fn get_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(session): Extension<SessionData>,
) -> Response {
    match get_budget(state.store.as_ref(), &session.email) {
        Ok(budget) => Json(DataResponse { data: budget }).into_response(),
        Err(error) => {
            tracing::error!("Could not get budget for {}: {error}", session.email);
            error.into_response()
        }
    }
}

/// Set the budget of the signed-in account.
///
/// Responds with 404 Not Found if the account no longer exists.
pub async fn update_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(session): Extension<SessionData>,
    WithRejection(Json(form), _): WithRejection<Json<BudgetForm>, Error>,
) -> Response {
    let budget = match form.budget.as_ref().map(parse_amount).transpose() {
        Ok(budget) => budget,
        Err(error) => return error.into_response(),
    };

    let result = match budget {
        Some(budget) => update_budget(state.store.as_ref(), &session.email, budget),
        // Nothing to change, but the account must still exist.
        None => get_budget(state.store.as_ref(), &session.email).map(|_| ()),
    };

    match result {
        Ok(()) => StatusCode::OK.into_response(),
        Err(Error::NotFound) => Error::NotFound.into_response(),
        Err(error) => {
            tracing::error!("Could not update budget for {}: {error}", session.email);
            error.into_response()
        }
    }
}
