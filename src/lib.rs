//! Baas is the backend for a personal finance app.
//!
//! Users sign up, set a monthly budget and record spending by describing it in
//! free text. Each description is turned into one or more structured
//! transactions by a text-completion service, converted into the base currency
//! with live exchange rates and stored in a single key-value table.
//!
//! This library provides a JSON REST API over that data.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::{Deserialize, Serialize};
use tokio::signal;

mod account;
mod app_state;
mod auth;
mod category;
mod currency;
pub mod endpoints;
mod logging;
mod parser;
mod routing;
mod session;
mod store;
mod timezone;
mod transaction;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use category::Category;
pub use currency::{CurrencyCode, ExchangeRates, OpenExchangeRates};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use parser::{ChatCompletionConfig, ChatCompletionParser, DescriptionParser, LineItem};
pub use routing::build_router;
pub use store::{KeyValueStore, SQLiteStore, purge_expired_items_periodically};
pub use transaction::IngestionConfig;

/// The envelope for successful JSON responses, e.g. `{"data": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataResponse<T> {
    /// The payload of the response.
    pub data: T,
}

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request body or one of its fields was malformed, e.g. an amount
    /// that is not a number.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The email and password did not match a registered account.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The session cookie is missing, or it does not refer to a live session.
    #[error("missing or invalid session")]
    Unauthorized,

    /// The client tried to sign in or sign up while already holding a valid
    /// session.
    #[error("the client is already signed in")]
    AlreadyAuthenticated,

    /// An account with the email already exists.
    #[error("an account with the email already exists")]
    DuplicateEmail,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// A stored record could not be converted into its domain type.
    #[error("corrupt record in store: {0}")]
    CorruptRecord(String),

    /// The text-completion service failed or returned something other than a
    /// list of line items.
    #[error("could not parse the description: {0}")]
    Parse(String),

    /// The exchange rate service failed or did not return the requested rate.
    #[error("could not look up exchange rate: {0}")]
    RateLookup(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// A date time could not be formatted or parsed.
    #[error("invalid date time: {0}")]
    InvalidDateFormat(String),

    /// An error occurred while serializing or deserializing JSON.
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::JSONSerializationError(value.to_string())
    }
}

impl From<JsonRejection> for Error {
    fn from(value: JsonRejection) -> Self {
        Error::Validation(value.body_text())
    }
}

impl Error {
    /// The HTTP status code that the error is reported as.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials | Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::AlreadyAuthenticated => StatusCode::FORBIDDEN,
            Error::DuplicateEmail => StatusCode::CONFLICT,
            Error::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Only the status is sent to the client, the details stay in the server logs.
        match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!("An unexpected error occurred: {}", self);
            }
            StatusCode::BAD_REQUEST => tracing::debug!("Rejected request: {}", self),
            _ => {}
        }

        status.into_response()
    }
}
