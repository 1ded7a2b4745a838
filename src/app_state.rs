//! Implements a struct that holds the state of the REST server.

use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

use crate::{
    Error, ExchangeRates, IngestionConfig, auth::PasswordHash, parser::DescriptionParser,
    store::KeyValueStore, timezone::get_local_offset,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// The table that holds sessions, accounts and transactions.
    pub store: Arc<dyn KeyValueStore>,

    /// Turns free-text descriptions into line items.
    pub parser: Arc<dyn DescriptionParser>,

    /// Looks up the rates used to convert amounts into the base currency.
    pub exchange_rates: Arc<dyn ExchangeRates>,

    /// The base currency, local timezone and failure policy for new transactions.
    pub ingestion: IngestionConfig,

    /// The bcrypt cost used when hashing new passwords.
    pub password_hash_cost: u32,
}

impl AppState {
    /// Create a new [AppState].
    ///
    /// `ingestion.local_timezone` should be a valid, canonical timezone name,
    /// e.g. "Asia/Singapore".
    ///
    /// # Errors
    /// Returns [Error::InvalidTimezoneError] if the timezone is not known.
    pub fn new(
        cookie_secret: &str,
        store: Arc<dyn KeyValueStore>,
        parser: Arc<dyn DescriptionParser>,
        exchange_rates: Arc<dyn ExchangeRates>,
        ingestion: IngestionConfig,
    ) -> Result<Self, Error> {
        if get_local_offset(&ingestion.local_timezone).is_none() {
            return Err(Error::InvalidTimezoneError(ingestion.local_timezone));
        }

        Ok(Self {
            cookie_key: create_cookie_key(cookie_secret),
            store,
            parser,
            exchange_rates,
            ingestion,
            password_hash_cost: PasswordHash::DEFAULT_COST,
        })
    }

    /// Use `cost` instead of [PasswordHash::DEFAULT_COST] when hashing passwords.
    pub fn with_password_hash_cost(mut self, cost: u32) -> Self {
        self.password_hash_cost = cost;
        self
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}
