//! Stores and stub services shared by the unit tests.

use std::{
    collections::HashMap,
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use axum::{Router, http::header::SET_COOKIE, response::IntoResponse};
use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, Key},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::net::TcpListener;

use crate::{
    AppState, Category, CurrencyCode, Error, ExchangeRates, IngestionConfig, LineItem,
    auth::set_session_cookie, parser::DescriptionParser, session::Session, store::SQLiteStore,
};

pub fn must_create_store() -> SQLiteStore {
    let connection =
        Connection::open_in_memory().expect("could not create in-memory SQLite database");

    SQLiteStore::new(connection).expect("could not create item table")
}

/// Exchange rates into any currency from a fixed table, counting lookups.
#[derive(Debug, Default)]
pub struct StubExchangeRates {
    rates: HashMap<String, Decimal>,
    calls: AtomicUsize,
}

impl StubExchangeRates {
    /// Rates keyed by the currency converted from, e.g. `[("USD", "1.35")]`.
    pub fn new(rates: &[(&str, &str)]) -> Self {
        Self {
            rates: rates
                .iter()
                .map(|(code, rate)| {
                    (
                        code.to_string(),
                        Decimal::from_str(rate).expect("invalid test rate"),
                    )
                })
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every lookup fails.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeRates for StubExchangeRates {
    async fn rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<Decimal, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        self.rates
            .get(from.as_str())
            .copied()
            .ok_or_else(|| Error::RateLookup(format!("no stub rate for {from} to {to}")))
    }
}

/// A parser that returns the same line items for every description.
#[derive(Debug)]
pub struct StubParser {
    items: Option<Vec<LineItem>>,
}

impl StubParser {
    pub fn new(items: Vec<LineItem>) -> Self {
        Self { items: Some(items) }
    }

    /// Every call fails as if the service returned malformed output.
    pub fn failing() -> Self {
        Self { items: None }
    }
}

#[async_trait]
impl DescriptionParser for StubParser {
    async fn parse(&self, _description: &str) -> Result<Vec<LineItem>, Error> {
        self.items
            .clone()
            .ok_or_else(|| Error::Parse("stub parser failure".to_owned()))
    }
}

pub fn line_item(name: &str, category: Category, amount: Value, currency: &str) -> LineItem {
    LineItem {
        name: name.to_owned(),
        category,
        amount,
        currency: currency.parse().expect("invalid test currency"),
    }
}

pub fn test_ingestion_config() -> IngestionConfig {
    IngestionConfig {
        base_currency: "SGD".parse().expect("invalid test currency"),
        local_timezone: "Asia/Singapore".to_owned(),
        atomic: false,
    }
}

/// Create app state over an in-memory store with a cheap password hash cost.
pub fn must_create_state(parser: StubParser, exchange_rates: StubExchangeRates) -> AppState {
    AppState::new(
        "42",
        Arc::new(must_create_store()),
        Arc::new(parser),
        Arc::new(exchange_rates),
        test_ingestion_config(),
    )
    .expect("could not create app state")
    .with_password_hash_cost(4)
}

/// Encrypt the token of `session` with `key` the way the server does, so that
/// it can be sent as the session cookie.
pub fn session_cookie(key: &Key, session: &Session) -> Cookie<'static> {
    let jar = set_session_cookie(PrivateCookieJar::new(key.clone()), session);
    let response = jar.into_response();
    let header = response
        .headers()
        .get(SET_COOKIE)
        .expect("missing Set-Cookie header")
        .to_str()
        .expect("invalid Set-Cookie header")
        .to_owned();

    Cookie::parse(header).expect("invalid session cookie")
}

/// Serve `router` on an ephemeral local port, returning its base URL,
/// e.g. "http://127.0.0.1:49152".
pub async fn spawn_http_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("could not bind test listener");
    let addr = listener.local_addr().expect("could not get test address");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("test server stopped unexpectedly");
    });

    format!("http://{addr}")
}
