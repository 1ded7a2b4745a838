//! Converts amounts into the base currency with live exchange rates.

use std::{collections::HashMap, fmt::Display, str::FromStr, time::Duration};

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::Error;

/// An ISO 4217 currency code such as "SGD", always upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// The code as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = Error;

    /// Parse a three letter currency code, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();

        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::Validation(format!("invalid currency code {s:?}")));
        }

        Ok(Self(code.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Round a money amount to two decimal places for storage.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a JSON number into an exact decimal.
///
/// The number's textual form is parsed so that e.g. `8.1` becomes exactly
/// 8.1 rather than the nearest binary float.
pub fn decimal_from_number(number: &Number) -> Option<Decimal> {
    let text = number.to_string();

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Read a money amount from a JSON value.
///
/// # Errors
/// Returns [Error::Validation] if `value` is not a JSON number.
pub fn parse_amount(value: &Value) -> Result<Decimal, Error> {
    match value {
        Value::Number(number) => decimal_from_number(number)
            .ok_or_else(|| Error::Validation(format!("amount {number} is out of range"))),
        other => Err(Error::Validation(format!("amount {other} is not a number"))),
    }
}

/// A source of live exchange rates.
#[async_trait]
pub trait ExchangeRates: std::fmt::Debug + Send + Sync {
    /// How many units of `to` one unit of `from` is worth.
    async fn rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<Decimal, Error>;
}

/// Fetches rates from an open.er-api.com compatible service, which serves
/// `GET {base_url}/{currency}` as `{"result": "success", "rates": {...}}`.
#[derive(Debug, Clone)]
pub struct OpenExchangeRates {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: Option<String>,
    #[serde(default)]
    rates: HashMap<String, Number>,
}

impl OpenExchangeRates {
    /// Create a client for the rate service at `base_url`, e.g.
    /// "https://open.er-api.com/v6/latest". Requests give up after `timeout`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::RateLookup(format!("could not build HTTP client: {error}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }
}

#[async_trait]
impl ExchangeRates for OpenExchangeRates {
    async fn rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<Decimal, Error> {
        let url = format!("{}/{}", self.base_url, from);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|error| Error::RateLookup(format!("request for {from} failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RateLookup(format!(
                "rate service returned {status} for {from}"
            )));
        }

        let body: LatestRatesResponse = response
            .json()
            .await
            .map_err(|error| Error::RateLookup(format!("invalid response for {from}: {error}")))?;

        rate_from_response(body, from, to)
    }
}

fn rate_from_response(
    response: LatestRatesResponse,
    from: &CurrencyCode,
    to: &CurrencyCode,
) -> Result<Decimal, Error> {
    if let Some(result) = response.result.as_deref()
        && result != "success"
    {
        return Err(Error::RateLookup(format!(
            "rate service returned result {result:?} for {from}"
        )));
    }

    let rate = response
        .rates
        .get(to.as_str())
        .ok_or_else(|| Error::RateLookup(format!("no {to} rate for {from}")))?;

    match decimal_from_number(rate) {
        Some(rate) if rate > Decimal::ZERO => Ok(rate),
        _ => Err(Error::RateLookup(format!("invalid {to} rate {rate} for {from}"))),
    }
}

/// Converts amounts into the base currency.
#[derive(Debug, Clone, Copy)]
pub struct CurrencyNormalizer<'a> {
    base: &'a CurrencyCode,
    rates: &'a dyn ExchangeRates,
}

impl<'a> CurrencyNormalizer<'a> {
    /// Create a normalizer that converts into `base` using `rates`.
    pub fn new(base: &'a CurrencyCode, rates: &'a dyn ExchangeRates) -> Self {
        Self { base, rates }
    }

    /// Convert `amount` of `currency` into the base currency.
    ///
    /// Amounts already in the base currency are returned unchanged without
    /// looking up a rate. Otherwise the result is rounded to two decimal places.
    ///
    /// # Errors
    /// Returns [Error::RateLookup] if the rate could not be fetched. A failed
    /// lookup is never treated as a rate of one.
    /// Returns [Error::Validation] if the converted amount is too large to represent.
    pub async fn to_base(&self, amount: Decimal, currency: &CurrencyCode) -> Result<Decimal, Error> {
        if currency == self.base {
            return Ok(amount);
        }

        let rate = self.rates.rate(currency, self.base).await?;

        amount
            .checked_mul(rate)
            .map(round_money)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "{amount} {currency} is too large to convert into {}",
                    self.base
                ))
            })
    }
}
