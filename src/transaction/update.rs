//! Merges partial updates into stored transactions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{
    Category, CurrencyCode, Error, ExchangeRates,
    currency::{CurrencyNormalizer, parse_amount},
    store::KeyValueStore,
    transaction::core::{Transaction, TransactionId, get_transaction, save_transaction},
};

/// The fields of a transaction that a client may change. Missing fields are
/// left unchanged.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    /// When the transaction happened, as an RFC 3339 date time.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
    /// A short summary of the purchase.
    #[serde(default)]
    pub simple_description: Option<String>,
    /// The category name, coerced into the fixed set of categories.
    #[serde(default)]
    pub category: Option<String>,
    /// The amount in the original currency. Must be a JSON number.
    #[serde(default)]
    pub original_amount: Option<Value>,
    /// The three letter code of the original currency, in any case.
    #[serde(default)]
    pub original_currency: Option<String>,
}

/// Merge `patch` into the transaction `id` owned by `email` and store it.
///
/// If the patch changes the original currency or amount, the base amount is
/// recomputed from the original amount and currency after the merge, even
/// when only one of the two was supplied.
///
/// Nothing is stored if any field of the patch is invalid or the rate lookup fails.
///
/// # Errors
/// Returns:
/// - [Error::NotFound] if there is no such transaction,
/// - [Error::Validation] if the amount is not a number or the currency is not a valid code,
/// - [Error::RateLookup] if the exchange rate could not be fetched,
/// - or a store error.
pub async fn update_transaction(
    store: &dyn KeyValueStore,
    exchange_rates: &dyn ExchangeRates,
    base_currency: &CurrencyCode,
    email: &str,
    id: TransactionId,
    patch: TransactionPatch,
) -> Result<Transaction, Error> {
    let mut transaction = get_transaction(store, email, id)?;

    let original_amount = patch
        .original_amount
        .as_ref()
        .map(parse_amount)
        .transpose()?;
    let original_currency = patch
        .original_currency
        .as_deref()
        .map(str::parse::<CurrencyCode>)
        .transpose()?;
    let needs_conversion = original_amount.is_some() || original_currency.is_some();

    if let Some(date) = patch.date {
        transaction.date = date;
    }

    if let Some(simple_description) = patch.simple_description {
        transaction.simple_description = simple_description;
    }

    if let Some(category) = patch.category {
        transaction.category = Category::coerce(&category);
    }

    if let Some(original_amount) = original_amount {
        transaction.original_amount = original_amount;
    }

    if let Some(original_currency) = original_currency {
        transaction.original_currency = original_currency;
    }

    if needs_conversion {
        transaction.base_amount = CurrencyNormalizer::new(base_currency, exchange_rates)
            .to_base(transaction.original_amount, &transaction.original_currency)
            .await?;
    }

    save_transaction(store, &transaction)?;

    Ok(transaction)
}
