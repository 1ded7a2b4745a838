//! Defines the transaction record and the store operations for it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    Category, CurrencyCode, Error,
    store::{EntityType, Item, ItemKey, KeyValueStore},
};

/// The ID of a transaction, unique across all accounts.
pub type TransactionId = Uuid;

/// One purchase, converted into the base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The email of the account that owns the transaction.
    pub email: String,
    /// When the transaction was recorded, in the application's timezone.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// A short summary of the purchase, e.g. "Lunch".
    pub simple_description: String,
    /// The full text the transaction was extracted from. Every transaction
    /// from the same description shares it.
    pub original_description: String,
    /// The spending category.
    pub category: Category,
    /// The amount in the base currency.
    #[serde(rename = "sgd_amount")]
    pub base_amount: Decimal,
    /// The amount in `original_currency`.
    pub original_amount: Decimal,
    /// The currency the purchase was made in.
    pub original_currency: CurrencyCode,
}

/// The owner's email followed by the transaction ID, so that an account's
/// transactions can be listed with a prefix query.
fn transaction_key(email: &str, id: TransactionId) -> ItemKey {
    ItemKey::new(EntityType::Transaction, format!("{email}_{id}"))
}

fn owner_prefix(email: &str) -> String {
    format!("{email}_")
}

/// Parse a transaction ID from a request.
///
/// Returns `None` if `raw_id` is not a valid ID, in which case no transaction
/// can have it.
pub fn parse_transaction_id(raw_id: &str) -> Option<TransactionId> {
    Uuid::parse_str(raw_id.trim()).ok()
}

/// Insert `transaction`, replacing any stored transaction with the same owner and ID.
///
/// # Errors
/// Returns an error if the store could not be written to.
pub fn save_transaction(store: &dyn KeyValueStore, transaction: &Transaction) -> Result<(), Error> {
    store.put(Item::from_record(
        transaction_key(&transaction.email, transaction.id),
        transaction,
    )?)
}

/// Get the transaction `id` owned by `email`.
///
/// # Errors
/// Returns [Error::NotFound] if there is no such transaction or it belongs to
/// another account, or a store error.
pub fn get_transaction(
    store: &dyn KeyValueStore,
    email: &str,
    id: TransactionId,
) -> Result<Transaction, Error> {
    let transaction: Transaction = store
        .get(&transaction_key(email, id))?
        .ok_or(Error::NotFound)?
        .to_record()?;

    if transaction.email != email {
        tracing::warn!(
            "Transaction {id} stored under {email} is owned by {}",
            transaction.email
        );
        return Err(Error::NotFound);
    }

    Ok(transaction)
}

/// Get every transaction owned by `email`, in the store's native order.
///
/// # Errors
/// Returns an error if the store could not be read or a record is corrupt.
pub fn list_transactions(store: &dyn KeyValueStore, email: &str) -> Result<Vec<Transaction>, Error> {
    let mut transactions = Vec::new();

    for item in store.query_prefix(EntityType::Transaction, &owner_prefix(email))? {
        let transaction: Transaction = item.to_record()?;

        // The prefix of one email can be a whole other email followed by '_'.
        if transaction.email == email {
            transactions.push(transaction);
        }
    }

    Ok(transactions)
}

/// Delete the transaction `id` owned by `email`.
///
/// Deleting a transaction that does not exist, or that belongs to another
/// account, succeeds without changing anything.
///
/// # Errors
/// Returns an error if the store could not be read or written to.
pub fn delete_transaction(
    store: &dyn KeyValueStore,
    email: &str,
    id: TransactionId,
) -> Result<(), Error> {
    match get_transaction(store, email, id) {
        Ok(transaction) => store.delete(&transaction_key(&transaction.email, transaction.id)),
        Err(Error::NotFound) => Ok(()),
        Err(error) => Err(error),
    }
}
