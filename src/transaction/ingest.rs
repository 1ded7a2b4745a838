//! Turns a free-text description into stored transactions.
//!
//! The description is split into line items by a [DescriptionParser], each
//! item's amount is converted into the base currency and the results are
//! stored as new transactions that share the description as their
//! `original_description`.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    CurrencyCode, Error, ExchangeRates, LineItem,
    currency::{CurrencyNormalizer, parse_amount},
    parser::DescriptionParser,
    store::KeyValueStore,
    timezone::now_in,
    transaction::core::{Transaction, delete_transaction, save_transaction},
};

/// Settings for turning descriptions into transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionConfig {
    /// The currency every transaction amount is converted into.
    pub base_currency: CurrencyCode,
    /// The canonical timezone used for transaction dates, e.g. "Asia/Singapore".
    pub local_timezone: String,
    /// Whether a description is stored all-or-nothing.
    ///
    /// When `false`, items are converted and stored one at a time in order, so
    /// a failure leaves the items before it stored. When `true`, every item is
    /// converted before anything is stored and items already stored are
    /// deleted again if a later write fails.
    pub atomic: bool,
}

/// The collaborators needed to ingest a description.
#[derive(Debug, Clone, Copy)]
pub struct Ingestor<'a> {
    /// Where transactions are stored.
    pub store: &'a dyn KeyValueStore,
    /// Splits descriptions into line items.
    pub parser: &'a dyn DescriptionParser,
    /// Converts amounts into the base currency.
    pub exchange_rates: &'a dyn ExchangeRates,
    /// The base currency, timezone and failure policy.
    pub config: &'a IngestionConfig,
}

impl Ingestor<'_> {
    /// Parse `description`, convert each line item into the base currency and
    /// store it as a new transaction owned by `email`.
    ///
    /// Returns the stored transactions in the order the parser returned them.
    /// A description with no line items stores nothing.
    ///
    /// # Errors
    /// Returns:
    /// - [Error::Validation] if the description is blank or an amount is not a number,
    /// - [Error::Parse] if the description could not be parsed,
    /// - [Error::RateLookup] if an exchange rate could not be fetched,
    /// - or a store error.
    ///
    /// See [IngestionConfig::atomic] for which transactions remain stored after an error.
    pub async fn ingest(&self, email: &str, description: &str) -> Result<Vec<Transaction>, Error> {
        if description.trim().is_empty() {
            return Err(Error::Validation("description cannot be empty".to_owned()));
        }

        let date = now_in(&self.config.local_timezone)?;
        let items = self.parser.parse(description).await?;
        tracing::debug!("Parsed {} line items for {email}", items.len());

        if self.config.atomic {
            self.ingest_all_or_nothing(items, email, description, date)
                .await
        } else {
            self.ingest_in_order(items, email, description, date).await
        }
    }

    async fn ingest_in_order(
        &self,
        items: Vec<LineItem>,
        email: &str,
        description: &str,
        date: OffsetDateTime,
    ) -> Result<Vec<Transaction>, Error> {
        let item_count = items.len();
        let mut stored = Vec::with_capacity(item_count);

        for item in items {
            let result = match self.convert(item, email, description, date).await {
                Ok(transaction) => {
                    save_transaction(self.store, &transaction).map(|_| transaction)
                }
                Err(error) => Err(error),
            };

            match result {
                Ok(transaction) => stored.push(transaction),
                Err(error) => {
                    if !stored.is_empty() {
                        tracing::warn!(
                            "Ingestion for {email} failed after storing {} of {item_count} transactions",
                            stored.len()
                        );
                    }
                    return Err(error);
                }
            }
        }

        Ok(stored)
    }

    async fn ingest_all_or_nothing(
        &self,
        items: Vec<LineItem>,
        email: &str,
        description: &str,
        date: OffsetDateTime,
    ) -> Result<Vec<Transaction>, Error> {
        let mut transactions = Vec::with_capacity(items.len());

        for item in items {
            transactions.push(self.convert(item, email, description, date).await?);
        }

        for (stored_count, transaction) in transactions.iter().enumerate() {
            if let Err(error) = save_transaction(self.store, transaction) {
                self.roll_back(email, &transactions[..stored_count]);
                return Err(error);
            }
        }

        Ok(transactions)
    }

    fn roll_back(&self, email: &str, stored: &[Transaction]) {
        for transaction in stored {
            if let Err(error) = delete_transaction(self.store, email, transaction.id) {
                tracing::error!(
                    "Could not roll back transaction {} for {email}: {error}",
                    transaction.id
                );
            }
        }
    }

    async fn convert(
        &self,
        item: LineItem,
        email: &str,
        description: &str,
        date: OffsetDateTime,
    ) -> Result<Transaction, Error> {
        let original_amount = parse_amount(&item.amount)?;
        let base_amount = CurrencyNormalizer::new(&self.config.base_currency, self.exchange_rates)
            .to_base(original_amount, &item.currency)
            .await?;

        Ok(Transaction {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            date,
            simple_description: item.name,
            original_description: description.to_owned(),
            category: item.category,
            base_amount,
            original_amount,
            original_currency: item.currency,
        })
    }
}
