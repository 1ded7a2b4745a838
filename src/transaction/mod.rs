//! Transactions: turning descriptions into stored, currency-normalized
//! records, and reading, updating and deleting them.

mod core;
mod create_endpoint;
mod delete_endpoint;
mod edit_endpoint;
mod ingest;
mod list_endpoint;
mod update;

pub use create_endpoint::create_transaction_endpoint;
pub use delete_endpoint::delete_transaction_endpoint;
pub use edit_endpoint::edit_transaction_endpoint;
pub use ingest::IngestionConfig;
pub use list_endpoint::get_transactions_endpoint;

#[cfg(test)]
pub(crate) use core::Transaction;
