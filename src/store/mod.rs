//! The key-value store that holds every record of the application.
//!
//! All records live in one logical table addressed by an [ItemKey], the pair
//! of an [EntityType] and a string entity key. The typed modules
//! ([session](crate::session), [account](crate::account),
//! [transaction](crate::transaction)) translate their records to and from
//! [Item]s so that callers never deal with the raw key scheme.

mod sqlite;

use std::{fmt::Debug, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::Error;

pub use sqlite::SQLiteStore;

/// The kind of record an item holds, used as the partition key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    /// A signed-in session, keyed by its token.
    Session,
    /// A user account, keyed by email.
    Account,
    /// A transaction, keyed by `{email}_{id}`.
    Transaction,
}

impl EntityType {
    /// The tag stored in the partition key column.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Session => "SESSION",
            EntityType::Account => "ACCOUNT",
            EntityType::Transaction => "TRANSACTION",
        }
    }

    /// Parse a stored partition key tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "SESSION" => Some(EntityType::Session),
            "ACCOUNT" => Some(EntityType::Account),
            "TRANSACTION" => Some(EntityType::Transaction),
            _ => None,
        }
    }
}

/// The composite primary key of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    /// The partition key.
    pub entity_type: EntityType,
    /// The sort key, whose meaning depends on `entity_type`.
    pub entity_key: String,
}

impl ItemKey {
    /// Create a key for `entity_key` in the partition `entity_type`.
    pub fn new(entity_type: EntityType, entity_key: impl Into<String>) -> Self {
        Self {
            entity_type,
            entity_key: entity_key.into(),
        }
    }
}

/// The attributes of an item, stored as a JSON object.
pub type Attributes = Map<String, Value>;

/// A record in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Where the item is stored.
    pub key: ItemKey,
    /// The record's fields.
    pub attributes: Attributes,
    /// When the store may evict the item. `None` means the item never expires.
    pub expires_at: Option<OffsetDateTime>,
}

impl Item {
    /// Serialize `record` into the attributes of a new item.
    ///
    /// # Errors
    /// Returns [Error::JSONSerializationError] if `record` does not serialize
    /// to a JSON object.
    pub fn from_record<T: Serialize>(key: ItemKey, record: &T) -> Result<Self, Error> {
        match serde_json::to_value(record)? {
            Value::Object(attributes) => Ok(Self {
                key,
                attributes,
                expires_at: None,
            }),
            other => Err(Error::JSONSerializationError(format!(
                "expected a JSON object for {:?}, got {other}",
                key
            ))),
        }
    }

    /// Set the time after which the store may evict the item.
    pub fn expires_at(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Deserialize the attributes into a typed record.
    ///
    /// # Errors
    /// Returns [Error::CorruptRecord] if the attributes do not match `T`.
    pub fn to_record<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(Value::Object(self.attributes.clone())).map_err(|error| {
            Error::CorruptRecord(format!(
                "{} {}: {error}",
                self.key.entity_type.as_str(),
                self.key.entity_key
            ))
        })
    }

    /// Whether the item's time to live has passed at `now`.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Get, put, query and delete items in the single application table.
///
/// Like a managed key-value store with time-to-live eviction, reads return
/// items that have expired but have not been purged yet. Callers that care
/// about expiry must check [Item::is_expired] themselves.
pub trait KeyValueStore: Debug + Send + Sync {
    /// Get the item stored under `key`, if any.
    fn get(&self, key: &ItemKey) -> Result<Option<Item>, Error>;

    /// Insert `item`, replacing any item stored under the same key.
    fn put(&self, item: Item) -> Result<(), Error>;

    /// Insert `item` only if no item is stored under its key.
    ///
    /// Returns `false`, leaving the stored item untouched, if the key is taken.
    /// The check and the write happen atomically.
    fn insert(&self, item: Item) -> Result<bool, Error>;

    /// Get every item in the partition `entity_type` whose entity key starts
    /// with `prefix`, in the store's native order.
    fn query_prefix(&self, entity_type: EntityType, prefix: &str) -> Result<Vec<Item>, Error>;

    /// Delete the item stored under `key`. Deleting a missing key succeeds.
    fn delete(&self, key: &ItemKey) -> Result<(), Error>;

    /// Evict every item that has expired at `now`, returning how many were removed.
    fn purge_expired(&self, now: OffsetDateTime) -> Result<usize, Error>;
}

/// Evict expired items from `store` every `interval`.
///
/// This is the store's time-to-live eviction and is meant to be spawned as a
/// background task. The first purge happens immediately.
pub async fn purge_expired_items_periodically(
    store: Arc<dyn KeyValueStore>,
    interval: std::time::Duration,
) {
    let mut interval = tokio::time::interval(interval);

    loop {
        interval.tick().await;

        match store.purge_expired(OffsetDateTime::now_utc()) {
            Ok(0) => tracing::debug!("No expired items to purge"),
            Ok(count) => tracing::info!("Purged {count} expired items"),
            Err(error) => tracing::error!("An error occurred while purging expired items: {error}"),
        }
    }
}
