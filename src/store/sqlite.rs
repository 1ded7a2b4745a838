//! A [KeyValueStore] backed by a single SQLite table.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};
use time::OffsetDateTime;

use crate::{
    Error,
    store::{Attributes, EntityType, Item, ItemKey, KeyValueStore},
};

/// Stores items in the SQLite table `item`.
///
/// The connection is shared behind a mutex, so clones of the store refer to
/// the same database.
#[derive(Debug, Clone)]
pub struct SQLiteStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteStore {
    /// Create a store from a database connection, creating the `item` table if
    /// needed.
    ///
    /// # Errors
    /// Returns an error if the table cannot be created.
    pub fn new(connection: Connection) -> Result<Self, Error> {
        create_item_table(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|error| {
            tracing::error!("Could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }
}

/// Create the item table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_item_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS item (
                entity_type TEXT NOT NULL,
                entity_key TEXT NOT NULL,
                attributes TEXT NOT NULL,
                expires_at INTEGER,
                PRIMARY KEY (entity_type, entity_key)
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_item_expires_at ON item(expires_at);",
        (),
    )?;

    Ok(())
}

/// An item as stored in a row, before conversion to the domain types.
type RawItem = (String, String, String, Option<i64>);

fn map_raw_item(row: &rusqlite::Row) -> Result<RawItem, rusqlite::Error> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_item((entity_type, entity_key, attributes, expires_at): RawItem) -> Result<Item, Error> {
    let entity_type = EntityType::from_tag(&entity_type)
        .ok_or_else(|| Error::CorruptRecord(format!("unknown entity type {entity_type}")))?;
    let attributes: Attributes = serde_json::from_str(&attributes)
        .map_err(|error| Error::CorruptRecord(format!("{entity_key}: {error}")))?;
    let expires_at = expires_at
        .map(OffsetDateTime::from_unix_timestamp)
        .transpose()
        .map_err(|error| Error::CorruptRecord(format!("{entity_key}: {error}")))?;

    Ok(Item {
        key: ItemKey::new(entity_type, entity_key),
        attributes,
        expires_at,
    })
}

impl KeyValueStore for SQLiteStore {
    fn get(&self, key: &ItemKey) -> Result<Option<Item>, Error> {
        let raw_item = self
            .lock()?
            .prepare(
                "SELECT entity_type, entity_key, attributes, expires_at FROM item
                WHERE entity_type = ?1 AND entity_key = ?2",
            )?
            .query_row(
                params![key.entity_type.as_str(), key.entity_key],
                map_raw_item,
            )
            .optional()?;

        raw_item.map(into_item).transpose()
    }

    fn put(&self, item: Item) -> Result<(), Error> {
        let attributes = serde_json::to_string(&item.attributes)?;
        let expires_at = item.expires_at.map(OffsetDateTime::unix_timestamp);

        self.lock()?.execute(
            "INSERT OR REPLACE INTO item (entity_type, entity_key, attributes, expires_at)
            VALUES (?1, ?2, ?3, ?4)",
            params![
                item.key.entity_type.as_str(),
                item.key.entity_key,
                attributes,
                expires_at
            ],
        )?;

        Ok(())
    }

    fn insert(&self, item: Item) -> Result<bool, Error> {
        let attributes = serde_json::to_string(&item.attributes)?;
        let expires_at = item.expires_at.map(OffsetDateTime::unix_timestamp);

        let rows_affected = self.lock()?.execute(
            "INSERT INTO item (entity_type, entity_key, attributes, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (entity_type, entity_key) DO NOTHING",
            params![
                item.key.entity_type.as_str(),
                item.key.entity_key,
                attributes,
                expires_at
            ],
        )?;

        Ok(rows_affected == 1)
    }

    fn query_prefix(&self, entity_type: EntityType, prefix: &str) -> Result<Vec<Item>, Error> {
        // substr instead of LIKE so that '%' and '_' in emails match literally.
        let raw_items = self
            .lock()?
            .prepare(
                "SELECT entity_type, entity_key, attributes, expires_at FROM item
                WHERE entity_type = ?1 AND substr(entity_key, 1, length(?2)) = ?2",
            )?
            .query_map(params![entity_type.as_str(), prefix], map_raw_item)?
            .collect::<Result<Vec<_>, _>>()?;

        raw_items.into_iter().map(into_item).collect()
    }

    fn delete(&self, key: &ItemKey) -> Result<(), Error> {
        self.lock()?.execute(
            "DELETE FROM item WHERE entity_type = ?1 AND entity_key = ?2",
            params![key.entity_type.as_str(), key.entity_key],
        )?;

        Ok(())
    }

    fn purge_expired(&self, now: OffsetDateTime) -> Result<usize, Error> {
        let rows_affected = self.lock()?.execute(
            "DELETE FROM item WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now.unix_timestamp()],
        )?;

        Ok(rows_affected)
    }
}

#[cfg(test)]
mod sqlite_store_tests {
    use rusqlite::Connection;
    use serde_json::json;
    use time::{Duration, OffsetDateTime};

    use crate::store::{EntityType, Item, ItemKey, KeyValueStore, SQLiteStore};

    fn get_store() -> SQLiteStore {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");

        SQLiteStore::new(conn).expect("Could not create item table")
    }

    fn item(entity_type: EntityType, entity_key: &str, value: serde_json::Value) -> Item {
        Item::from_record(ItemKey::new(entity_type, entity_key), &value).unwrap()
    }

    #[test]
    fn get_missing_item_returns_none() {
        let store = get_store();

        let got = store
            .get(&ItemKey::new(EntityType::Account, "nobody@example.com"))
            .unwrap();

        assert_eq!(got, None);
    }

    #[test]
    fn put_then_get_returns_item() {
        let store = get_store();
        let want = item(EntityType::Account, "a@example.com", json!({"budget": "12.50"}));

        store.put(want.clone()).unwrap();
        let got = store.get(&want.key).unwrap();

        assert_eq!(got, Some(want));
    }

    #[test]
    fn put_replaces_existing_item() {
        let store = get_store();
        let key = ItemKey::new(EntityType::Account, "a@example.com");
        store
            .put(item(EntityType::Account, "a@example.com", json!({"budget": "0"})))
            .unwrap();
        let want = item(EntityType::Account, "a@example.com", json!({"budget": "100"}));

        store.put(want.clone()).unwrap();

        assert_eq!(store.get(&key).unwrap(), Some(want));
    }

    #[test]
    fn insert_adds_missing_item() {
        let store = get_store();
        let want = item(EntityType::Account, "a@example.com", json!({"budget": "0"}));

        assert_eq!(store.insert(want.clone()), Ok(true));
        assert_eq!(store.get(&want.key).unwrap(), Some(want));
    }

    #[test]
    fn insert_keeps_existing_item() {
        let store = get_store();
        let existing = item(EntityType::Account, "a@example.com", json!({"name": "First"}));
        store.put(existing.clone()).unwrap();

        let inserted = store
            .insert(item(EntityType::Account, "a@example.com", json!({"name": "Second"})))
            .unwrap();

        assert!(!inserted);
        assert_eq!(store.get(&existing.key).unwrap(), Some(existing));
    }

    #[test]
    fn same_entity_key_in_different_partitions_does_not_collide() {
        let store = get_store();
        let account = item(EntityType::Account, "shared", json!({"kind": "account"}));
        let session = item(EntityType::Session, "shared", json!({"kind": "session"}));

        store.put(account.clone()).unwrap();
        store.put(session.clone()).unwrap();

        assert_eq!(store.get(&account.key).unwrap(), Some(account));
        assert_eq!(store.get(&session.key).unwrap(), Some(session));
    }

    #[test]
    fn query_prefix_returns_only_matching_partition_and_prefix() {
        let store = get_store();
        store
            .put(item(EntityType::Transaction, "a@x.com_1", json!({})))
            .unwrap();
        store
            .put(item(EntityType::Transaction, "a@x.com_2", json!({})))
            .unwrap();
        store
            .put(item(EntityType::Transaction, "b@x.com_1", json!({})))
            .unwrap();
        store
            .put(item(EntityType::Account, "a@x.com_", json!({})))
            .unwrap();

        let mut keys: Vec<String> = store
            .query_prefix(EntityType::Transaction, "a@x.com_")
            .unwrap()
            .into_iter()
            .map(|item| item.key.entity_key)
            .collect();
        keys.sort();

        assert_eq!(keys, vec!["a@x.com_1", "a@x.com_2"]);
    }

    #[test]
    fn query_prefix_treats_wildcards_literally() {
        let store = get_store();
        store
            .put(item(EntityType::Transaction, "a%b@x.com_1", json!({})))
            .unwrap();
        store
            .put(item(EntityType::Transaction, "azzb@x.com_1", json!({})))
            .unwrap();

        let items = store
            .query_prefix(EntityType::Transaction, "a%b@x.com_")
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].key.entity_key, "a%b@x.com_1");
    }

    #[test]
    fn delete_removes_item() {
        let store = get_store();
        let item = item(EntityType::Session, "token", json!({}));
        store.put(item.clone()).unwrap();

        store.delete(&item.key).unwrap();

        assert_eq!(store.get(&item.key).unwrap(), None);
    }

    #[test]
    fn delete_missing_item_succeeds() {
        let store = get_store();

        let result = store.delete(&ItemKey::new(EntityType::Session, "missing"));

        assert_eq!(result, Ok(()));
    }

    #[test]
    fn expired_items_are_readable_until_purged() {
        let store = get_store();
        let now = OffsetDateTime::now_utc();
        let expired = item(EntityType::Session, "old", json!({})).expires_at(now - Duration::days(1));
        let live = item(EntityType::Session, "new", json!({})).expires_at(now + Duration::days(1));
        let forever = item(EntityType::Account, "a@x.com", json!({}));
        store.put(expired.clone()).unwrap();
        store.put(live.clone()).unwrap();
        store.put(forever.clone()).unwrap();

        assert!(store.get(&expired.key).unwrap().is_some());

        let purged = store.purge_expired(now).unwrap();

        assert_eq!(purged, 1);
        assert_eq!(store.get(&expired.key).unwrap(), None);
        assert!(store.get(&live.key).unwrap().is_some());
        assert!(store.get(&forever.key).unwrap().is_some());
    }
}
