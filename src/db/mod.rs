//! Local key-value store used as the durable cache for cart and products.
//!
//! Values live in named collections and are stored as JSON blobs.
//! Writes overwrite (last write wins); nothing is merged.

pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use schema::{MIGRATIONS, SCHEMA_VERSION};

/// Named collections in the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
  Products,
  Cart,
  Metadata,
}

impl Collection {
  pub fn name(self) -> &'static str {
    match self {
      Collection::Products => "products",
      Collection::Cart => "cart",
      Collection::Metadata => "metadata",
    }
  }
}

/// A pending write, applied together with others by [`KvStore::put_batch`].
#[derive(Debug, Clone)]
pub struct Write {
  pub collection: Collection,
  pub key: String,
  pub value: Vec<u8>,
}

impl Write {
  /// Build a write holding the JSON encoding of `value`.
  pub fn json<T: Serialize + ?Sized>(collection: Collection, key: &str, value: &T) -> Result<Self> {
    let value =
      serde_json::to_vec(value).map_err(|e| eyre!("Failed to serialize {}: {}", key, e))?;
    Ok(Self {
      collection,
      key: key.to_string(),
      value,
    })
  }
}

/// Trait for key-value store backends.
pub trait KvStore: Send + Sync {
  /// Read the raw bytes stored under `key`, if any.
  fn get_raw(&self, collection: Collection, key: &str) -> Result<Option<Vec<u8>>>;

  /// Apply all writes in one transaction. Either every write lands or none does.
  fn put_batch(&self, writes: &[Write]) -> Result<()>;

  /// Names of the collections present in the store.
  #[allow(dead_code)]
  fn collections(&self) -> Result<Vec<String>>;

  /// Read and decode a JSON value.
  fn get<T: DeserializeOwned>(&self, collection: Collection, key: &str) -> Result<Option<T>> {
    match self.get_raw(collection, key)? {
      Some(bytes) => serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| eyre!("Failed to deserialize {}/{}: {}", collection.name(), key, e)),
      None => Ok(None),
    }
  }

  /// Encode and store a JSON value, replacing whatever was there.
  fn put<T: Serialize + ?Sized>(&self, collection: Collection, key: &str, value: &T) -> Result<()> {
    self.put_batch(&[Write::json(collection, key, value)?])
  }
}

/// Run a blocking store operation on the blocking thread pool.
pub async fn with_store<S, T, F>(store: &Arc<S>, f: F) -> Result<T>
where
  S: KvStore + 'static,
  T: Send + 'static,
  F: FnOnce(&S) -> Result<T> + Send + 'static,
{
  let store = Arc::clone(store);
  tokio::task::spawn_blocking(move || f(&store))
    .await
    .map_err(|e| eyre!("Storage task failed: {}", e))?
}

/// SQLite-backed key-value store.
///
/// Cloning shares the underlying connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
  /// Open or create the store at `path`.
  ///
  /// Opening an existing store keeps its data; missing collections are
  /// created by the version-gated migrations.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open a store that lives only as long as this handle.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory store: {}", e))?;
    Self::from_connection(conn)
  }

  /// Get the default store path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("storefront").join("store.db"))
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Arc::new(Mutex::new(conn)),
    };
    store.run_migrations()?;
    Ok(store)
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Schema version recorded in the database.
  #[allow(dead_code)]
  pub fn schema_version(&self) -> Result<i64> {
    let conn = self.lock()?;
    conn
      .query_row("PRAGMA user_version", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to read schema version: {}", e))
  }

  /// Run pending migrations.
  fn run_migrations(&self) -> Result<()> {
    let mut conn = self.lock()?;

    let current: i64 = conn
      .query_row("PRAGMA user_version", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to read schema version: {}", e))?;

    if current > SCHEMA_VERSION {
      warn!(
        current,
        supported = SCHEMA_VERSION,
        "Store was written by a newer schema, leaving it untouched"
      );
      return Ok(());
    }

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin migration: {}", e))?;

    for (version, migration) in MIGRATIONS.iter().enumerate().skip(current as usize) {
      debug!(from = version, to = version + 1, "Migrating store");
      tx.execute_batch(migration)
        .map_err(|e| eyre!("Failed to run store migration {}: {}", version + 1, e))?;
    }

    tx.pragma_update(None, "user_version", SCHEMA_VERSION)
      .map_err(|e| eyre!("Failed to record schema version: {}", e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit migration: {}", e))?;

    Ok(())
  }
}

impl KvStore for SqliteStore {
  fn get_raw(&self, collection: Collection, key: &str) -> Result<Option<Vec<u8>>> {
    let conn = self.lock()?;

    conn
      .query_row(
        "SELECT value FROM entries WHERE collection = ? AND key = ?",
        params![collection.name(), key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read {}/{}: {}", collection.name(), key, e))
  }

  fn put_batch(&self, writes: &[Write]) -> Result<()> {
    let mut conn = self.lock()?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    for write in writes {
      tx.execute(
        "INSERT OR REPLACE INTO entries (collection, key, value, updated_at)
         VALUES (?, ?, ?, datetime('now'))",
        params![write.collection.name(), write.key, write.value],
      )
      .map_err(|e| {
        eyre!(
          "Failed to write {}/{}: {}",
          write.collection.name(),
          write.key,
          e
        )
      })?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn collections(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT name FROM collections ORDER BY name")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list collections: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read collection name: {}", e))?;

    Ok(names)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_open_creates_all_collections() {
    let store = SqliteStore::open_in_memory().unwrap();
    let names = store.collections().unwrap();
    assert_eq!(names, vec!["cart", "metadata", "products"]);
    assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
  }

  #[test]
  fn test_get_missing_is_none() {
    let store = SqliteStore::open_in_memory().unwrap();
    let value: Option<Vec<String>> = store.get(Collection::Cart, "nothing").unwrap();
    assert!(value.is_none());
  }

  #[test]
  fn test_put_overwrites() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.put(Collection::Metadata, "last-index", &10u64).unwrap();
    store.put(Collection::Metadata, "last-index", &25u64).unwrap();

    let value: Option<u64> = store.get(Collection::Metadata, "last-index").unwrap();
    assert_eq!(value, Some(25));
  }

  #[test]
  fn test_collections_are_separate() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.put(Collection::Cart, "k", &"cart").unwrap();
    store.put(Collection::Products, "k", &"products").unwrap();

    let cart: Option<String> = store.get(Collection::Cart, "k").unwrap();
    let products: Option<String> = store.get(Collection::Products, "k").unwrap();
    assert_eq!(cart.as_deref(), Some("cart"));
    assert_eq!(products.as_deref(), Some("products"));
  }

  #[test]
  fn test_put_batch_writes_every_entry() {
    let store = SqliteStore::open_in_memory().unwrap();
    let writes = vec![
      Write::json(Collection::Products, "all-products", &vec!["a", "b"]).unwrap(),
      Write::json(Collection::Metadata, "last-index", &2u64).unwrap(),
    ];
    store.put_batch(&writes).unwrap();

    let products: Option<Vec<String>> = store.get(Collection::Products, "all-products").unwrap();
    let index: Option<u64> = store.get(Collection::Metadata, "last-index").unwrap();
    assert_eq!(products.unwrap().len(), 2);
    assert_eq!(index, Some(2));
  }

  #[test]
  fn test_reopen_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store.db");

    {
      let store = SqliteStore::open(&path).unwrap();
      store.put(Collection::Cart, "all-cart", &vec![1, 2, 3]).unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    let value: Option<Vec<i32>> = store.get(Collection::Cart, "all-cart").unwrap();
    assert_eq!(value, Some(vec![1, 2, 3]));
    assert_eq!(store.collections().unwrap().len(), 3);
  }

  #[test]
  fn test_upgrade_from_v1_adds_metadata_without_losing_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    {
      let conn = Connection::open(&path).unwrap();
      conn.execute_batch(MIGRATIONS[0]).unwrap();
      conn.pragma_update(None, "user_version", 1).unwrap();
      conn
        .execute(
          "INSERT INTO entries (collection, key, value) VALUES ('cart', 'all-cart', X'5B5D')",
          [],
        )
        .unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.schema_version().unwrap(), 2);
    assert!(store.collections().unwrap().contains(&"metadata".to_string()));

    let cart: Option<Vec<u32>> = store.get(Collection::Cart, "all-cart").unwrap();
    assert_eq!(cart, Some(vec![]));
  }

  #[test]
  fn test_corrupt_value_is_an_error() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
      .put_batch(&[Write {
        collection: Collection::Cart,
        key: "all-cart".to_string(),
        value: b"not json".to_vec(),
      }])
      .unwrap();

    let value: Result<Option<Vec<u32>>> = store.get(Collection::Cart, "all-cart");
    assert!(value.is_err());
  }

  #[tokio::test]
  async fn test_with_store_runs_off_thread() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    with_store(&store, |s| s.put(Collection::Metadata, "x", &7u64))
      .await
      .unwrap();

    let value: Option<u64> = with_store(&store, |s| s.get(Collection::Metadata, "x"))
      .await
      .unwrap();
    assert_eq!(value, Some(7));
  }
}
