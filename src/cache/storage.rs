//! Cache storage trait and SQLite implementation.
//!
//! Responses are grouped into named partitions. Entries are keyed by the
//! SHA-256 digest of the request URL.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::traits::Response;

/// A stored response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  pub response: Response,
  /// When the response was stored
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Names of all existing partitions.
  fn partitions(&self) -> Result<Vec<String>>;

  /// Delete a partition and its entries. Returns whether it existed.
  fn delete_partition(&self, partition: &str) -> Result<bool>;

  /// Look up the response stored for `url`.
  fn match_url(&self, partition: &str, url: &str) -> Result<Option<CachedResponse>>;

  /// Store a response for `url`, replacing any previous one.
  fn put(&self, partition: &str, url: &str, response: &Response) -> Result<()>;

  /// Store several responses at once: all of them or none.
  fn put_all(&self, partition: &str, entries: &[(String, Response)]) -> Result<()>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open or create the response cache at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  #[allow(dead_code)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::from_connection(conn)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("storefront").join("responses.db"))
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Named partitions
CREATE TABLE IF NOT EXISTS partitions (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Stored responses
CREATE TABLE IF NOT EXISTS responses (
    partition TEXT NOT NULL,
    url_hash TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    opaque INTEGER NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (partition, url_hash)
);

CREATE INDEX IF NOT EXISTS idx_responses_partition ON responses(partition);
"#;

/// SHA256 hash for stable, fixed-length keys
fn url_hash(url: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(url.as_bytes());
  hex::encode(hasher.finalize())
}

fn insert_response(conn: &Connection, partition: &str, url: &str, response: &Response) -> Result<()> {
  conn
    .execute(
      "INSERT OR REPLACE INTO responses (partition, url_hash, url, status, opaque, content_type, body, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))",
      params![
        partition,
        url_hash(url),
        url,
        response.status,
        response.opaque,
        response.content_type,
        response.body
      ],
    )
    .map_err(|e| eyre!("Failed to store response for {}: {}", url, e))?;
  Ok(())
}

impl CacheStorage for SqliteStorage {
  fn partitions(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT name FROM partitions ORDER BY name")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list partitions: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read partition name: {}", e))?;

    Ok(names)
  }

  fn delete_partition(&self, partition: &str) -> Result<bool> {
    let mut conn = self.lock()?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute("DELETE FROM responses WHERE partition = ?", params![partition])
      .map_err(|e| eyre!("Failed to delete responses of {}: {}", partition, e))?;

    let removed = tx
      .execute("DELETE FROM partitions WHERE name = ?", params![partition])
      .map_err(|e| eyre!("Failed to delete partition {}: {}", partition, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  fn match_url(&self, partition: &str, url: &str) -> Result<Option<CachedResponse>> {
    let conn = self.lock()?;

    let row: Option<(u16, bool, Option<String>, Vec<u8>, String)> = conn
      .query_row(
        "SELECT status, opaque, content_type, body, cached_at FROM responses
         WHERE partition = ? AND url_hash = ?",
        params![partition, url_hash(url)],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {}: {}", url, e))?;

    match row {
      Some((status, opaque, content_type, body, cached_at_str)) => Ok(Some(CachedResponse {
        response: Response {
          status,
          opaque,
          content_type,
          body,
        },
        cached_at: parse_datetime(&cached_at_str)?,
      })),
      None => Ok(None),
    }
  }

  fn put(&self, partition: &str, url: &str, response: &Response) -> Result<()> {
    self.put_all(partition, &[(url.to_string(), response.clone())])
  }

  fn put_all(&self, partition: &str, entries: &[(String, Response)]) -> Result<()> {
    let mut conn = self.lock()?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "INSERT OR IGNORE INTO partitions (name) VALUES (?)",
      params![partition],
    )
    .map_err(|e| eyre!("Failed to open partition {}: {}", partition, e))?;

    for (url, response) in entries {
      insert_response(&tx, partition, url, response)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_put_and_match() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let response = Response::new(200, Some("image/png"), vec![1, 2, 3]);
    storage.put("images-v1", "https://shop.test/a.png", &response).unwrap();

    let cached = storage
      .match_url("images-v1", "https://shop.test/a.png")
      .unwrap()
      .unwrap();
    assert_eq!(cached.response, response);
    assert!(storage.match_url("images-v1", "https://shop.test/b.png").unwrap().is_none());
    assert!(storage.match_url("fonts-v1", "https://shop.test/a.png").unwrap().is_none());
  }

  #[test]
  fn test_partitions_listed_and_deleted() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .put("html-v1", "https://shop.test/", &Response::new(200, None, "<html>"))
      .unwrap();
    storage
      .put("static-v1", "https://shop.test/app.css", &Response::new(200, None, "body{}"))
      .unwrap();

    assert_eq!(storage.partitions().unwrap(), vec!["html-v1", "static-v1"]);

    assert!(storage.delete_partition("static-v1").unwrap());
    assert!(!storage.delete_partition("static-v1").unwrap());
    assert_eq!(storage.partitions().unwrap(), vec!["html-v1"]);
    assert!(storage
      .match_url("static-v1", "https://shop.test/app.css")
      .unwrap()
      .is_none());
  }

  #[test]
  fn test_url_hash_is_stable_hex() {
    let hash = url_hash("https://shop.test/");
    assert_eq!(hash.len(), 64);
    assert_eq!(hash, url_hash("https://shop.test/"));
    assert_ne!(hash, url_hash("https://shop.test/other"));
  }

  #[test]
  fn test_parse_sqlite_datetime() {
    let dt = parse_datetime("2024-03-01 12:30:00").unwrap();
    assert_eq!(dt.to_rfc3339(), "2024-03-01T12:30:00+00:00");
    assert!(parse_datetime("yesterday").is_err());
  }
}
