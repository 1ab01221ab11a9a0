//! Cache backend implementations: in-memory and SQLite.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::traits::{CacheBackend, CacheStore, CachedEntry};
use crate::http::{Request, Response};

type EntryMap = HashMap<String, CachedEntry>;

/// In-memory cache backend.
///
/// Used by tests and by hosts that don't need the cache to survive a
/// restart. Store handles share the backend's map.
#[derive(Default)]
pub struct MemoryBackend {
  stores: Arc<Mutex<HashMap<String, EntryMap>>>,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }
}

/// Handle to one named store inside a [`MemoryBackend`].
#[derive(Clone)]
pub struct MemoryStore {
  name: String,
  stores: Arc<Mutex<HashMap<String, EntryMap>>>,
}

impl CacheBackend for MemoryBackend {
  type Store = MemoryStore;

  fn open(&self, name: &str) -> Result<MemoryStore> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    stores.entry(name.to_string()).or_default();

    Ok(MemoryStore {
      name: name.to_string(),
      stores: Arc::clone(&self.stores),
    })
  }

  fn store_names(&self) -> Result<Vec<String>> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let mut names: Vec<String> = stores.keys().cloned().collect();
    names.sort();
    Ok(names)
  }

  fn delete(&self, name: &str) -> Result<bool> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(stores.remove(name).is_some())
  }
}

impl CacheStore for MemoryStore {
  fn lookup(&self, request: &Request) -> Result<Option<CachedEntry>> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(
      stores
        .get(&self.name)
        .and_then(|entries| entries.get(&request.cache_key()))
        .cloned(),
    )
  }

  fn put(&self, request: &Request, response: &Response) -> Result<()> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let entries = stores
      .get_mut(&self.name)
      .ok_or_else(|| eyre!("Store {} was deleted", self.name))?;

    entries.insert(
      request.cache_key(),
      CachedEntry {
        response: response.clone(),
        cached_at: Utc::now(),
      },
    );
    Ok(())
  }

  fn len(&self) -> Result<usize> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(stores.get(&self.name).map(|e| e.len()).unwrap_or(0))
  }
}

/// SQLite-backed cache backend for durable offline storage.
pub struct SqliteBackend {
  conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
  /// Open the backend at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open an in-memory backend (tests).
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let backend = Self {
      conn: Arc::new(Mutex::new(conn)),
    };
    backend.run_migrations()?;
    Ok(backend)
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("safeverse").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- One row per named, versioned store
CREATE TABLE IF NOT EXISTS cache_stores (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Captured responses, keyed by store and request hash
CREATE TABLE IF NOT EXISTS cache_entries (
    store_name TEXT NOT NULL,
    request_key TEXT NOT NULL,
    url TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (store_name, request_key)
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_store ON cache_entries(store_name);
"#;

/// Handle to one named store inside a [`SqliteBackend`].
#[derive(Clone)]
pub struct SqliteStore {
  name: String,
  conn: Arc<Mutex<Connection>>,
}

impl CacheBackend for SqliteBackend {
  type Store = SqliteStore;

  fn open(&self, name: &str) -> Result<SqliteStore> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO cache_stores (name) VALUES (?)",
        params![name],
      )
      .map_err(|e| eyre!("Failed to register store {}: {}", name, e))?;

    Ok(SqliteStore {
      name: name.to_string(),
      conn: Arc::clone(&self.conn),
    })
  }

  fn store_names(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT name FROM cache_stores ORDER BY name")
      .map_err(|e| eyre!("Failed to prepare store query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query store names: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(names)
  }

  fn delete(&self, name: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "DELETE FROM cache_entries WHERE store_name = ?",
        params![name],
      )
      .map_err(|e| eyre!("Failed to delete entries of store {}: {}", name, e))?;

    let deleted = conn
      .execute("DELETE FROM cache_stores WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete store {}: {}", name, e))?;

    Ok(deleted > 0)
  }
}

impl CacheStore for SqliteStore {
  fn lookup(&self, request: &Request) -> Result<Option<CachedEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT data, cached_at FROM cache_entries
         WHERE store_name = ? AND request_key = ?",
      )
      .map_err(|e| eyre!("Failed to prepare lookup: {}", e))?;

    let row: Option<(Vec<u8>, String)> = stmt
      .query_row(params![self.name, request.cache_key()], |row| {
        Ok((row.get(0)?, row.get(1)?))
      })
      .ok();

    match row {
      Some((data, cached_at_str)) => {
        let response: Response = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize cached response: {}", e))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedEntry {
          response,
          cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn put(&self, request: &Request, response: &Response) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data =
      serde_json::to_vec(response).map_err(|e| eyre!("Failed to serialize response: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (store_name, request_key, url, data, cached_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
        params![self.name, request.cache_key(), request.url.as_str(), data],
      )
      .map_err(|e| eyre!("Failed to store response: {}", e))?;

    Ok(())
  }

  fn len(&self) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: usize = conn
      .query_row(
        "SELECT COUNT(*) FROM cache_entries WHERE store_name = ?",
        params![self.name],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count entries: {}", e))?;

    Ok(count)
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
