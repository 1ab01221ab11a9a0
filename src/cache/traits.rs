//! Core traits and types for the versioned cache store.

use chrono::{DateTime, Utc};
use color_eyre::Result;

use crate::http::{Request, Response};

/// A cached response plus bookkeeping about when it was captured.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  /// The captured response
  pub response: Response,
  /// When the response was written to the store
  pub cached_at: DateTime<Utc>,
}

/// One named store of request -> captured response.
///
/// Handles are cheap to clone and safe to share across concurrent fetch
/// handlers; writes are independent, last-writer-wins per key.
pub trait CacheStore: Clone + Send + Sync + 'static {
  /// Look up a previously captured response for this request.
  fn lookup(&self, request: &Request) -> Result<Option<CachedEntry>>;

  /// Store a captured response under the request's key.
  fn put(&self, request: &Request, response: &Response) -> Result<()>;

  /// Number of entries in the store.
  fn len(&self) -> Result<usize>;

  fn is_empty(&self) -> Result<bool> {
    Ok(self.len()? == 0)
  }
}

/// Backend owning every named store on the platform.
///
/// The worker keeps exactly one version's store "current"; the rest are
/// enumerated and purged during activation.
pub trait CacheBackend: Send + Sync {
  type Store: CacheStore;

  /// Open (or create) the store with the given name.
  fn open(&self, name: &str) -> Result<Self::Store>;

  /// Names of every store the backend currently holds.
  fn store_names(&self) -> Result<Vec<String>>;

  /// Delete a store and all of its entries. Returns whether it existed.
  fn delete(&self, name: &str) -> Result<bool>;
}
