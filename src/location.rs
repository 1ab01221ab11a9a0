//! Last-known-location service.
//!
//! An explicitly constructed service instance holding the latest fix and
//! a subscriber list. Handles are cheap to clone; subscribing returns an
//! explicit unsubscribe capability instead of relying on a module-level
//! singleton's lifetime.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One geolocation fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
  pub latitude: f64,
  pub longitude: f64,
  /// Horizontal accuracy in meters
  pub accuracy: f64,
  pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
  current: Option<LocationFix>,
  subscribers: HashMap<u64, mpsc::UnboundedSender<LocationFix>>,
  next_id: u64,
}

/// Shared location cache with subscriber fan-out.
#[derive(Clone, Default)]
pub struct LocationService {
  inner: Arc<Mutex<Inner>>,
}

impl LocationService {
  pub fn new() -> Self {
    Self::default()
  }

  /// Last stored fix, if any.
  pub fn current(&self) -> Result<Option<LocationFix>> {
    let inner = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(inner.current)
  }

  /// Store a fix and broadcast it to live subscribers. Subscribers whose
  /// receiver is gone are pruned.
  pub fn update(&self, fix: LocationFix) -> Result<()> {
    let mut inner = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    inner.current = Some(fix);
    inner.subscribers.retain(|_, tx| tx.send(fix).is_ok());
    Ok(())
  }

  /// Subscribe to future fixes.
  ///
  /// Dropping the returned [`LocationSubscription`] (or calling
  /// `unsubscribe`) removes the subscriber.
  pub fn subscribe(
    &self,
  ) -> Result<(LocationSubscription, mpsc::UnboundedReceiver<LocationFix>)> {
    let mut inner = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let id = inner.next_id;
    inner.next_id += 1;

    let (tx, rx) = mpsc::unbounded_channel();
    inner.subscribers.insert(id, tx);

    Ok((
      LocationSubscription {
        id,
        inner: Arc::clone(&self.inner),
      },
      rx,
    ))
  }

  #[cfg(test)]
  fn subscriber_count(&self) -> usize {
    self.inner.lock().expect("lock").subscribers.len()
  }
}

/// Capability to cancel one subscription.
pub struct LocationSubscription {
  id: u64,
  inner: Arc<Mutex<Inner>>,
}

impl LocationSubscription {
  /// Explicitly cancel the subscription.
  pub fn unsubscribe(self) {}
}

impl Drop for LocationSubscription {
  fn drop(&mut self) {
    if let Ok(mut inner) = self.inner.lock() {
      inner.subscribers.remove(&self.id);
    }
  }
}
