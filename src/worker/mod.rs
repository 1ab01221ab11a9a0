//! The offline cache worker.
//!
//! Serves previously cached responses, falls back to the network,
//! opportunistically populates the cache with successful responses, and
//! manages cache-version lifecycle across deployments. Push messages and
//! notification clicks are handled in the push module.

mod lifecycle;
mod push;

pub use lifecycle::{transition, LifecycleEvent, LifecycleState};
pub use push::PushPayload;

use color_eyre::{eyre::eyre, Result};
use std::sync::Mutex;
use url::Url;

use crate::cache::{CacheBackend, CacheStore};
use crate::config::WorkerConfig;
use crate::http::{Request, Response};
use crate::net::Network;
use crate::platform::{Notifications, WindowClients};

/// The offline cache worker for one deployed version.
///
/// Platform collaborators are injected; the worker owns nothing but the
/// caching policy and its lifecycle state.
pub struct CacheWorker<B, N, P, W>
where
  B: CacheBackend,
  N: Network,
  P: Notifications,
  W: WindowClients,
{
  config: WorkerConfig,
  backend: B,
  network: N,
  notifications: P,
  windows: W,
  state: Mutex<LifecycleState>,
}

impl<B, N, P, W> CacheWorker<B, N, P, W>
where
  B: CacheBackend,
  N: Network,
  P: Notifications,
  W: WindowClients,
{
  /// Create a worker in the `Installing` state.
  pub fn new(config: WorkerConfig, backend: B, network: N, notifications: P, windows: W) -> Self {
    Self {
      config,
      backend,
      network,
      notifications,
      windows,
      state: Mutex::new(LifecycleState::Installing),
    }
  }

  pub fn config(&self) -> &WorkerConfig {
    &self.config
  }

  /// Current lifecycle state.
  pub fn state(&self) -> LifecycleState {
    self
      .state
      .lock()
      .map(|s| *s)
      .unwrap_or(LifecycleState::Redundant)
  }

  fn apply(&self, event: LifecycleEvent) -> Result<()> {
    let mut state = self
      .state
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    *state = transition(*state, event);
    Ok(())
  }

  /// Seed requests for install: the root document plus configured paths.
  fn seed_requests(&self) -> Result<Vec<Request>> {
    let base = Url::parse(&self.config.origin)
      .map_err(|e| eyre!("Invalid origin {}: {}", self.config.origin, e))?;

    let mut paths: Vec<&str> = vec!["/"];
    for path in &self.config.seed_paths {
      if path != "/" {
        paths.push(path.as_str());
      }
    }

    paths
      .into_iter()
      .map(|path| {
        let url = base
          .join(path)
          .map_err(|e| eyre!("Invalid seed path {}: {}", path, e))?;
        Request::get(url.as_str())
      })
      .collect()
  }

  /// Install: open the current version's store and pre-populate it with
  /// the seed set. Any seed failure fails the install, so a broken
  /// version never activates.
  pub async fn handle_install(&self) -> Result<()> {
    match self.install().await {
      Ok(()) => {
        self.apply(LifecycleEvent::InstallSucceeded)?;
        Ok(())
      }
      Err(e) => {
        let _ = self.apply(LifecycleEvent::InstallFailed);
        Err(e)
      }
    }
  }

  async fn install(&self) -> Result<()> {
    let store = self.backend.open(&self.config.cache_name())?;

    for request in self.seed_requests()? {
      let response = self.network.fetch(&request).await?;
      if response.status != 200 {
        return Err(eyre!(
          "Seed fetch for {} returned status {}",
          request.url,
          response.status
        ));
      }
      store.put(&request, &response)?;
    }

    tracing::debug!(store = %self.config.cache_name(), "install complete");
    Ok(())
  }

  /// Activate: purge every store that does not match the current version
  /// tag, then claim all open pages. A failed delete is skipped, not
  /// fatal; the remaining stale stores are still attempted.
  pub async fn handle_activate(&self) -> Result<()> {
    let current = self.config.cache_name();

    for name in self.backend.store_names()? {
      if name == current {
        continue;
      }
      match self.backend.delete(&name) {
        Ok(_) => tracing::debug!(store = %name, "purged stale cache store"),
        Err(e) => tracing::warn!(store = %name, "failed to purge stale cache store: {}", e),
      }
    }

    if let Err(e) = self.windows.claim().await {
      tracing::warn!("failed to claim open windows: {}", e);
    }

    self.apply(LifecycleEvent::Activated)?;
    Ok(())
  }

  /// Fetch: serve from cache, fall back to the network, and capture
  /// successful responses without delaying the caller.
  ///
  /// Non-GET requests bypass the cache entirely. A cache hit never
  /// touches the network. A network failure with no cache entry is an
  /// unconditional failure.
  pub async fn handle_fetch(&self, request: Request) -> Result<Response> {
    if !request.is_cacheable() {
      return self.network.fetch(&request).await;
    }

    // Store errors must not take the fetch path down
    let store = match self.backend.open(&self.config.cache_name()) {
      Ok(store) => Some(store),
      Err(e) => {
        tracing::debug!("cache store unavailable: {}", e);
        None
      }
    };

    if let Some(store) = &store {
      match store.lookup(&request) {
        Ok(Some(hit)) => return Ok(hit.response),
        Ok(None) => {}
        Err(e) => tracing::debug!(url = %request.url, "cache lookup failed: {}", e),
      }
    }

    let response = self.network.fetch(&request).await?;

    if response.is_cache_worthy() {
      if let Some(store) = store {
        // Clone before forking: the caller gets the original response,
        // the store consumes an independent copy.
        let captured = response.clone();
        tokio::spawn(async move {
          if let Err(e) = store.put(&request, &captured) {
            tracing::debug!(url = %request.url, "failed to cache response: {}", e);
          }
        });
      }
    }

    Ok(response)
  }
}

#[cfg(test)]
impl<B, N, P, W> CacheWorker<B, N, P, W>
where
  B: CacheBackend,
  N: Network,
  P: Notifications,
  W: WindowClients,
{
  pub(crate) fn notifications_for_test(&self) -> &P {
    &self.notifications
  }
}

#[cfg(test)]
pub(crate) mod testutil {
  //! Hand-rolled collaborator fakes shared by the worker tests.

  use async_trait::async_trait;
  use color_eyre::{eyre::eyre, Result};
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  use crate::http::{Request, Response, ResponseKind};
  use crate::net::Network;
  use crate::platform::{Notification, Notifications, WindowClients, WindowId};

  /// Route tracing output through the test harness.
  pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
      .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
      .with_test_writer()
      .try_init();
  }

  pub fn basic_response(url: &str, body: &str) -> Response {
    Response {
      url: url.to_string(),
      status: 200,
      headers: vec![],
      body: body.as_bytes().to_vec(),
      kind: ResponseKind::Basic,
    }
  }

  /// Scripted network: URL -> canned response, counting every fetch.
  #[derive(Default)]
  pub struct FakeNetwork {
    responses: Mutex<HashMap<String, Response>>,
    pub fetches: AtomicUsize,
  }

  impl FakeNetwork {
    pub fn with(responses: &[(&str, Response)]) -> Self {
      let map = responses
        .iter()
        .map(|(url, resp)| (url.to_string(), resp.clone()))
        .collect();
      Self {
        responses: Mutex::new(map),
        fetches: AtomicUsize::new(0),
      }
    }

    pub fn fetch_count(&self) -> usize {
      self.fetches.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
      self.fetches.fetch_add(1, Ordering::SeqCst);
      let responses = self.responses.lock().expect("lock");
      responses
        .get(request.url.as_str())
        .cloned()
        .ok_or_else(|| eyre!("network unreachable for {}", request.url))
    }
  }

  /// Records shown and closed notifications.
  #[derive(Default)]
  pub struct FakeNotifications {
    pub shown: Mutex<Vec<Notification>>,
    pub closed: Mutex<Vec<Notification>>,
  }

  #[async_trait]
  impl Notifications for FakeNotifications {
    async fn show(&self, notification: Notification) -> Result<()> {
      self.shown.lock().expect("lock").push(notification);
      Ok(())
    }

    async fn close(&self, notification: &Notification) -> Result<()> {
      self.closed.lock().expect("lock").push(notification.clone());
      Ok(())
    }
  }

  /// Window registry with a fixed set of open windows.
  #[derive(Default)]
  pub struct FakeWindows {
    pub open_windows: Vec<WindowId>,
    pub focused: Mutex<Vec<WindowId>>,
    pub opened: Mutex<Vec<String>>,
    pub claimed: AtomicUsize,
  }

  impl FakeWindows {
    pub fn with_windows(ids: &[&str]) -> Self {
      Self {
        open_windows: ids.iter().map(|id| WindowId(id.to_string())).collect(),
        ..Default::default()
      }
    }
  }

  #[async_trait]
  impl WindowClients for FakeWindows {
    async fn match_all(&self) -> Result<Vec<WindowId>> {
      Ok(self.open_windows.clone())
    }

    async fn focus(&self, window: &WindowId) -> Result<()> {
      self.focused.lock().expect("lock").push(window.clone());
      Ok(())
    }

    async fn open(&self, url: &str) -> Result<()> {
      self.opened.lock().expect("lock").push(url.to_string());
      Ok(())
    }

    async fn claim(&self) -> Result<()> {
      self.claimed.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::testutil::*;
  use super::*;
  use crate::cache::MemoryBackend;
  use crate::http::{Method, ResponseKind};
  use std::time::Duration;

  const ORIGIN: &str = "https://app.safeverse.io";

  fn config() -> WorkerConfig {
    serde_yaml::from_str(&format!(
      r#"
origin: {}
version: v2
seed_paths:
  - /
  - /offline.html
"#,
      ORIGIN
    ))
    .expect("config")
  }

  fn seeded_network() -> FakeNetwork {
    FakeNetwork::with(&[
      (
        "https://app.safeverse.io/",
        basic_response("https://app.safeverse.io/", "<html>root</html>"),
      ),
      (
        "https://app.safeverse.io/offline.html",
        basic_response("https://app.safeverse.io/offline.html", "<html>offline</html>"),
      ),
    ])
  }

  fn worker(
    network: FakeNetwork,
  ) -> CacheWorker<MemoryBackend, FakeNetwork, FakeNotifications, FakeWindows> {
    CacheWorker::new(
      config(),
      MemoryBackend::new(),
      network,
      FakeNotifications::default(),
      FakeWindows::default(),
    )
  }

  #[tokio::test]
  async fn test_install_seeds_the_current_store() {
    init_tracing();
    let worker = worker(seeded_network());

    worker.handle_install().await.unwrap();
    assert_eq!(worker.state(), LifecycleState::Waiting);

    let store = worker.backend.open("safeverse-cache-v2").unwrap();
    assert_eq!(store.len().unwrap(), 2);

    let root = Request::get("https://app.safeverse.io/").unwrap();
    let hit = store.lookup(&root).unwrap().unwrap();
    assert_eq!(hit.response.body_text(), "<html>root</html>");
  }

  #[tokio::test]
  async fn test_failed_seed_fetch_fails_install() {
    // Network only knows the root; /offline.html is unreachable
    let network = FakeNetwork::with(&[(
      "https://app.safeverse.io/",
      basic_response("https://app.safeverse.io/", "<html>root</html>"),
    )]);
    let worker = worker(network);

    assert!(worker.handle_install().await.is_err());
    assert_eq!(worker.state(), LifecycleState::Redundant);
  }

  #[tokio::test]
  async fn test_non_200_seed_fails_install() {
    let mut missing = basic_response("https://app.safeverse.io/offline.html", "not found");
    missing.status = 404;
    let network = FakeNetwork::with(&[
      (
        "https://app.safeverse.io/",
        basic_response("https://app.safeverse.io/", "<html>root</html>"),
      ),
      ("https://app.safeverse.io/offline.html", missing),
    ]);
    let worker = worker(network);

    assert!(worker.handle_install().await.is_err());
  }

  #[tokio::test]
  async fn test_activate_purges_stale_stores_and_claims() {
    init_tracing();
    let worker = worker(seeded_network());

    // Leftovers from previous deployments
    worker.backend.open("safeverse-cache-v1").unwrap();
    worker.backend.open("safeverse-cache-v1.5").unwrap();

    worker.handle_install().await.unwrap();
    worker.handle_activate().await.unwrap();

    assert_eq!(
      worker.backend.store_names().unwrap(),
      vec!["safeverse-cache-v2"]
    );
    assert_eq!(worker.state(), LifecycleState::Active);
    assert_eq!(worker.windows.claimed.load(std::sync::atomic::Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_cache_hit_never_touches_the_network() {
    let worker = worker(seeded_network());
    worker.handle_install().await.unwrap();
    worker.handle_activate().await.unwrap();

    let installs = worker.network.fetch_count();
    let root = Request::get("https://app.safeverse.io/").unwrap();
    let response = worker.handle_fetch(root).await.unwrap();

    assert_eq!(response.body_text(), "<html>root</html>");
    assert_eq!(worker.network.fetch_count(), installs);
  }

  #[tokio::test]
  async fn test_cache_miss_fetches_and_captures() {
    let network = FakeNetwork::with(&[
      (
        "https://app.safeverse.io/",
        basic_response("https://app.safeverse.io/", "<html>root</html>"),
      ),
      (
        "https://app.safeverse.io/offline.html",
        basic_response("https://app.safeverse.io/offline.html", "<html>offline</html>"),
      ),
      (
        "https://app.safeverse.io/feed",
        basic_response("https://app.safeverse.io/feed", "[]"),
      ),
    ]);
    let worker = worker(network);
    worker.handle_install().await.unwrap();
    worker.handle_activate().await.unwrap();

    let feed = Request::get("https://app.safeverse.io/feed").unwrap();
    let response = worker.handle_fetch(feed.clone()).await.unwrap();
    assert_eq!(response.body_text(), "[]");

    // The capture is a forked continuation; give it a beat to land
    tokio::time::sleep(Duration::from_millis(10)).await;

    let store = worker.backend.open("safeverse-cache-v2").unwrap();
    let hit = store.lookup(&feed).unwrap().unwrap();
    assert_eq!(hit.response.body_text(), "[]");

    // Second fetch is now served from cache
    let before = worker.network.fetch_count();
    worker.handle_fetch(feed).await.unwrap();
    assert_eq!(worker.network.fetch_count(), before);
  }

  #[tokio::test]
  async fn test_non_get_bypasses_the_cache() {
    let network = FakeNetwork::with(&[(
      "https://app.safeverse.io/checkin",
      basic_response("https://app.safeverse.io/checkin", "ok"),
    )]);
    let worker = worker(network);

    let post = Request::new(Method::Post, "https://app.safeverse.io/checkin").unwrap();
    worker.handle_fetch(post.clone()).await.unwrap();
    worker.handle_fetch(post.clone()).await.unwrap();

    // Both calls went to the network and nothing was written
    assert_eq!(worker.network.fetch_count(), 2);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let store = worker.backend.open("safeverse-cache-v2").unwrap();
    assert!(store.lookup(&post).unwrap().is_none());
    assert!(store.is_empty().unwrap());
  }

  #[tokio::test]
  async fn test_opaque_and_non_200_responses_are_not_captured() {
    let mut opaque = basic_response("https://cdn.example.com/lib.js", "lib");
    opaque.kind = ResponseKind::Opaque;
    let mut error = basic_response("https://app.safeverse.io/missing", "nope");
    error.status = 404;

    let network = FakeNetwork::with(&[
      ("https://cdn.example.com/lib.js", opaque),
      ("https://app.safeverse.io/missing", error),
    ]);
    let worker = worker(network);

    let cross = Request::get("https://cdn.example.com/lib.js").unwrap();
    worker.handle_fetch(cross.clone()).await.unwrap();

    let missing = Request::get("https://app.safeverse.io/missing").unwrap();
    let response = worker.handle_fetch(missing.clone()).await.unwrap();
    assert_eq!(response.status, 404);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let store = worker.backend.open("safeverse-cache-v2").unwrap();
    assert!(store.lookup(&cross).unwrap().is_none());
    assert!(store.lookup(&missing).unwrap().is_none());
  }

  #[tokio::test]
  async fn test_network_failure_with_no_cache_entry_fails_the_fetch() {
    let worker = worker(FakeNetwork::default());

    let req = Request::get("https://app.safeverse.io/unreachable").unwrap();
    assert!(worker.handle_fetch(req).await.is_err());
  }
}
