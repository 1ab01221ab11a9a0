//! Event plumbing between the hosting platform and the worker.

use color_eyre::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

use crate::cache::CacheBackend;
use crate::http::{Request, Response};
use crate::net::Network;
use crate::platform::{Notification, Notifications, WindowClients};
use crate::worker::CacheWorker;

/// Platform-dispatched worker events.
#[derive(Debug)]
pub enum WorkerEvent {
  Install,
  Activate,
  Fetch {
    request: Request,
    /// The intercepted page observes the fetch result through this channel
    respond_to: oneshot::Sender<Result<Response>>,
  },
  Push {
    payload: Vec<u8>,
  },
  NotificationClick {
    notification: Notification,
  },
}

/// Event host that pumps platform events into the worker.
///
/// Each event is handled by an independent task, so handlers may overlap
/// in time. The host does not return until every in-flight handler has
/// completed, which is what lets a push handler finish showing its
/// notification even when the event stream ends.
pub struct WorkerHost<B, N, P, W>
where
  B: CacheBackend + 'static,
  N: Network + 'static,
  P: Notifications + 'static,
  W: WindowClients + 'static,
{
  worker: Arc<CacheWorker<B, N, P, W>>,
  rx: mpsc::UnboundedReceiver<WorkerEvent>,
}

impl<B, N, P, W> WorkerHost<B, N, P, W>
where
  B: CacheBackend + 'static,
  N: Network + 'static,
  P: Notifications + 'static,
  W: WindowClients + 'static,
{
  /// Wrap a worker and return the host plus the event sender the
  /// platform delivers into.
  pub fn new(
    worker: CacheWorker<B, N, P, W>,
  ) -> (Self, mpsc::UnboundedSender<WorkerEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
      Self {
        worker: Arc::new(worker),
        rx,
      },
      tx,
    )
  }

  pub fn worker(&self) -> &Arc<CacheWorker<B, N, P, W>> {
    &self.worker
  }

  /// Run until the event sender is dropped, then drain in-flight
  /// handlers.
  pub async fn run(mut self) {
    let mut handlers = JoinSet::new();

    while let Some(event) = self.rx.recv().await {
      let worker = Arc::clone(&self.worker);
      handlers.spawn(async move {
        dispatch(worker.as_ref(), event).await;
      });

      // Reap handlers that already finished
      while handlers.try_join_next().is_some() {}
    }

    while handlers.join_next().await.is_some() {}
  }
}

async fn dispatch<B, N, P, W>(worker: &CacheWorker<B, N, P, W>, event: WorkerEvent)
where
  B: CacheBackend,
  N: Network,
  P: Notifications,
  W: WindowClients,
{
  match event {
    WorkerEvent::Install => {
      if let Err(e) = worker.handle_install().await {
        tracing::warn!("install failed: {}", e);
      }
    }
    WorkerEvent::Activate => {
      if let Err(e) = worker.handle_activate().await {
        tracing::warn!("activate failed: {}", e);
      }
    }
    WorkerEvent::Fetch {
      request,
      respond_to,
    } => {
      let result = worker.handle_fetch(request).await;
      // The requesting page may be gone; nothing to do then
      let _ = respond_to.send(result);
    }
    WorkerEvent::Push { payload } => {
      if let Err(e) = worker.handle_push(&payload).await {
        tracing::warn!("failed to show push notification: {}", e);
      }
    }
    WorkerEvent::NotificationClick { notification } => {
      if let Err(e) = worker.handle_notification_click(notification).await {
        tracing::warn!("notification click handling failed: {}", e);
      }
    }
  }
}
