//! Push message handling: payload parsing, notification display, and
//! click routing.

use color_eyre::Result;
use serde::Deserialize;

use super::CacheWorker;
use crate::cache::CacheBackend;
use crate::net::Network;
use crate::platform::{Notification, Notifications, WindowClients};

/// Structured push payload. All fields optional; anything missing falls
/// back to the configured defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushPayload {
  pub title: Option<String>,
  pub body: Option<String>,
  pub url: Option<String>,
}

impl PushPayload {
  /// Parse payload bytes as JSON. A payload that isn't a JSON object is
  /// treated as plain text and becomes the notification body.
  pub fn parse(data: &[u8]) -> Self {
    match serde_json::from_slice(data) {
      Ok(payload) => payload,
      Err(_) => {
        tracing::debug!("push payload is not JSON, treating as text");
        Self {
          body: Some(String::from_utf8_lossy(data).into_owned()),
          ..Self::default()
        }
      }
    }
  }
}

impl<B, N, P, W> CacheWorker<B, N, P, W>
where
  B: CacheBackend,
  N: Network,
  P: Notifications,
  W: WindowClients,
{
  /// Push: display a notification for the payload, with the target URL
  /// attached as metadata. The dispatcher keeps the worker alive until
  /// this completes.
  pub async fn handle_push(&self, data: &[u8]) -> Result<()> {
    let payload = PushPayload::parse(data);
    let defaults = &self.config.notifications;

    let notification = Notification {
      title: payload
        .title
        .unwrap_or_else(|| defaults.default_title.clone()),
      body: payload.body.unwrap_or_default(),
      icon: defaults.icon.clone(),
      badge: defaults.badge.clone(),
      url: payload.url.unwrap_or_else(|| defaults.default_url.clone()),
    };

    self.notifications.show(notification).await
  }

  /// Notification click: close it, then focus the first open window or
  /// open a new one at the notification's target URL.
  pub async fn handle_notification_click(&self, notification: Notification) -> Result<()> {
    if let Err(e) = self.notifications.close(&notification).await {
      tracing::debug!("failed to close notification: {}", e);
    }

    let windows = self.windows.match_all().await?;
    match windows.first() {
      Some(window) => self.windows.focus(window).await,
      None => self.windows.open(&notification.url).await,
    }
  }
}
