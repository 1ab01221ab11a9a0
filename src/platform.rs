//! Platform collaborators: system notifications and window clients.
//!
//! The worker never talks to the host platform directly; hosts inject
//! implementations of these traits, tests inject fakes.

use async_trait::async_trait;
use color_eyre::Result;

/// A system notification, created on push receipt and destroyed on
/// dismissal or click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  /// Deep-link target carried in the notification metadata
  pub url: String,
}

/// System notification surface.
#[async_trait]
pub trait Notifications: Send + Sync {
  /// Display a notification. Failures are not retried.
  async fn show(&self, notification: Notification) -> Result<()>;

  /// Dismiss a previously shown notification.
  async fn close(&self, notification: &Notification) -> Result<()>;
}

/// Identifier of one open application window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowId(pub String);

/// Registry of open application windows, including ones not currently
/// controlled by this worker.
#[async_trait]
pub trait WindowClients: Send + Sync {
  /// Enumerate open application windows.
  async fn match_all(&self) -> Result<Vec<WindowId>>;

  /// Bring a window to the foreground.
  async fn focus(&self, window: &WindowId) -> Result<()>;

  /// Open a new window navigated to the given URL.
  async fn open(&self, url: &str) -> Result<()>;

  /// Take control of all open windows without waiting for a reload.
  async fn claim(&self) -> Result<()>;
}
