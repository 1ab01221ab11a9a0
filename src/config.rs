use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
  /// Origin the application is served from, e.g. "https://app.safeverse.io"
  pub origin: String,
  /// Prefix for cache store names
  #[serde(default = "default_app_prefix")]
  pub app_prefix: String,
  /// Version tag of the current deployment
  pub version: String,
  /// Resources fetched and cached during install (paths relative to origin).
  /// The root document is always part of the seed set.
  #[serde(default = "default_seed_paths")]
  pub seed_paths: Vec<String>,
  #[serde(default)]
  pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
  /// Title used when a push payload carries none
  #[serde(default = "default_title")]
  pub default_title: String,
  #[serde(default = "default_icon")]
  pub icon: String,
  #[serde(default = "default_badge")]
  pub badge: String,
  /// Deep-link target used when a push payload carries none
  #[serde(default = "default_url")]
  pub default_url: String,
}

fn default_app_prefix() -> String {
  "safeverse".to_string()
}

fn default_seed_paths() -> Vec<String> {
  vec!["/".to_string()]
}

fn default_title() -> String {
  "SafeVerse".to_string()
}

fn default_icon() -> String {
  "/icons/icon-192.png".to_string()
}

fn default_badge() -> String {
  "/icons/badge-72.png".to_string()
}

fn default_url() -> String {
  "/".to_string()
}

impl Default for NotificationConfig {
  fn default() -> Self {
    Self {
      default_title: default_title(),
      icon: default_icon(),
      badge: default_badge(),
      default_url: default_url(),
    }
  }
}

impl WorkerConfig {
  /// Name of the cache store for the current version.
  pub fn cache_name(&self) -> String {
    format!("{}-cache-{}", self.app_prefix, self.version)
  }

  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./safeverse-worker.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/safeverse/worker.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/safeverse/worker.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("safeverse-worker.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("safeverse").join("worker.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: WorkerConfig = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }
}
