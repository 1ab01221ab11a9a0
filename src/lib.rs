//! Offline cache worker and push notification core for SafeVerse.
//!
//! The worker intercepts fetches for the application, serves previously
//! cached responses, falls back to the network, captures successful
//! responses for next time, and purges stale cache versions across
//! deployments. Push messages become system notifications; clicking one
//! focuses an open application window or opens a new one.
//!
//! Platform concerns (cache storage, network, notifications, windows)
//! are trait seams in [`cache`], [`net`], and [`platform`]; hosts inject
//! real implementations, tests inject fakes.

pub mod cache;
pub mod config;
pub mod event;
pub mod http;
pub mod location;
pub mod net;
pub mod phone;
pub mod platform;
pub mod worker;

pub use config::WorkerConfig;
pub use event::{WorkerEvent, WorkerHost};
pub use http::{Method, Request, Response, ResponseKind};
pub use location::{LocationFix, LocationService, LocationSubscription};
pub use platform::{Notification, Notifications, WindowClients, WindowId};
pub use worker::{CacheWorker, LifecycleState, PushPayload};
