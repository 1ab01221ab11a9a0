//! Worker lifecycle state machine.
//!
//! The hosting platform drives the transitions; this module only models
//! them, independent of the event-dispatch mechanism.

/// Lifecycle state of one worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
  /// Seeding the cache store; not yet eligible to serve
  Installing,
  /// Installed, waiting to take over from the previous version
  Waiting,
  /// Controlling pages and serving fetches
  Active,
  /// Failed to install or superseded by a newer version
  Redundant,
}

/// Observed lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
  InstallSucceeded,
  InstallFailed,
  Activated,
  Superseded,
}

/// Pure transition function.
///
/// Events that make no sense in the current state leave it unchanged;
/// `Redundant` is terminal.
pub fn transition(state: LifecycleState, event: LifecycleEvent) -> LifecycleState {
  use LifecycleEvent::*;
  use LifecycleState::*;

  match (state, event) {
    (Installing, InstallSucceeded) => Waiting,
    (Installing, InstallFailed) => Redundant,
    (Waiting, Activated) => Active,
    (_, Superseded) => Redundant,
    (state, _) => state,
  }
}
