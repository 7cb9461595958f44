//! The session store: at most one [`ConversationState`] per identity.
//!
//! Every identity gets its own async mutex. Holding a [`SessionGuard`] is what
//! serialises message handling for that identity; guards for different
//! identities never contend.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::conversation::ConversationState;

#[derive(Debug, Default)]
struct Slot {
  state:         Option<ConversationState>,
  last_activity: DateTime<Utc>,
}

/// In-process session table keyed by external identity.
#[derive(Debug, Default)]
pub struct SessionStore {
  slots: DashMap<String, Arc<Mutex<Slot>>>,
}

/// Exclusive access to one identity's session slot.
pub struct SessionGuard {
  identity: String,
  slot:     OwnedMutexGuard<Slot>,
}

impl SessionStore {
  pub fn new() -> Self { Self::default() }

  /// Wait for exclusive access to `identity`'s slot.
  pub async fn lock(&self, identity: &str) -> SessionGuard {
    // The map guard must be released before awaiting the slot mutex.
    let slot = Arc::clone(
      self
        .slots
        .entry(identity.to_owned())
        .or_default()
        .value(),
    );
    SessionGuard { identity: identity.to_owned(), slot: slot.lock_owned().await }
  }

  /// Start a fresh dialogue for `identity`, discarding any open one.
  pub async fn start(&self, identity: &str, now: DateTime<Utc>) -> ConversationState {
    self.lock(identity).await.start(now).clone()
  }

  /// A snapshot of `identity`'s open dialogue.
  pub async fn get(&self, identity: &str) -> Option<ConversationState> {
    self.lock(identity).await.get().cloned()
  }

  /// Close `identity`'s dialogue, returning what it held.
  pub async fn end(&self, identity: &str) -> Option<ConversationState> {
    self.lock(identity).await.end()
  }

  /// Drop dialogues with no input for longer than `max_idle`. Slots currently
  /// held by a message in flight are skipped. Returns how many expired.
  pub fn expire_idle(&self, now: DateTime<Utc>, max_idle: TimeDelta) -> usize {
    let mut expired = 0;
    self.slots.retain(|identity, slot| {
      let Ok(mut guard) = slot.try_lock() else { return true };
      if guard.state.is_some() && now - guard.last_activity > max_idle {
        guard.state = None;
        expired += 1;
        tracing::info!(%identity, "idle dialogue expired");
      }
      // Only the map references an idle slot, so nobody can be waiting on it.
      guard.state.is_some() || Arc::strong_count(slot) > 1
    });
    expired
  }

  /// Number of identities with an open dialogue. Slots locked by a message
  /// in flight are not counted.
  pub fn active_count(&self) -> usize {
    self
      .slots
      .iter()
      .filter(|entry| {
        entry
          .value()
          .try_lock()
          .is_ok_and(|slot| slot.state.is_some())
      })
      .count()
  }
}

impl SessionGuard {
  pub fn identity(&self) -> &str { &self.identity }

  /// Replace whatever dialogue is open with a new one at its first step.
  pub fn start(&mut self, now: DateTime<Utc>) -> &mut ConversationState {
    self.slot.last_activity = now;
    self.slot.state.insert(ConversationState::new())
  }

  pub fn get(&self) -> Option<&ConversationState> { self.slot.state.as_ref() }

  /// Mutable access to the open dialogue; counts as activity.
  pub fn get_mut(&mut self, now: DateTime<Utc>) -> Option<&mut ConversationState> {
    if self.slot.state.is_some() {
      self.slot.last_activity = now;
    }
    self.slot.state.as_mut()
  }

  pub fn is_active(&self) -> bool { self.slot.state.is_some() }

  pub fn end(&mut self) -> Option<ConversationState> { self.slot.state.take() }
}
