// SPDX-License-Identifier: GPL-3.0-only

//! Explicit lifecycle state for camera sessions
//!
//! A [`LifecycleOwner`] stands in for the UI component whose visibility gates
//! camera use. Bound cameras only capture while their owner is at least
//! [`LifecycleState::Started`], and a destroyed owner unbinds its session.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

/// Lifecycle states, ordered so that `a >= b` means "at least b"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    Destroyed,
    Initialized,
    Created,
    Started,
    Resumed,
}

impl LifecycleState {
    pub fn is_at_least(&self, state: LifecycleState) -> bool {
        *self >= state
    }
}

/// Lifecycle transitions dispatched by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    OnCreate,
    OnStart,
    OnResume,
    OnPause,
    OnStop,
    OnDestroy,
}

impl LifecycleEvent {
    /// State the owner is in after this event
    pub fn target_state(&self) -> LifecycleState {
        match self {
            LifecycleEvent::OnCreate | LifecycleEvent::OnStop => LifecycleState::Created,
            LifecycleEvent::OnStart | LifecycleEvent::OnPause => LifecycleState::Started,
            LifecycleEvent::OnResume => LifecycleState::Resumed,
            LifecycleEvent::OnDestroy => LifecycleState::Destroyed,
        }
    }
}

/// Owner of a lifecycle that camera use cases are bound to
///
/// Clones share the same state.
#[derive(Clone)]
pub struct LifecycleOwner {
    id: Uuid,
    state: Arc<watch::Sender<LifecycleState>>,
}

impl LifecycleOwner {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Initialized);
        Self {
            id: Uuid::new_v4(),
            state: Arc::new(state),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn current_state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Apply a lifecycle event
    ///
    /// `Destroyed` is terminal; events arriving afterwards are ignored.
    pub fn handle_event(&self, event: LifecycleEvent) {
        let current = self.current_state();
        if current == LifecycleState::Destroyed {
            warn!(owner = %self.id, ?event, "Ignoring lifecycle event after destroy");
            return;
        }

        let next = event.target_state();
        info!(owner = %self.id, ?event, from = ?current, to = ?next, "Lifecycle transition");
        self.state.send_replace(next);
    }

    /// Dispatch the events that move the owner from its current state to `target`
    pub fn move_to(&self, target: LifecycleState) {
        use LifecycleEvent::*;

        loop {
            let current = self.current_state();
            if current == target || current == LifecycleState::Destroyed {
                return;
            }
            let event = match (current, target) {
                (_, LifecycleState::Destroyed) => OnDestroy,
                (LifecycleState::Initialized, _) => OnCreate,
                (LifecycleState::Created, t) if t > LifecycleState::Created => OnStart,
                (LifecycleState::Started, t) if t > LifecycleState::Started => OnResume,
                (LifecycleState::Resumed, _) => OnPause,
                (LifecycleState::Started, _) => OnStop,
                // Created -> Initialized is not a valid transition
                _ => return,
            };
            self.handle_event(event);
        }
    }
}

impl Default for LifecycleOwner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LifecycleOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleOwner")
            .field("id", &self.id)
            .field("state", &self.current_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_move_state() {
        let owner = LifecycleOwner::new();
        assert_eq!(owner.current_state(), LifecycleState::Initialized);

        owner.handle_event(LifecycleEvent::OnCreate);
        owner.handle_event(LifecycleEvent::OnStart);
        owner.handle_event(LifecycleEvent::OnResume);
        assert_eq!(owner.current_state(), LifecycleState::Resumed);

        owner.handle_event(LifecycleEvent::OnPause);
        owner.handle_event(LifecycleEvent::OnStop);
        assert_eq!(owner.current_state(), LifecycleState::Created);
        assert!(!owner.current_state().is_at_least(LifecycleState::Started));
    }

    #[test]
    fn test_destroyed_is_terminal() {
        let owner = LifecycleOwner::new();
        owner.move_to(LifecycleState::Resumed);
        owner.handle_event(LifecycleEvent::OnDestroy);
        owner.handle_event(LifecycleEvent::OnCreate);
        assert_eq!(owner.current_state(), LifecycleState::Destroyed);
    }

    #[test]
    fn test_move_to_walks_through_states() {
        let owner = LifecycleOwner::new();
        let rx = owner.subscribe();

        owner.move_to(LifecycleState::Started);
        assert_eq!(*rx.borrow(), LifecycleState::Started);

        owner.move_to(LifecycleState::Created);
        assert_eq!(owner.current_state(), LifecycleState::Created);
    }

    #[test]
    fn test_owner_ids_are_unique() {
        assert_ne!(LifecycleOwner::new().id(), LifecycleOwner::new().id());
    }
}
