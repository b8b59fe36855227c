//! Single serialization point for search state.
//!
//! Every action goes through [`SearchStore::dispatch`], which applies the
//! reducer under the watch channel's write lock. Concurrent responses never
//! touch the state directly, and subscribers observe states in the order the
//! actions were applied.

use tokio::sync::{broadcast, watch};
use tracing::debug;

use super::state::{ActionKind, ReducerVariant, SearchAction, SearchState, reduce};

const ACTION_TAP_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct SearchStore {
    variant: ReducerVariant,
    states: watch::Sender<SearchState>,
    actions: broadcast::Sender<ActionKind>,
}

impl SearchStore {
    #[must_use]
    pub fn new(variant: ReducerVariant) -> Self {
        let (states, _) = watch::channel(SearchState::Initial);
        let (actions, _) = broadcast::channel(ACTION_TAP_CAPACITY);
        Self {
            variant,
            states,
            actions,
        }
    }

    #[must_use]
    pub const fn variant(&self) -> ReducerVariant {
        self.variant
    }

    /// Apply an action and publish the resulting state.
    pub fn dispatch(&self, action: SearchAction) {
        let kind = action.kind();
        self.states.send_modify(|state| {
            let previous = std::mem::replace(state, SearchState::Initial);
            let from = previous.kind();
            *state = reduce(previous, &action, self.variant);
            debug!(action = ?kind, from = ?from, to = ?state.kind(), "search state transition");
            // No subscribers is fine; the tap is optional.
            let _ = self.actions.send(kind);
        });
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> SearchState {
        self.states.borrow().clone()
    }

    /// Follow state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.states.subscribe()
    }

    /// Follow dispatched actions, in application order.
    #[must_use]
    pub fn actions(&self) -> broadcast::Receiver<ActionKind> {
        self.actions.subscribe()
    }
}

impl Default for SearchStore {
    fn default() -> Self {
        Self::new(ReducerVariant::default())
    }
}
