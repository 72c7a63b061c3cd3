//! Selection state machine bound to the push channel's rooms.
//!
//! States are `Unselected` and `Selected(id)`. Every transition tears the
//! old room down before the new one is joined, and bumps a generation
//! counter that detail fetches carry as a [`SelectionTicket`].

use crate::error::ConnectionError;
use tracing::{debug, warn};

/// Room membership on the push channel.
pub trait RoomChannel: Send + Sync {
    fn subscribe(&self, room: &str) -> Result<(), ConnectionError>;
    fn unsubscribe(&self, room: &str) -> Result<(), ConnectionError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Unselected,
    Selected(String),
}

/// The selection a fetch was issued under.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SelectionTicket {
    pub disaster_id: String,
    pub generation: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectOutcome {
    Unchanged,
    Cleared,
    Switched(SelectionTicket),
}

#[derive(Debug, Default)]
pub struct SubscriptionManager {
    selection: Selection,
    generation: u64,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn current(&self) -> Option<&str> {
        match &self.selection {
            Selection::Selected(id) => Some(id),
            Selection::Unselected => None,
        }
    }

    /// A blank identifier is treated like `None`.
    pub fn select<C>(&mut self, target: Option<&str>, channel: &C) -> SelectOutcome
    where
        C: RoomChannel + ?Sized,
    {
        let target = target.map(str::trim).filter(|t| !t.is_empty());
        match (&self.selection, target) {
            (Selection::Unselected, None) => return SelectOutcome::Unchanged,
            (Selection::Selected(current), Some(next)) if current == next => {
                debug!(disaster_id = next, "selection unchanged");
                return SelectOutcome::Unchanged;
            }
            _ => {}
        }

        if let Selection::Selected(previous) = &self.selection {
            if let Err(err) = channel.unsubscribe(previous) {
                warn!(room = %previous, error = %err, "failed to leave room");
            }
        }
        self.generation += 1;

        match target {
            None => {
                self.selection = Selection::Unselected;
                SelectOutcome::Cleared
            }
            Some(next) => {
                if let Err(err) = channel.subscribe(next) {
                    warn!(room = next, error = %err, "failed to join room; will rejoin on reconnect");
                }
                self.selection = Selection::Selected(next.to_string());
                SelectOutcome::Switched(SelectionTicket {
                    disaster_id: next.to_string(),
                    generation: self.generation,
                })
            }
        }
    }
}
