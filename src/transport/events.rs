//! Event handler registry.
//!
//! Handlers are keyed by event method. The receive loop snapshots the
//! handler list under a read lock, releases it, then invokes each handler,
//! so registration never waits on a running handler.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::identifiers::HandlerId;
use crate::protocol::Event;

// ============================================================================
// Types
// ============================================================================

/// Event handler callback type.
///
/// Invoked from the receive loop. Must not block: hand work off to a task
/// or a channel instead.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

type HandlerList = Vec<(HandlerId, EventHandler)>;

// ============================================================================
// EventRegistry
// ============================================================================

/// Method-keyed table of event handlers.
#[derive(Default)]
pub struct EventRegistry {
    handlers: RwLock<FxHashMap<String, HandlerList>>,
}

impl EventRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for an event method.
    pub fn register(&self, method: impl Into<String>, handler: EventHandler) -> HandlerId {
        let id = HandlerId::next();
        let method = method.into();
        trace!(%id, method = %method, "Event handler registered");
        self.handlers
            .write()
            .entry(method)
            .or_default()
            .push((id, handler));
        id
    }

    /// Removes a handler. Returns `false` if it was already gone.
    pub fn unregister(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let mut removed = false;
        handlers.retain(|_, list| {
            let before = list.len();
            list.retain(|(handler_id, _)| *handler_id != id);
            removed |= list.len() != before;
            !list.is_empty()
        });
        removed
    }

    /// Delivers an event to every handler registered for its method.
    ///
    /// Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &Event) -> usize {
        let snapshot: Vec<EventHandler> = match self.handlers.read().get(&event.method) {
            Some(list) => list.iter().map(|(_, handler)| Arc::clone(handler)).collect(),
            None => return 0,
        };

        for handler in &snapshot {
            handler(event);
        }
        snapshot.len()
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().values().map(Vec::len).sum()
    }

    /// Returns `true` if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests
// ============================================================================
