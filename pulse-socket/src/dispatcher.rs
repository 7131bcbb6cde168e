//! In-process event dispatcher.
//!
//! Routes inbound events, keyed by event kind, to registered listeners.
//! Listeners are invoked synchronously in registration order; each
//! registration returns a [`ListenerId`] handle used for removal, and a
//! panicking listener never prevents later listeners from running.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::events::EventKind;

/// Handle identifying one listener registration.
///
/// Duplicate registrations of the same closure get distinct ids and are
/// independently removable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    /// Invocation order is registration order; duplicates permitted.
    listeners: HashMap<EventKind, Vec<(ListenerId, Handler)>>,
}

/// Dispatcher owning the listener table.
///
/// Listener lifecycle is independent of connection state: registrations
/// made while disconnected receive events from every future transport.
#[derive(Clone, Default)]
pub struct Dispatcher {
    table: Arc<Mutex<ListenerTable>>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for an event kind. Returns its removal handle.
    pub fn register<F>(&self, event: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        let mut table = self.table.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        table.next_id += 1;
        let id = ListenerId(table.next_id);
        table
            .listeners
            .entry(event)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a listener by its handle. Returns false if not found.
    pub fn unregister(&self, event: &EventKind, id: ListenerId) -> bool {
        let mut table = self.table.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(entries) = table.listeners.get_mut(event) {
            let before = entries.len();
            entries.retain(|(entry_id, _)| *entry_id != id);
            return entries.len() != before;
        }
        false
    }

    /// Dispatch an event to every listener registered for it, in
    /// registration order.
    ///
    /// Each invocation is isolated: a panicking listener is logged and the
    /// remaining listeners still run. Listeners may register/unregister
    /// from within a callback; such changes take effect on the next
    /// dispatch.
    pub fn dispatch(&self, event: &EventKind, data: &serde_json::Value) {
        let handlers: Vec<Handler> = {
            let table = self.table.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            match table.listeners.get(event) {
                Some(entries) => entries.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => Vec::new(),
            }
        };

        if handlers.is_empty() {
            debug!("no listeners for {}", event.as_str());
            return;
        }

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(data))).is_err() {
                warn!("listener for {} panicked, continuing", event.as_str());
            }
        }
    }

    /// Number of listeners currently registered for an event kind.
    pub fn listener_count(&self, event: &EventKind) -> usize {
        let table = self.table.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        table.listeners.get(event).map_or(0, |v| v.len())
    }
}
