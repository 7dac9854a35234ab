//! Unified provider event emitter.
//!
//! One emitter type serves both state-sync events and direct host
//! pushes; injected-script history had several divergent ad hoc
//! implementations of this and they are deliberately collapsed here.
//!
//! Listeners are identified by the handle returned from [`EventEmitter::on`]
//! (closures have no identity of their own in Rust). Removal with a
//! handle that no longer matches anything logs at debug and no-ops.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle returned by [`EventEmitter::on`], used for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerHandle {
    event: String,
    id: u64,
}

impl ListenerHandle {
    /// The event name this handle was registered under.
    pub fn event(&self) -> &str {
        &self.event
    }
}

/// Per-event-name listener registry.
#[derive(Default)]
pub struct EventEmitter {
    listeners: Mutex<HashMap<String, Vec<(u64, Listener)>>>,
    next_id: AtomicU64,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `event`. Listeners fire in registration
    /// order.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerHandle
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut listeners = self.listeners.lock().expect("listener table poisoned");
        listeners
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(listener)));
        ListenerHandle {
            event: event.to_string(),
            id,
        }
    }

    /// Remove a previously registered listener. Unknown handles no-op
    /// with a diagnostic rather than faulting.
    pub fn remove_listener(&self, handle: &ListenerHandle) {
        let mut listeners = self.listeners.lock().expect("listener table poisoned");
        match listeners.get_mut(&handle.event) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|(id, _)| *id != handle.id);
                if entries.len() == before {
                    debug!("remove_listener: no listener {} for '{}'", handle.id, handle.event);
                }
            }
            None => debug!("remove_listener: no listeners for '{}'", handle.event),
        }
    }

    /// Emit `event` to every registered listener.
    ///
    /// The listener list is cloned out of the lock first, so a listener
    /// may call back into `on`/`remove_listener` without deadlocking.
    pub fn emit(&self, event: &str, data: &Value) {
        let snapshot: Vec<Listener> = {
            let listeners = self.listeners.lock().expect("listener table poisoned");
            match listeners.get(event) {
                Some(entries) => entries.iter().map(|(_, l)| l.clone()).collect(),
                None => return,
            }
        };
        for listener in snapshot {
            listener(data);
        }
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .lock()
            .expect("listener table poisoned")
            .get(event)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}
