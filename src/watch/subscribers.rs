//
//  subscribers.rs
//  DeployGraph
//
//  Created by hak (tharun)
//

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::warn;

use super::GraphChangeEvent;

/// Callback invoked once per published change.
pub type ChangeCallback = Arc<dyn Fn(&GraphChangeEvent) + Send + Sync>;

/// Registered change listeners.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, ChangeCallback)>>,
}

impl Subscribers {
    pub(crate) fn subscribe(self: &Arc<Self>, callback: ChangeCallback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, callback));
        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64) {
        self.lock().retain(|(entry_id, _)| *entry_id != id);
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `event` to every subscriber in registration order.
    ///
    /// Callbacks run outside the registry lock, so they may subscribe or
    /// unsubscribe. A panicking callback is logged and does not stop the rest.
    pub(crate) fn publish(&self, event: &GraphChangeEvent) {
        let snapshot: Vec<ChangeCallback> =
            self.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();

        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!(kind = ?event.kind, "change subscriber panicked");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, ChangeCallback)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle returned by `on_change`. Dropping it keeps the callback registered.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Subscribers>,
}

impl Subscription {
    /// Remove the callback. No-op if the coordinator is gone.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}
