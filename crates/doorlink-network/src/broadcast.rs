//! Observer fan-out and the door records it publishes.
//!
//! The broadcaster owns the current observer set and the last known
//! [`Door`] record per module. Door records change only through
//! [`ObserverBroadcaster::apply_status`], which the session calls with
//! normalized statuses; raw wire text never reaches them.
//!
//! Delivery is isolated per observer: a failing sink is logged and
//! skipped, the rest of the set still receives the event.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use doorlink_core::{CanonicalStatus, Door, ModuleId};

use crate::events::ObserverEvent;
use crate::sink::NotificationSink;

/// Handle identifying one connected observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    observers: Mutex<BTreeMap<ObserverId, Arc<dyn NotificationSink>>>,
    doors: Mutex<BTreeMap<ModuleId, Door>>,
    last_seen: Mutex<HashMap<ModuleId, DateTime<Utc>>>,
}

/// Publishes normalized state to every connected observer.
///
/// Cloning yields another handle to the same observer set.
#[derive(Clone, Default)]
pub struct ObserverBroadcaster {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ObserverBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer to the set.
    pub fn add(&self, sink: Arc<dyn NotificationSink>) -> ObserverId {
        let id = ObserverId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let count = {
            let mut observers = lock(&self.inner.observers);
            observers.insert(id, sink);
            observers.len()
        };
        debug!(observer = %id, observers = count, "Observer connected");
        id
    }

    /// Remove an observer. Its pending commands are not affected.
    pub fn remove(&self, id: ObserverId) -> bool {
        let removed = lock(&self.inner.observers).remove(&id).is_some();
        if removed {
            debug!(observer = %id, "Observer disconnected");
        }
        removed
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.inner.observers).len()
    }

    /// Deliver `event` to every current observer.
    ///
    /// Returns the number of observers that accepted it.
    pub fn publish(&self, event: &ObserverEvent) -> usize {
        // Snapshot so sinks run without the set locked.
        let observers: Vec<_> = lock(&self.inner.observers)
            .iter()
            .map(|(id, sink)| (*id, Arc::clone(sink)))
            .collect();

        trace!(event = event.name(), observers = observers.len(), "Publishing");
        let mut delivered = 0;
        for (id, sink) in observers {
            match sink.deliver(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(observer = %id, event = event.name(), error = %e, "Delivery failed"),
            }
        }
        delivered
    }

    /// Fold a canonical status into the door record of `module`.
    ///
    /// Returns the updated record.
    pub fn apply_status(&self, module: &ModuleId, status: CanonicalStatus) -> Door {
        let mut doors = lock(&self.inner.doors);
        let door = doors
            .entry(module.clone())
            .or_insert_with(|| Door::new(module.clone()));
        door.apply(status);
        trace!(%module, %status, door_open = ?door.door_open, lock_locked = ?door.lock_locked, "Door updated");
        door.clone()
    }

    /// Snapshot of one door record. Unseen modules read as all-unknown.
    pub fn door(&self, module: &ModuleId) -> Door {
        lock(&self.inner.doors)
            .get(module)
            .cloned()
            .unwrap_or_else(|| Door::new(module.clone()))
    }

    /// Snapshot of every door that has received a status, ordered by module.
    pub fn doors(&self) -> Vec<Door> {
        lock(&self.inner.doors).values().cloned().collect()
    }

    /// Record a liveness signal from `module` at the current time.
    pub fn mark_seen(&self, module: &ModuleId) {
        self.mark_seen_at(module, Utc::now());
    }

    pub fn mark_seen_at(&self, module: &ModuleId, at: DateTime<Utc>) {
        lock(&self.inner.last_seen).insert(module.clone(), at);
    }

    pub fn last_seen(&self, module: &ModuleId) -> Option<DateTime<Utc>> {
        lock(&self.inner.last_seen).get(module).copied()
    }

    /// Whether `module` sent a HEARTBEAT or HELLO within `window`.
    pub fn is_online(&self, module: &ModuleId, window: Duration) -> bool {
        let Some(seen) = self.last_seen(module) else {
            return false;
        };
        let Ok(window) = chrono::Duration::from_std(window) else {
            return true;
        };
        Utc::now() - seen <= window
    }
}
