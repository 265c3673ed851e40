//! Per-client subscription registry.
//!
//! Maps event names to ordered callback lists. Each client owns its own
//! registry; nothing here is process-wide.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, error};

use crate::events::SocketEventType;

/// Callback invoked with the event payload (`None` when absent).
pub type Callback = Arc<dyn Fn(Option<&Value>) + Send + Sync + 'static>;

/// Handle identifying one subscription, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    callback: Callback,
    once: bool,
}

/// Event name to subscriber list mapping with isolated dispatch.
#[derive(Default)]
pub struct EventRegistry {
    subscriptions: Mutex<HashMap<SocketEventType, Vec<Subscription>>>,
    next_id: AtomicU64,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `callback` to every future dispatch of `event`.
    pub fn on<F>(&self, event: impl Into<SocketEventType>, callback: F) -> SubscriptionId
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        self.insert(event.into(), Arc::new(callback), false)
    }

    /// Subscribe `callback` to the next dispatch of `event` only.
    pub fn once<F>(&self, event: impl Into<SocketEventType>, callback: F) -> SubscriptionId
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        self.insert(event.into(), Arc::new(callback), true)
    }

    fn insert(&self, event: SocketEventType, callback: Callback, once: bool) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(event)
            .or_default()
            .push(Subscription { id, callback, once });
        id
    }

    /// Remove subscriptions.
    ///
    /// - `off(None, None)` removes everything.
    /// - `off(Some(event), None)` removes every subscription of `event`.
    /// - `off(Some(event), Some(id))` removes that one subscription.
    /// - `off(None, Some(id))` removes that subscription under any event.
    ///
    /// Returns the number of subscriptions removed.
    pub fn off(&self, event: Option<&SocketEventType>, id: Option<SubscriptionId>) -> usize {
        let mut subscriptions = self.lock();
        let removed: usize = match (event, id) {
            (None, None) => {
                let count: usize = subscriptions.values().map(Vec::len).sum();
                subscriptions.clear();
                count
            }
            (Some(event), None) => subscriptions.remove(event).map_or(0, |list| list.len()),
            (Some(event), Some(id)) => match subscriptions.get_mut(event) {
                Some(list) => remove_id(list, id),
                None => 0,
            },
            (None, Some(id)) => subscriptions
                .values_mut()
                .map(|list| remove_id(list, id))
                .sum(),
        };
        subscriptions.retain(|_, list| !list.is_empty());
        removed
    }

    /// Number of subscriptions currently registered for `event`.
    pub fn subscriber_count(&self, event: &SocketEventType) -> usize {
        self.lock().get(event).map_or(0, Vec::len)
    }

    /// Invoke every subscriber of `event` in registration order.
    ///
    /// The subscriber list is snapshotted first, so callbacks may subscribe
    /// or unsubscribe while being invoked. One-shot subscriptions are removed
    /// before their callback runs. A panicking callback is logged and the
    /// remaining callbacks still run.
    ///
    /// Returns how many callbacks were invoked.
    pub fn dispatch(&self, event: &SocketEventType, payload: Option<&Value>) -> usize {
        let callbacks: Vec<Callback> = {
            let mut subscriptions = self.lock();
            let Some(list) = subscriptions.get_mut(event) else {
                debug!("no subscribers for event {event}");
                return 0;
            };
            let snapshot = list.iter().map(|s| Arc::clone(&s.callback)).collect();
            list.retain(|s| !s.once);
            if list.is_empty() {
                subscriptions.remove(event);
            }
            snapshot
        };

        for callback in &callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
                error!("subscriber for event {event} panicked; continuing with the next one");
            }
        }

        debug!("dispatched {event} to {} subscriber(s)", callbacks.len());
        callbacks.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SocketEventType, Vec<Subscription>>> {
        // A poisoned lock only means a panic happened while holding it; the
        // map itself is never left half-updated.
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn remove_id(list: &mut Vec<Subscription>, id: SubscriptionId) -> usize {
    let before = list.len();
    list.retain(|s| s.id != id);
    before - list.len()
}
