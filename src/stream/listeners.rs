//! Listener registry keyed by event kind
//!
//! Callbacks are stored per [`EventKind`] in registration order. Dispatch
//! works on a snapshot of the list, so a callback may register or remove
//! listeners (including itself) while it runs.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, error};
use uuid::Uuid;

use crate::events::{EventKind, EventPayload};

/// Type for listener IDs
pub type ListenerId = Uuid;

/// Callback invoked with a forwarded payload
pub type Callback = Arc<dyn Fn(&EventPayload) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
struct Listener {
    id: ListenerId,
    callback: Callback,
    once: bool,
}

/// Result of delivering one payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Callbacks that ran
    pub invoked: usize,
    /// Callbacks that returned an error or panicked
    pub failed: usize,
}

#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: Arc<DashMap<EventKind, Vec<Listener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for `kind`
    pub fn register(&self, kind: EventKind, callback: Callback, once: bool) -> ListenerId {
        let id = Uuid::new_v4();
        self.listeners.entry(kind).or_default().push(Listener {
            id,
            callback,
            once,
        });

        debug!(listener_id = %id, kind = %kind, once, "Registered listener");
        id
    }

    /// Remove a listener by ID
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut removed = false;
        for mut entry in self.listeners.iter_mut() {
            let before = entry.value().len();
            entry.value_mut().retain(|listener| listener.id != id);
            if entry.value().len() != before {
                removed = true;
                break;
            }
        }

        if removed {
            debug!(listener_id = %id, "Unregistered listener");
        } else {
            debug!(listener_id = %id, "Attempted to unregister non-existent listener");
        }
        removed
    }

    /// Remove every listener for `kind`, returning how many were dropped
    pub fn clear(&self, kind: EventKind) -> usize {
        let count = self
            .listeners
            .remove(&kind)
            .map(|(_, listeners)| listeners.len())
            .unwrap_or(0);
        debug!(kind = %kind, count, "Cleared listeners");
        count
    }

    /// Number of listeners registered for `kind`
    pub fn count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map(|l| l.len()).unwrap_or(0)
    }

    /// Number of listeners across all kinds
    pub fn total(&self) -> usize {
        self.listeners.iter().map(|entry| entry.value().len()).sum()
    }

    /// Invoke every listener registered for the payload's kind
    pub fn dispatch(&self, payload: &EventPayload) -> DispatchOutcome {
        let kind = payload.kind();
        let snapshot = match self.listeners.get(&kind) {
            Some(listeners) => listeners.value().clone(),
            None => return DispatchOutcome::default(),
        };

        let mut outcome = DispatchOutcome::default();
        for listener in snapshot {
            // One-shot listeners are claimed before they run so they fire once
            if listener.once && !self.take(kind, listener.id) {
                continue;
            }

            outcome.invoked += 1;
            match catch_unwind(AssertUnwindSafe(|| (listener.callback)(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    outcome.failed += 1;
                    error!(
                        listener_id = %listener.id,
                        kind = %kind,
                        error = %e,
                        "Listener execution failed"
                    );
                }
                Err(_) => {
                    outcome.failed += 1;
                    error!(listener_id = %listener.id, kind = %kind, "Listener panicked");
                }
            }
        }
        outcome
    }

    fn take(&self, kind: EventKind, id: ListenerId) -> bool {
        match self.listeners.get_mut(&kind) {
            Some(mut listeners) => {
                let before = listeners.len();
                listeners.retain(|listener| listener.id != id);
                listeners.len() != before
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::events::{MediaKind, TrackEvent};

    fn track() -> EventPayload {
        TrackEvent::new("t1", MediaKind::Video).into()
    }

    fn counting(counter: &Arc<AtomicUsize>) -> Callback {
        let counter = Arc::clone(counter);
        Arc::new(move |_: &EventPayload| -> anyhow::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn dispatch_runs_in_registration_order() {
        let registry = ListenerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = Arc::clone(&order);
            registry.register(
                EventKind::Track,
                Arc::new(move |_: &EventPayload| -> anyhow::Result<()> {
                    order.lock().unwrap().push(n);
                    Ok(())
                }),
                false,
            );
        }

        let outcome = registry.dispatch(&track());
        assert_eq!(outcome, DispatchOutcome { invoked: 3, failed: 0 });
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn duplicate_registrations_each_fire() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let callback = counting(&counter);

        let a = registry.register(EventKind::Track, Arc::clone(&callback), false);
        let b = registry.register(EventKind::Track, callback, false);
        assert_ne!(a, b);

        registry.dispatch(&track());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn once_listener_is_removed_after_first_dispatch() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register(EventKind::Track, counting(&counter), true);

        registry.dispatch(&track());
        registry.dispatch(&track());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(registry.count(EventKind::Track), 0);
    }

    #[test]
    fn failures_do_not_stop_other_listeners() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        registry.register(
            EventKind::Track,
            Arc::new(|_: &EventPayload| -> anyhow::Result<()> { Err(anyhow::anyhow!("boom")) }),
            false,
        );
        registry.register(
            EventKind::Track,
            Arc::new(|_: &EventPayload| -> anyhow::Result<()> { panic!("listener panic") }),
            false,
        );
        registry.register(EventKind::Track, counting(&counter), false);

        let outcome = registry.dispatch(&track());
        assert_eq!(outcome, DispatchOutcome { invoked: 3, failed: 2 });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_unregister_itself() {
        let registry = ListenerRegistry::new();
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let inner = registry.clone();
        let own_id = Arc::clone(&slot);
        let id = registry.register(
            EventKind::Track,
            Arc::new(move |_: &EventPayload| -> anyhow::Result<()> {
                if let Some(id) = *own_id.lock().unwrap() {
                    inner.unregister(id);
                }
                Ok(())
            }),
            false,
        );
        *slot.lock().unwrap() = Some(id);

        registry.dispatch(&track());
        assert_eq!(registry.count(EventKind::Track), 0);
    }

    #[test]
    fn unregister_and_clear() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = registry.register(EventKind::Track, counting(&counter), false);
        registry.register(EventKind::Message, counting(&counter), false);
        registry.register(EventKind::Message, counting(&counter), false);

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert_eq!(registry.total(), 2);
        assert_eq!(registry.clear(EventKind::Message), 2);
        assert_eq!(registry.total(), 0);
    }
}
