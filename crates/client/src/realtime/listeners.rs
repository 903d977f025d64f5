//! Event listener registry and subscription handles.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use speakspace_shared::{EventKind, ServerEvent};

type Callback = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

struct Listener {
    id: u64,
    kind: EventKind,
    active: Arc<AtomicBool>,
    callback: Callback,
}

/// Listeners in registration order.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

impl ListenerRegistry {
    fn listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn add(
        self: &Arc<Self>,
        kind: EventKind,
        callback: impl Fn(&ServerEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.listeners().push(Listener {
            id,
            kind,
            active: active.clone(),
            callback: Arc::new(callback),
        });
        tracing::debug!("Listener {} registered for {}", id, kind.name());

        Subscription {
            id,
            kind,
            active,
            registry: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        before != listeners.len()
    }

    /// Invoke every listener for the event's kind, returning how many ran.
    ///
    /// Callbacks run after the registry lock is released, so they may
    /// subscribe or unsubscribe freely. A panicking callback is logged and
    /// does not stop the others.
    pub(crate) fn dispatch(&self, event: &ServerEvent) -> usize {
        let kind = event.kind();
        let targets: Vec<(u64, Arc<AtomicBool>, Callback)> = self
            .listeners()
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| (l.id, l.active.clone(), l.callback.clone()))
            .collect();

        let mut invoked = 0;
        for (id, active, callback) in targets {
            // Skip listeners disposed by an earlier callback in this round
            if !active.load(Ordering::Acquire) {
                continue;
            }
            invoked += 1;
            if panic::catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                tracing::error!("Listener {} panicked handling {}", id, kind.name());
            }
        }
        invoked
    }

    pub(crate) fn count(&self, kind: EventKind) -> usize {
        self.listeners().iter().filter(|l| l.kind == kind).count()
    }
}

/// Handle to a registered listener.
///
/// Call [`Subscription::unsubscribe`] when the listener's owner goes away.
/// Dropping the handle does not remove the listener.
#[must_use = "dropping a Subscription leaves the listener registered; call `unsubscribe` on teardown"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    kind: EventKind,
    active: Arc<AtomicBool>,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    pub fn event(&self) -> EventKind {
        self.kind
    }

    /// Remove exactly this listener. No invocation starts after this returns.
    pub fn unsubscribe(self) {
        self.active.store(false, Ordering::Release);
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.id) {
                tracing::debug!("Listener {} removed from {}", self.id, self.kind.name());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speakspace_shared::Participant;

    fn joined(user: &str) -> ServerEvent {
        ServerEvent::UserJoined(Participant {
            user_id: user.to_string(),
            session_id: "s1".to_string(),
        })
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let registry = Arc::new(ListenerRegistry::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let subs: Vec<Subscription> = (0..3)
            .map(|i| {
                let seen = seen.clone();
                registry.add(EventKind::UserJoined, move |_| seen.lock().unwrap().push(i))
            })
            .collect();

        assert_eq!(registry.dispatch(&joined("u1")), 3);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);

        for sub in subs {
            sub.unsubscribe();
        }
        assert_eq!(registry.count(EventKind::UserJoined), 0);
    }

    #[test]
    fn test_dispatch_filters_by_kind() {
        let registry = Arc::new(ListenerRegistry::default());
        let sub = registry.add(EventKind::UserLeft, |_| panic!("wrong kind"));

        assert_eq!(registry.dispatch(&joined("u1")), 0);
        sub.unsubscribe();
    }

    #[test]
    fn test_unsubscribe_removes_only_that_listener() {
        let registry = Arc::new(ListenerRegistry::default());
        let hits = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let hits = hits.clone();
            registry.add(EventKind::UserJoined, move |_| hits.lock().unwrap().push("first"))
        };
        let second = {
            let hits = hits.clone();
            registry.add(EventKind::UserJoined, move |_| hits.lock().unwrap().push("second"))
        };

        first.unsubscribe();
        registry.dispatch(&joined("u1"));

        assert_eq!(*hits.lock().unwrap(), vec!["second"]);
        second.unsubscribe();
    }

    #[test]
    fn test_unsubscribe_from_inside_callback() {
        let registry = Arc::new(ListenerRegistry::default());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicU64::new(0));

        let first = {
            let slot = slot.clone();
            registry.add(EventKind::UserJoined, move |_| {
                if let Some(sub) = slot.lock().unwrap().take() {
                    sub.unsubscribe();
                }
            })
        };
        let second = {
            let hits = hits.clone();
            registry.add(EventKind::UserJoined, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        *slot.lock().unwrap() = Some(second);

        // The first listener disposes the second before it runs
        assert_eq!(registry.dispatch(&joined("u1")), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(registry.count(EventKind::UserJoined), 1);
        first.unsubscribe();
    }

    #[test]
    fn test_panicking_listener_does_not_stop_dispatch() {
        let registry = Arc::new(ListenerRegistry::default());
        let hits = Arc::new(AtomicU64::new(0));

        let faulty = registry.add(EventKind::UserJoined, |_| panic!("listener bug"));
        let counting = {
            let hits = hits.clone();
            registry.add(EventKind::UserJoined, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };

        assert_eq!(registry.dispatch(&joined("u1")), 2);
        assert_eq!(registry.dispatch(&joined("u2")), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        faulty.unsubscribe();
        counting.unsubscribe();
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped() {
        let registry = Arc::new(ListenerRegistry::default());
        let sub = registry.add(EventKind::Message, |_| {});
        drop(registry);
        sub.unsubscribe();
    }
}
