//! Long-lived relay for connection lifecycle events.
//!
//! [`EventRelay`] keeps a listener table per [`EventKind`] and wraps a
//! [`tokio::sync::broadcast`] channel for async consumers. The relay
//! registers a no-op `error` listener in its constructor, so an `error`
//! event never goes unhandled even before any transport client exists.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use super::{EventKind, ListenerId, LiveQueryEvent};

/// Callback invoked synchronously for every matching event.
pub type Listener = Arc<dyn Fn(&LiveQueryEvent) + Send + Sync>;

struct Registration {
    id: ListenerId,
    kind: EventKind,
    listener: Listener,
}

struct RelayInner {
    sender: broadcast::Sender<LiveQueryEvent>,
    listeners: RwLock<Vec<Registration>>,
    default_error_listener: ListenerId,
}

/// Publish/subscribe surface for [`LiveQueryEvent`]s.
///
/// Cloning is cheap and every clone shares the same listeners and channel.
/// The broadcast ring buffer drops the oldest events for lagging receivers
/// once `capacity` is exceeded; registered listeners never lag.
#[derive(Clone)]
pub struct EventRelay {
    inner: Arc<RelayInner>,
}

impl EventRelay {
    /// Creates a relay with the given broadcast capacity and the default
    /// `error` listener installed.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        let default_error_listener = ListenerId::new();
        let listener: Listener = Arc::new(|event: &LiveQueryEvent| {
            if let Some(error) = event.error() {
                tracing::debug!(%error, "live query error");
            }
        });
        let registration = Registration {
            id: default_error_listener,
            kind: EventKind::Error,
            listener,
        };
        Self {
            inner: Arc::new(RelayInner {
                sender,
                listeners: RwLock::new(vec![registration]),
                default_error_listener,
            }),
        }
    }

    /// Registers `listener` for events of `kind`. Listeners are additive.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&LiveQueryEvent) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration {
                id,
                kind,
                listener: Arc::new(listener),
            });
        id
    }

    /// Removes a listener. Returns `false` if the id is unknown or names the
    /// built-in `error` listener, which cannot be removed.
    pub fn off(&self, id: ListenerId) -> bool {
        if id == self.inner.default_error_listener {
            return false;
        }
        let mut listeners = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|registration| registration.id != id);
        listeners.len() != before
    }

    /// Emits `event` to every listener registered for its kind, then to all
    /// broadcast receivers.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners
    /// and receivers still get the event. Returns the number of listeners
    /// that completed plus the receivers that got the event.
    pub fn emit(&self, event: LiveQueryEvent) -> usize {
        let kind = event.kind();
        // Listeners run outside the lock so they may register or remove
        // listeners themselves.
        let matching: Vec<Listener> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|registration| registration.kind == kind)
            .map(|registration| Arc::clone(&registration.listener))
            .collect();

        let mut delivered = 0_usize;
        for listener in &matching {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(_) => tracing::warn!(?kind, "live query listener panicked"),
            }
        }

        let received = self.inner.sender.send(event).unwrap_or(0);
        delivered.saturating_add(received)
    }

    /// Creates a receiver that will see all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LiveQueryEvent> {
        self.inner.sender.subscribe()
    }

    /// Returns the number of listeners registered for `kind`, including the
    /// built-in `error` listener.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|registration| registration.kind == kind)
            .count()
    }

    /// Returns the current number of broadcast receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }
}

impl fmt::Debug for EventRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRelay")
            .field("open_listeners", &self.listener_count(EventKind::Open))
            .field("close_listeners", &self.listener_count(EventKind::Close))
            .field("error_listeners", &self.listener_count(EventKind::Error))
            .field("receivers", &self.receiver_count())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::TransportError;

    #[test]
    fn default_error_listener_is_installed() {
        let relay = EventRelay::new(16);
        assert_eq!(relay.listener_count(EventKind::Error), 1);
        assert_eq!(relay.listener_count(EventKind::Open), 0);
        assert_eq!(relay.listener_count(EventKind::Close), 0);
    }

    #[test]
    fn error_without_user_listeners_is_handled() {
        let relay = EventRelay::new(16);
        let delivered = relay.emit(LiveQueryEvent::errored(TransportError::new("lost", true)));
        assert_eq!(delivered, 1);
    }

    #[test]
    fn listeners_only_see_their_kind() {
        let relay = EventRelay::new(16);
        let opens = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opens);
        relay.on(EventKind::Open, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        relay.emit(LiveQueryEvent::opened());
        relay.emit(LiveQueryEvent::closed());
        relay.emit(LiveQueryEvent::opened());

        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn error_listeners_receive_payload() {
        let relay = EventRelay::new(16);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        relay.on(EventKind::Error, move |event| {
            if let (Some(error), Ok(mut sink)) = (event.error(), sink.lock()) {
                sink.push(error.clone());
            }
        });

        let payload = TransportError::new("permission denied", false).with_code(141);
        let delivered = relay.emit(LiveQueryEvent::errored(payload.clone()));

        assert_eq!(delivered, 2);
        let Ok(seen) = seen.lock() else {
            panic!("listener state poisoned");
        };
        assert_eq!(seen.as_slice(), &[payload]);
    }

    #[test]
    fn off_removes_user_listener() {
        let relay = EventRelay::new(16);
        let id = relay.on(EventKind::Close, |_| {});
        assert_eq!(relay.listener_count(EventKind::Close), 1);

        assert!(relay.off(id));
        assert!(!relay.off(id));
        assert_eq!(relay.listener_count(EventKind::Close), 0);
    }

    #[test]
    fn default_error_listener_cannot_be_removed() {
        let relay = EventRelay::new(16);
        {
            let Ok(listeners) = relay.inner.listeners.read() else {
                panic!("listener table poisoned");
            };
            let Some(first) = listeners.first() else {
                panic!("expected default listener");
            };
            assert_eq!(first.id, relay.inner.default_error_listener);
        }

        assert!(!relay.off(relay.inner.default_error_listener));
        assert_eq!(relay.listener_count(EventKind::Error), 1);
    }

    #[test]
    fn panicking_listener_does_not_stop_delivery() {
        let relay = EventRelay::new(16);
        let mut rx = relay.subscribe();
        relay.on(EventKind::Open, |_| panic!("listener failure"));
        let opens = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opens);
        relay.on(EventKind::Open, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(relay.emit(LiveQueryEvent::opened()), 2);
        assert_eq!(relay.emit(LiveQueryEvent::opened()), 2);
        assert_eq!(opens.load(Ordering::SeqCst), 2);

        let Ok(event) = rx.try_recv() else {
            panic!("expected broadcast event");
        };
        assert_eq!(event.kind(), EventKind::Open);
    }

    #[test]
    fn listener_may_register_from_inside_callback() {
        let relay = EventRelay::new(16);
        let handle = relay.clone();
        relay.on(EventKind::Open, move |_| {
            handle.on(EventKind::Close, |_| {});
        });

        relay.emit(LiveQueryEvent::opened());
        assert_eq!(relay.listener_count(EventKind::Close), 1);
    }

    #[tokio::test]
    async fn subscriber_receives_event() {
        let relay = EventRelay::new(16);
        let mut rx = relay.subscribe();

        relay.emit(LiveQueryEvent::closed());

        let Ok(event) = rx.recv().await else {
            panic!("expected to receive event");
        };
        assert_eq!(event.kind(), EventKind::Close);
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let relay = EventRelay::new(16);
        assert_eq!(relay.receiver_count(), 0);

        let rx1 = relay.subscribe();
        let _rx2 = relay.subscribe();
        assert_eq!(relay.receiver_count(), 2);

        drop(rx1);
        assert_eq!(relay.receiver_count(), 1);
    }

    #[test]
    fn clones_share_listeners() {
        let relay = EventRelay::new(16);
        let clone = relay.clone();
        clone.on(EventKind::Open, |_| {});
        assert_eq!(relay.listener_count(EventKind::Open), 1);
    }
}
