//! Public façade: the composition root applications hold on to.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::{self, ConfigStore};
use crate::domain::{EventKind, EventRelay, ListenerId, LiveQueryEvent};
use crate::service::LiveQueryController;
use crate::session::CurrentUserProvider;
use crate::transport::TransportFactory;

/// Shared handle to the live query connection.
///
/// Exposes `open`/`close` and event registration; `subscribe` and
/// `unsubscribe` go through [`LiveQuery::controller`]. Clones share the
/// same controller and relay.
#[derive(Debug, Clone)]
pub struct LiveQuery {
    controller: Arc<LiveQueryController>,
}

impl LiveQuery {
    /// Wraps an existing controller.
    #[must_use]
    pub const fn new(controller: Arc<LiveQueryController>) -> Self {
        Self { controller }
    }

    /// Builds a controller from environment configuration.
    ///
    /// Reads the configuration keys via [`ConfigStore::from_env`] and sizes
    /// the relay from `EVENT_RELAY_CAPACITY`.
    #[must_use]
    pub fn from_env(
        users: Arc<dyn CurrentUserProvider>,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        let relay = EventRelay::new(config::event_relay_capacity());
        let config = Arc::new(ConfigStore::from_env());
        tracing::debug!(?config, "live query configuration loaded");
        Self::new(Arc::new(LiveQueryController::new(config, users, factory, relay)))
    }

    /// Returns the controller for subscription management.
    #[must_use]
    pub const fn controller(&self) -> &Arc<LiveQueryController> {
        &self.controller
    }

    /// Opens the live connection, creating the client if needed.
    pub async fn open(&self) {
        self.controller.open().await;
    }

    /// Closes the live connection. Subscriptions on the client are dropped.
    pub async fn close(&self) {
        self.controller.close().await;
    }

    /// Registers a listener for `kind` events.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&LiveQueryEvent) + Send + Sync + 'static,
    {
        self.controller.relay().on(kind, listener)
    }

    /// Removes a listener registered with [`LiveQuery::on`].
    pub fn off(&self, id: ListenerId) -> bool {
        self.controller.relay().off(id)
    }

    /// Returns a receiver for all future lifecycle events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<LiveQueryEvent> {
        self.controller.relay().subscribe()
    }
}
