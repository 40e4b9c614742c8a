//! Recording transport used by unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast;

use super::{ClientSettings, LiveQueryTransport, TransportEvent, TransportFactory};
use crate::domain::{Query, Subscription, SubscriptionId};
use crate::error::LiveQueryError;

#[derive(Debug)]
pub(crate) struct MockTransport {
    settings: ClientSettings,
    connecting: AtomicBool,
    closed: AtomicBool,
    open_calls: AtomicUsize,
    close_calls: AtomicUsize,
    next_request_id: AtomicU64,
    subscribed: Mutex<Vec<(Query, Option<String>)>>,
    unsubscribed: Mutex<Vec<SubscriptionId>>,
    events: broadcast::Sender<TransportEvent>,
}

impl MockTransport {
    pub(crate) fn new(settings: ClientSettings) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            settings,
            connecting: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            open_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            next_request_id: AtomicU64::new(1),
            subscribed: Mutex::new(Vec::new()),
            unsubscribed: Mutex::new(Vec::new()),
            events,
        }
    }

    pub(crate) fn standalone(server_url: &str) -> Arc<Self> {
        Arc::new(Self::new(ClientSettings {
            application_id: None,
            server_url: server_url.to_string(),
            javascript_key: None,
            master_key: None,
            session_token: None,
        }))
    }

    pub(crate) fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub(crate) fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn subscribed(&self) -> Vec<(Query, Option<String>)> {
        self.subscribed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn unsubscribed(&self) -> Vec<SubscriptionId> {
        self.unsubscribed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Simulates the transport reporting a lifecycle event.
    pub(crate) fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl LiveQueryTransport for MockTransport {
    fn open(&self) {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        self.connecting.store(true, Ordering::SeqCst);
        self.closed.store(false, Ordering::SeqCst);
        self.emit(TransportEvent::Open);
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.connecting.store(false, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        self.emit(TransportEvent::Close);
    }

    fn should_open(&self) -> bool {
        !self.connecting.load(Ordering::SeqCst)
    }

    async fn subscribe(
        &self,
        query: Query,
        session_token: Option<SecretString>,
    ) -> Result<Subscription, LiveQueryError> {
        let id = SubscriptionId::new(self.next_request_id.fetch_add(1, Ordering::SeqCst));
        let token = session_token.map(|token| token.expose_secret().clone());
        self.subscribed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((query.clone(), token));
        Ok(Subscription::new(id, query))
    }

    async fn unsubscribe(&self, subscription: &Subscription) -> Result<(), LiveQueryError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LiveQueryError::Transport(
                "client is closed; subscriptions were dropped".to_string(),
            ));
        }
        self.unsubscribed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscription.id());
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}

/// Factory recording every client it builds.
#[derive(Debug, Default)]
pub(crate) struct MockFactory {
    built: Mutex<Vec<Arc<MockTransport>>>,
    failures_remaining: AtomicUsize,
    build_delay: Option<Duration>,
}

impl MockFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes every build wait, so concurrent callers overlap.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.build_delay = Some(delay);
        self
    }

    /// Makes the next `count` builds fail.
    pub(crate) fn failing(self, count: usize) -> Self {
        self.failures_remaining.store(count, Ordering::SeqCst);
        self
    }

    pub(crate) fn build_count(&self) -> usize {
        self.built
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn last(&self) -> Option<Arc<MockTransport>> {
        self.built
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(Arc::clone)
    }
}

#[async_trait]
impl TransportFactory for MockFactory {
    async fn build(
        &self,
        settings: ClientSettings,
    ) -> Result<Arc<dyn LiveQueryTransport>, LiveQueryError> {
        match self.build_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(LiveQueryError::TransportConstruction(
                "mock transport refused to initialize".to_string(),
            ));
        }

        let transport = Arc::new(MockTransport::new(settings));
        self.built
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&transport));
        Ok(transport)
    }
}

/// Returns `true` when `client` is the same instance as `mock`.
pub(crate) fn is_same(client: &Arc<dyn LiveQueryTransport>, mock: &Arc<MockTransport>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(client), Arc::as_ptr(mock))
}
