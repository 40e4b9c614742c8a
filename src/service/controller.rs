//! Client lifecycle management: one lazily created transport client per
//! controller.
//!
//! The client slot is an explicit state machine. The first caller that
//! finds it `Uninitialized` (or `Failed`) moves it to `Creating` and runs
//! construction; everyone arriving meanwhile waits on the same `watch`
//! channel, so at most one client is ever built for a given slot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use secrecy::SecretString;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::config::{ConfigKey, ConfigStore};
use crate::domain::{EventRelay, LiveQueryEvent, Query, Subscription, TransportError};
use crate::endpoint;
use crate::error::LiveQueryError;
use crate::session::{CurrentUserProvider, SessionResolver};
use crate::transport::{ClientSettings, LiveQueryTransport, TransportFactory};

type CreationOutcome = Result<Arc<dyn LiveQueryTransport>, LiveQueryError>;

/// Observable state of the client slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerStatus {
    /// No client has been requested yet, or the slot was reset.
    Uninitialized,
    /// A client is being constructed.
    Creating,
    /// A client is installed and reused by every operation.
    Ready,
    /// The last construction failed; the next request retries.
    Failed(LiveQueryError),
}

struct ReadyClient {
    client: Arc<dyn LiveQueryTransport>,
    relay_task: Option<JoinHandle<()>>,
}

enum ClientState {
    Uninitialized,
    Creating {
        generation: u64,
        outcome: watch::Receiver<Option<CreationOutcome>>,
    },
    Ready(ReadyClient),
    Failed(LiveQueryError),
}

struct Slot {
    state: ClientState,
    next_generation: u64,
}

enum Step {
    Create {
        generation: u64,
        publish: watch::Sender<Option<CreationOutcome>>,
    },
    Wait(watch::Receiver<Option<CreationOutcome>>),
}

/// Puts the slot back to `Uninitialized` if the creating future is dropped
/// before it records an outcome.
struct CreationGuard<'a> {
    slot: &'a Mutex<Slot>,
    generation: u64,
    armed: bool,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(slot.state, ClientState::Creating { generation, .. } if generation == self.generation)
        {
            tracing::debug!(generation = self.generation, "client creation abandoned");
            slot.state = ClientState::Uninitialized;
        }
    }
}

/// Owns the live query transport client and the operations that use it.
///
/// Meant to be created once by the application's composition root and
/// shared behind an [`Arc`].
pub struct LiveQueryController {
    config: Arc<ConfigStore>,
    sessions: SessionResolver,
    factory: Arc<dyn TransportFactory>,
    relay: EventRelay,
    slot: Mutex<Slot>,
}

impl LiveQueryController {
    /// Creates a controller with an empty client slot.
    #[must_use]
    pub fn new(
        config: Arc<ConfigStore>,
        users: Arc<dyn CurrentUserProvider>,
        factory: Arc<dyn TransportFactory>,
        relay: EventRelay,
    ) -> Self {
        Self {
            config,
            sessions: SessionResolver::new(users),
            factory,
            relay,
            slot: Mutex::new(Slot {
                state: ClientState::Uninitialized,
                next_generation: 0,
            }),
        }
    }

    /// Returns the relay client events are forwarded to.
    #[must_use]
    pub const fn relay(&self) -> &EventRelay {
        &self.relay
    }

    /// Returns the shared configuration store.
    #[must_use]
    pub const fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    /// Returns the current state of the client slot.
    #[must_use]
    pub fn status(&self) -> ControllerStatus {
        match &self.lock_slot().state {
            ClientState::Uninitialized => ControllerStatus::Uninitialized,
            ClientState::Creating { .. } => ControllerStatus::Creating,
            ClientState::Ready(_) => ControllerStatus::Ready,
            ClientState::Failed(err) => ControllerStatus::Failed(err.clone()),
        }
    }

    /// Returns the transport client, creating it on first use.
    ///
    /// Concurrent callers share a single construction. A failed
    /// construction leaves no client behind, so the next call retries.
    ///
    /// # Errors
    ///
    /// Returns [`LiveQueryError::Configuration`] if the endpoint cannot be
    /// resolved, [`LiveQueryError::Credential`] if the user lookup fails,
    /// or the factory's error if the client cannot be built.
    pub async fn get_default_client(&self) -> Result<Arc<dyn LiveQueryTransport>, LiveQueryError> {
        loop {
            let step = {
                let mut guard = self.lock_slot();
                let slot = &mut *guard;
                match &slot.state {
                    ClientState::Ready(ready) => return Ok(Arc::clone(&ready.client)),
                    ClientState::Creating { outcome, .. } => Step::Wait(outcome.clone()),
                    ClientState::Uninitialized | ClientState::Failed(_) => {
                        let generation = slot.next_generation;
                        slot.next_generation = slot.next_generation.wrapping_add(1);
                        let (publish, outcome) = watch::channel(None);
                        slot.state = ClientState::Creating {
                            generation,
                            outcome,
                        };
                        Step::Create {
                            generation,
                            publish,
                        }
                    }
                }
            };

            match step {
                Step::Create {
                    generation,
                    publish,
                } => {
                    if let Some(outcome) = self.run_creation(generation, publish).await {
                        return outcome;
                    }
                }
                Step::Wait(mut outcome) => {
                    let shared = outcome
                        .wait_for(Option::is_some)
                        .await
                        .ok()
                        .and_then(|value| (*value).clone());
                    if let Some(outcome) = shared {
                        return outcome;
                    }
                    tracing::debug!("client creation ended without an outcome, retrying");
                }
            }
            // The slot changed while we waited; look again.
        }
    }

    /// Installs `client` as the default, bypassing resolution.
    ///
    /// No validation or relay wiring is performed. Events of the replaced
    /// client stop reaching the relay.
    pub fn set_default_client(&self, client: Arc<dyn LiveQueryTransport>) {
        let previous = std::mem::replace(
            &mut self.lock_slot().state,
            ClientState::Ready(ReadyClient {
                client,
                relay_task: None,
            }),
        );
        if let ClientState::Ready(ReadyClient {
            relay_task: Some(task),
            ..
        }) = previous
        {
            task.abort();
        }
        tracing::debug!("default live query client overridden");
    }

    /// Empties the client slot and stops relaying the previous client's
    /// events. The previous client is returned, not closed.
    pub fn reset(&self) -> Option<Arc<dyn LiveQueryTransport>> {
        let previous = std::mem::replace(&mut self.lock_slot().state, ClientState::Uninitialized);
        match previous {
            ClientState::Ready(ready) => {
                if let Some(task) = ready.relay_task {
                    task.abort();
                }
                Some(ready.client)
            }
            ClientState::Uninitialized | ClientState::Creating { .. } | ClientState::Failed(_) => {
                None
            }
        }
    }

    /// Opens the default client's connection, creating the client if needed.
    ///
    /// Never fails: a client that cannot be created is reported on the
    /// relay as an error event.
    pub async fn open(&self) {
        match self.get_default_client().await {
            Ok(client) => client.open(),
            Err(err) => self.report_creation_failure("open", &err),
        }
    }

    /// Closes the default client's connection. The closed client stays
    /// installed and is reused by later operations.
    pub async fn close(&self) {
        match self.get_default_client().await {
            Ok(client) => client.close(),
            Err(err) => self.report_creation_failure("close", &err),
        }
    }

    /// Subscribes to `query` with the current user's session token.
    ///
    /// Asks the client to open first when it is not connected; the
    /// subscribe request is issued without waiting for the connection.
    ///
    /// # Errors
    ///
    /// Returns the creation error if no client can be obtained,
    /// [`LiveQueryError::Credential`] if the user lookup fails, or the
    /// transport's error if the subscribe request fails.
    pub async fn subscribe(&self, query: Query) -> Result<Subscription, LiveQueryError> {
        let client = self.get_default_client().await?;
        if client.should_open() {
            client.open();
        }
        let session_token = self.sessions.resolve().await?;
        let subscription = client.subscribe(query, session_token).await?;
        tracing::debug!(
            subscription_id = %subscription.id(),
            class_name = subscription.query().class_name(),
            "subscribed"
        );
        Ok(subscription)
    }

    /// Removes `subscription` from the default client. Failures are logged
    /// and otherwise ignored.
    pub async fn unsubscribe(&self, subscription: &Subscription) {
        match self.get_default_client().await {
            Ok(client) => {
                if let Err(err) = client.unsubscribe(subscription).await {
                    tracing::debug!(
                        subscription_id = %subscription.id(),
                        error = %err,
                        "unsubscribe failed"
                    );
                }
            }
            Err(err) => self.report_creation_failure("unsubscribe", &err),
        }
    }

    /// Runs one construction attempt and records its outcome.
    ///
    /// Returns `None` when the slot was reset or overridden while the
    /// client was being built; the caller then re-reads the slot.
    async fn run_creation(
        &self,
        generation: u64,
        publish: watch::Sender<Option<CreationOutcome>>,
    ) -> Option<CreationOutcome> {
        let mut guard = CreationGuard {
            slot: &self.slot,
            generation,
            armed: true,
        };
        let result = self.create_client().await;
        guard.armed = false;

        let mut slot = self.lock_slot();
        let owns_slot = matches!(
            slot.state,
            ClientState::Creating { generation: current, .. } if current == generation
        );

        if !owns_slot {
            drop(slot);
            if let Ok(client) = result {
                tracing::debug!("discarding client built for a superseded slot");
                client.close();
            }
            return None;
        }

        let outcome = match result {
            Ok(client) => {
                let relay_task = self.wire_relay(&client);
                slot.state = ClientState::Ready(ReadyClient {
                    client: Arc::clone(&client),
                    relay_task: Some(relay_task),
                });
                Ok(client)
            }
            Err(err) => {
                tracing::warn!(error = %err, "live query client creation failed");
                slot.state = ClientState::Failed(err.clone());
                Err(err)
            }
        };
        drop(slot);

        let _ = publish.send(Some(outcome.clone()));
        Some(outcome)
    }

    async fn create_client(&self) -> CreationOutcome {
        let session_token = self.sessions.resolve().await?;
        let server_url = endpoint::resolve_endpoint(&self.config)?;

        let settings = ClientSettings {
            application_id: self.config.get(ConfigKey::ApplicationId),
            server_url,
            javascript_key: self.config.get(ConfigKey::JavascriptKey),
            master_key: self.config.get(ConfigKey::MasterKey).map(SecretString::new),
            session_token,
        };
        let server_url = settings.server_url.clone();

        let client = self.factory.build(settings).await?;
        tracing::info!(%server_url, "live query client created");
        Ok(client)
    }

    /// Forwards the client's lifecycle events to the relay until the
    /// client's event stream ends.
    fn wire_relay(&self, client: &Arc<dyn LiveQueryTransport>) -> JoinHandle<()> {
        let mut events = client.events();
        let relay = self.relay.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        relay.emit(LiveQueryEvent::from(event));
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "relay lagged behind transport events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("transport event stream ended");
        })
    }

    fn report_creation_failure(&self, operation: &str, err: &LiveQueryError) {
        tracing::warn!(operation, error = %err, "no live query client available");
        self.relay
            .emit(LiveQueryEvent::errored(TransportError::from(err)));
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LiveQueryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveQueryController")
            .field("status", &self.status())
            .field("config", &self.config)
            .field("factory", &self.factory)
            .field("relay", &self.relay)
            .finish_non_exhaustive()
    }
}
