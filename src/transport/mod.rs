//! Transport client contracts.
//!
//! The wire protocol, reconnection and backoff live behind
//! [`LiveQueryTransport`]; this crate only decides *when* a client is
//! built and how its lifecycle events reach the relay. A
//! [`TransportFactory`] turns resolved [`ClientSettings`] into a client.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::broadcast;

use crate::domain::{LiveQueryEvent, Query, Subscription, TransportError};
use crate::error::LiveQueryError;

#[cfg(test)]
pub(crate) mod mock;

/// Configuration resolved once per client construction.
#[derive(Clone, Debug)]
pub struct ClientSettings {
    /// Application identifier.
    pub application_id: Option<String>,
    /// Real-time endpoint, always `ws`-family.
    pub server_url: String,
    /// Client ("JavaScript") key.
    pub javascript_key: Option<String>,
    /// Privileged master key.
    pub master_key: Option<SecretString>,
    /// Session token of the user current at construction time.
    pub session_token: Option<SecretString>,
}

/// Lifecycle event reported by a transport client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection was established.
    Open,
    /// The connection was closed.
    Close,
    /// The client hit an error.
    Error(TransportError),
}

impl From<TransportEvent> for LiveQueryEvent {
    fn from(event: TransportEvent) -> Self {
        match event {
            TransportEvent::Open => Self::opened(),
            TransportEvent::Close => Self::closed(),
            TransportEvent::Error(error) => Self::errored(error),
        }
    }
}

/// A live-update client connected to one real-time endpoint.
///
/// Implementations queue subscribe requests issued before the connection
/// is established, and report every lifecycle change on [`Self::events`].
#[async_trait]
pub trait LiveQueryTransport: Send + Sync + fmt::Debug {
    /// Starts connecting. Outcome is reported through [`Self::events`].
    fn open(&self);

    /// Closes the connection, stops reconnecting and drops every
    /// subscription registered on this client.
    fn close(&self);

    /// Returns `true` when the client is neither open nor connecting.
    fn should_open(&self) -> bool;

    /// Registers `query` on the server.
    ///
    /// # Errors
    ///
    /// Returns [`LiveQueryError::Transport`] if the request cannot be issued.
    async fn subscribe(
        &self,
        query: Query,
        session_token: Option<SecretString>,
    ) -> Result<Subscription, LiveQueryError>;

    /// Removes a registration created by [`Self::subscribe`].
    ///
    /// # Errors
    ///
    /// Returns [`LiveQueryError::Transport`] if the request cannot be issued.
    async fn unsubscribe(&self, subscription: &Subscription) -> Result<(), LiveQueryError>;

    /// Returns a receiver for this client's lifecycle events.
    fn events(&self) -> broadcast::Receiver<TransportEvent>;
}

/// Builds transport clients from resolved settings.
#[async_trait]
pub trait TransportFactory: Send + Sync + fmt::Debug {
    /// Constructs a client. The client is not opened.
    ///
    /// # Errors
    ///
    /// Returns [`LiveQueryError::TransportConstruction`] if the client
    /// cannot be initialized.
    async fn build(
        &self,
        settings: ClientSettings,
    ) -> Result<Arc<dyn LiveQueryTransport>, LiveQueryError>;
}
