//! Subscription handles produced by transport clients.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Query;

/// Transport-assigned request id of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wraps a raw request id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw request id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live registration of a [`Query`] on the server.
///
/// Created by the transport client, owned by the caller and handed back to
/// unsubscribe. Only the transport interprets it.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    id: SubscriptionId,
    query: Query,
}

impl Subscription {
    /// Creates a handle. Called by transport implementations.
    #[must_use]
    pub const fn new(id: SubscriptionId, query: Query) -> Self {
        Self { id, query }
    }

    /// Request id assigned by the transport.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The subscribed query.
    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }
}
