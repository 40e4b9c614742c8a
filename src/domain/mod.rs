//! Domain layer: lifecycle events, the event relay, queries and
//! subscription handles.
//!
//! Nothing in here talks to the network; the types are shared by the
//! controller, the public façade and transport implementations.

pub mod event_relay;
pub mod listener_id;
pub mod live_event;
pub mod query;
pub mod subscription;

pub use event_relay::{EventRelay, Listener};
pub use listener_id::ListenerId;
pub use live_event::{EventKind, LiveQueryEvent, TransportError};
pub use query::Query;
pub use subscription::{Subscription, SubscriptionId};
