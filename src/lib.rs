//! # livequery-link
//!
//! Connection management for real-time LiveQuery subscriptions.
//!
//! This crate decides when the single live-update transport client is
//! created, what endpoint and session it connects with, and how its
//! lifecycle events reach the application. The wire protocol itself is
//! delegated to a [`transport::LiveQueryTransport`] implementation.
//!
//! ## Architecture
//!
//! ```text
//! Application
//!     │
//!     ├── LiveQuery façade (open, close, on/off)
//!     │
//!     ├── LiveQueryController (service/)
//!     │     ├── SessionResolver (session)
//!     │     ├── endpoint resolution (endpoint)
//!     │     └── TransportFactory → LiveQueryTransport
//!     │
//!     └── EventRelay (domain/)
//! ```

pub mod config;
pub mod domain;
pub mod endpoint;
pub mod error;
pub mod live_query;
pub mod service;
pub mod session;
pub mod transport;

pub use domain::{EventKind, EventRelay, LiveQueryEvent, Query, Subscription, TransportError};
pub use error::LiveQueryError;
pub use live_query::LiveQuery;
pub use service::{ControllerStatus, LiveQueryController};
