//! Service layer: client lifecycle orchestration.
//!
//! [`LiveQueryController`] owns the single transport client, resolves the
//! endpoint and session it connects with, and forwards its lifecycle
//! events through the [`super::domain::EventRelay`].

pub mod controller;

pub use controller::{ControllerStatus, LiveQueryController};
