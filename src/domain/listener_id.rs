//! Type-safe relay listener identifier.
//!
//! [`ListenerId`] is a newtype wrapper around [`uuid::Uuid`] (v4) so that
//! listener handles cannot be confused with other identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle returned when a listener is registered on the
/// [`super::EventRelay`]. Pass it back to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(uuid::Uuid);

impl ListenerId {
    /// Creates a new random `ListenerId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
