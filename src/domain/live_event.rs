//! Lifecycle events republished by the [`super::EventRelay`].
//!
//! Transport clients report `open`, `close` and `error`; the relay turns
//! each into a timestamped [`LiveQueryEvent`] for external listeners.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LiveQueryError;

/// The three lifecycle event kinds listeners can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The connection was established.
    Open,
    /// The connection was closed.
    Close,
    /// The transport reported an error.
    Error,
}

impl EventKind {
    /// Returns the event name as used by listeners (`"open"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error payload carried by an `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportError {
    /// Server or transport supplied error code, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    /// Human-readable description.
    pub message: String,
    /// Whether the transport intends to reconnect on its own.
    pub reconnect: bool,
}

impl TransportError {
    /// Creates a payload without a code.
    pub fn new(message: impl Into<String>, reconnect: bool) -> Self {
        Self {
            code: None,
            message: message.into(),
            reconnect,
        }
    }

    /// Attaches an error code.
    #[must_use]
    pub fn with_code(mut self, code: u32) -> Self {
        self.code = Some(code);
        self
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "{} (code: {code})", self.message)
        } else {
            f.write_str(&self.message)
        }
    }
}

impl From<&LiveQueryError> for TransportError {
    fn from(err: &LiveQueryError) -> Self {
        Self {
            code: Some(err.error_code()),
            message: err.to_string(),
            reconnect: false,
        }
    }
}

/// Event emitted on the relay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum LiveQueryEvent {
    /// The live connection opened.
    Opened {
        /// When the relay observed the event.
        timestamp: DateTime<Utc>,
    },

    /// The live connection closed.
    Closed {
        /// When the relay observed the event.
        timestamp: DateTime<Utc>,
    },

    /// The transport (or client creation) failed.
    Errored {
        /// Error payload, passed through unchanged.
        error: TransportError,
        /// When the relay observed the event.
        timestamp: DateTime<Utc>,
    },
}

impl LiveQueryEvent {
    /// Builds an `Opened` event stamped now.
    #[must_use]
    pub fn opened() -> Self {
        Self::Opened {
            timestamp: Utc::now(),
        }
    }

    /// Builds a `Closed` event stamped now.
    #[must_use]
    pub fn closed() -> Self {
        Self::Closed {
            timestamp: Utc::now(),
        }
    }

    /// Builds an `Errored` event stamped now.
    #[must_use]
    pub fn errored(error: TransportError) -> Self {
        Self::Errored {
            error,
            timestamp: Utc::now(),
        }
    }

    /// Returns the kind listeners match on.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Opened { .. } => EventKind::Open,
            Self::Closed { .. } => EventKind::Close,
            Self::Errored { .. } => EventKind::Error,
        }
    }

    /// Returns the error payload for `Errored` events.
    #[must_use]
    pub const fn error(&self) -> Option<&TransportError> {
        match self {
            Self::Errored { error, .. } => Some(error),
            Self::Opened { .. } | Self::Closed { .. } => None,
        }
    }

    /// Returns the event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Opened { timestamp }
            | Self::Closed { timestamp }
            | Self::Errored { timestamp, .. } => *timestamp,
        }
    }
}
