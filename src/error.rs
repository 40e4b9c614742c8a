//! Error types for the LiveQuery connection layer.
//!
//! [`LiveQueryError`] is the central error type of the crate. Each variant
//! carries a stable numeric code so callers and relayed error payloads can
//! discriminate failures without matching on message text.

/// Crate-wide error enum.
///
/// The type is `Clone` because a single creation outcome is shared with
/// every caller that awaited the same in-flight client construction.
///
/// # Error Code Ranges
///
/// | Range     | Category       | Retryable                      |
/// |-----------|----------------|--------------------------------|
/// | 1000–1999 | Configuration  | after the configuration is fixed |
/// | 2000–2999 | Session        | yes                            |
/// | 3000–3999 | Transport      | yes                            |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiveQueryError {
    /// The real-time endpoint is missing or does not use a WebSocket scheme.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Looking up the current user failed.
    #[error("credential lookup failed: {0}")]
    Credential(String),

    /// The transport client could not be constructed.
    #[error("transport construction failed: {0}")]
    TransportConstruction(String),

    /// An existing transport client reported a failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl LiveQueryError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Configuration(_) => 1001,
            Self::Credential(_) => 2001,
            Self::TransportConstruction(_) => 3001,
            Self::Transport(_) => 3002,
        }
    }

    /// Returns `true` if the error was raised while creating the client,
    /// as opposed to by a client that already exists.
    #[must_use]
    pub const fn is_creation_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Credential(_) | Self::TransportConstruction(_)
        )
    }
}
