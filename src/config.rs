//! Shared configuration store for the LiveQuery connection layer.
//!
//! Follows 12-factor style: [`ConfigStore::from_env`] reads every key from
//! environment variables (or a `.env` file via `dotenvy`). The store stays
//! writable after loading because endpoint resolution persists the derived
//! real-time URL back into it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Default capacity of the event relay broadcast channel.
pub const DEFAULT_EVENT_RELAY_CAPACITY: usize = 1024;

/// Keys understood by the [`ConfigStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// Application identifier presented to the server.
    ApplicationId,
    /// Client ("JavaScript") key.
    JavascriptKey,
    /// Privileged master key.
    MasterKey,
    /// Base request/response API endpoint, e.g. `https://api.example.com/1`.
    ServerUrl,
    /// Explicit real-time endpoint override, e.g. `wss://live.example.com`.
    LiveQueryServerUrl,
}

impl ConfigKey {
    /// All keys, in load order.
    pub const ALL: [Self; 5] = [
        Self::ApplicationId,
        Self::JavascriptKey,
        Self::MasterKey,
        Self::ServerUrl,
        Self::LiveQueryServerUrl,
    ];

    /// Returns the environment variable name this key is loaded from.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApplicationId => "APPLICATION_ID",
            Self::JavascriptKey => "JAVASCRIPT_KEY",
            Self::MasterKey => "MASTER_KEY",
            Self::ServerUrl => "SERVER_URL",
            Self::LiveQueryServerUrl => "LIVEQUERY_SERVER_URL",
        }
    }

    const fn is_secret(self) -> bool {
        matches!(self, Self::MasterKey)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide key/value configuration.
///
/// Reads and writes take a short, non-async lock; callers never hold it
/// across an `.await`.
#[derive(Default)]
pub struct ConfigStore {
    values: RwLock<HashMap<ConfigKey, String>>,
}

impl ConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every [`ConfigKey`] from the environment.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    /// Unset or empty variables are left unset.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let store = Self::new();
        for key in ConfigKey::ALL {
            if let Ok(value) = std::env::var(key.as_str())
                && !value.trim().is_empty()
            {
                store.set(key, value);
            }
        }
        store
    }

    /// Builder-style setter used when wiring a store by hand.
    #[must_use]
    pub fn with(self, key: ConfigKey, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Returns the value stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: ConfigKey) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&self, key: ConfigKey, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value.into());
    }

    /// Removes the value stored under `key`, returning it.
    pub fn unset(&self, key: ConfigKey) -> Option<String> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        let mut map = f.debug_map();
        for key in ConfigKey::ALL {
            if let Some(value) = values.get(&key) {
                if key.is_secret() {
                    map.entry(&key, &"[REDACTED]");
                } else {
                    map.entry(&key, value);
                }
            }
        }
        map.finish()
    }
}

/// Returns the event relay capacity from `EVENT_RELAY_CAPACITY`, falling
/// back to [`DEFAULT_EVENT_RELAY_CAPACITY`].
#[must_use]
pub fn event_relay_capacity() -> usize {
    parse_env("EVENT_RELAY_CAPACITY", DEFAULT_EVENT_RELAY_CAPACITY)
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
