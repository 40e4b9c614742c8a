//! Session credential resolution.
//!
//! The connection layer never authenticates on its own: it asks a
//! [`CurrentUserProvider`] for the logged-in user and presents that user's
//! session token when connecting and subscribing.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;

use crate::error::LiveQueryError;

/// An authenticated user as seen by the connection layer.
#[derive(Clone)]
pub struct User {
    object_id: String,
    session_token: Option<SecretString>,
}

impl User {
    /// Creates a user with a session token.
    pub fn new(object_id: impl Into<String>, session_token: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            session_token: Some(SecretString::new(session_token.into())),
        }
    }

    /// Creates a user that has no session token (e.g. not yet saved).
    pub fn without_session(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            session_token: None,
        }
    }

    /// Object id of the user.
    #[must_use]
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// Session token of the user, if any.
    #[must_use]
    pub const fn session_token(&self) -> Option<&SecretString> {
        self.session_token.as_ref()
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("object_id", &self.object_id)
            .field("has_session_token", &self.session_token.is_some())
            .finish()
    }
}

/// Source of the currently authenticated user.
#[async_trait]
pub trait CurrentUserProvider: Send + Sync + fmt::Debug {
    /// Returns the current user, or `None` when nobody is logged in.
    ///
    /// # Errors
    ///
    /// Returns [`LiveQueryError::Credential`] if the lookup itself fails.
    async fn current_user(&self) -> Result<Option<User>, LiveQueryError>;
}

/// Provider for applications without user accounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousUser;

#[async_trait]
impl CurrentUserProvider for AnonymousUser {
    async fn current_user(&self) -> Result<Option<User>, LiveQueryError> {
        Ok(None)
    }
}

/// In-memory current-user holder updated on login and logout.
#[derive(Debug, Default)]
pub struct SessionStore {
    user: RwLock<Option<User>>,
}

impl SessionStore {
    /// Creates a store with nobody logged in.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current user.
    pub async fn set_current_user(&self, user: User) {
        tracing::debug!(object_id = user.object_id(), "current user changed");
        *self.user.write().await = Some(user);
    }

    /// Logs the current user out.
    pub async fn clear(&self) {
        *self.user.write().await = None;
    }
}

#[async_trait]
impl CurrentUserProvider for SessionStore {
    async fn current_user(&self) -> Result<Option<User>, LiveQueryError> {
        Ok(self.user.read().await.clone())
    }
}

/// Resolves the session token to present to the real-time server.
#[derive(Debug, Clone)]
pub struct SessionResolver {
    users: Arc<dyn CurrentUserProvider>,
}

impl SessionResolver {
    /// Creates a resolver backed by `users`.
    #[must_use]
    pub fn new(users: Arc<dyn CurrentUserProvider>) -> Self {
        Self { users }
    }

    /// Returns the current user's session token.
    ///
    /// Anonymous access (no user, or a user with an empty token) yields
    /// `None`.
    ///
    /// # Errors
    ///
    /// Propagates the provider's error when the user lookup fails.
    pub async fn resolve(&self) -> Result<Option<SecretString>, LiveQueryError> {
        let user = self.users.current_user().await?;
        Ok(user
            .and_then(|user| user.session_token)
            .filter(|token| !token.expose_secret().is_empty()))
    }
}
