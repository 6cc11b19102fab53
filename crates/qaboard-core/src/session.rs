//! Session management: sign-in, sign-out and the ambient auth listener.
//!
//! The identity provider's listener is the only source of truth for who is
//! signed in. `SessionManager::sign_in` runs the popup flow and returns the
//! user's profile, but never reports a status on its own; the status follows
//! once the provider publishes the new session.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qaboard_store::{DocumentData, DocumentStore, StorageError};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, instrument};

use crate::background::BackgroundTasks;
use crate::domain::{collections, fields, BoardResult, Identity, User};
use crate::metrics::METRICS;

/// Result of a completed popup sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInOutcome {
    pub identity: Identity,
    /// The provider saw this account for the first time.
    pub is_new_user: bool,
}

/// Third-party identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Run the interactive sign-in flow.
    async fn sign_in_with_popup(&self) -> BoardResult<SignInOutcome>;

    /// End the current session.
    async fn sign_out(&self) -> BoardResult<()>;

    /// Ambient session listener. A new receiver sees the current session
    /// first, then every change.
    fn watch(&self) -> watch::Receiver<Option<Identity>>;
}

/// Build the `Users` record written on first sign-in.
pub fn users_record(identity: &Identity, created_at: DateTime<Utc>) -> DocumentData {
    let mut data = DocumentData::new();
    data.insert(fields::UID.to_string(), Value::from(identity.uid.clone()));
    data.insert(
        fields::DISPLAY_NAME.to_string(),
        Value::from(identity.user.display_name.clone()),
    );
    data.insert(
        fields::PHOTO_URL.to_string(),
        Value::from(identity.user.photo_url.clone()),
    );
    data.insert(
        fields::CREATED_AT.to_string(),
        Value::from(created_at.to_rfc3339()),
    );
    data
}

/// Owns the provider, the single auth listener and user provisioning.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    background: Arc<BackgroundTasks>,
    listener: Mutex<Option<AbortHandle>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("background", &self.background)
            .field("listening", &self.listener().is_some())
            .finish()
    }
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            provider,
            store,
            background: Arc::new(BackgroundTasks::new()),
            listener: Mutex::new(None),
        }
    }

    /// Share an existing task set instead of owning a fresh one.
    pub fn with_background(mut self, background: Arc<BackgroundTasks>) -> Self {
        self.background = background;
        self
    }

    pub fn background(&self) -> &Arc<BackgroundTasks> {
        &self.background
    }

    fn listener(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run the popup flow and return the signed-in profile.
    ///
    /// A first-time user gets a `Users` record written in the background;
    /// a failed write is logged and does not fail the sign-in.
    #[instrument(skip(self))]
    pub async fn sign_in(&self) -> BoardResult<User> {
        let SignInOutcome {
            identity,
            is_new_user,
        } = self.provider.sign_in_with_popup().await?;
        if is_new_user {
            self.provision(&identity);
        }
        Ok(identity.user)
    }

    fn provision(&self, identity: &Identity) {
        let store = Arc::clone(&self.store);
        let record = users_record(identity, Utc::now());
        let uid = identity.uid.clone();
        self.background.spawn("users.provision", async move {
            store.add_document(collections::USERS, record).await?;
            METRICS.inc_users_provisioned();
            debug!(event = "users.provisioned", uid = %uid);
            Ok::<(), StorageError>(())
        });
    }

    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> BoardResult<()> {
        self.provider.sign_out().await
    }

    /// Register the auth listener.
    ///
    /// `callback` runs once right away with the current session, then once
    /// per change. Only one listener is active: registering again stops the
    /// previous one.
    pub fn on_auth_state_changed<F>(&self, mut callback: F) -> AuthSubscription
    where
        F: FnMut(Option<Identity>) + Send + 'static,
    {
        let mut session = self.provider.watch();
        let current = session.borrow_and_update().clone();
        callback(current);

        let task = tokio::spawn(async move {
            while session.changed().await.is_ok() {
                let next = session.borrow_and_update().clone();
                callback(next);
            }
        });
        let handle = task.abort_handle();
        if let Some(previous) = self.listener().replace(handle.clone()) {
            previous.abort();
        }
        AuthSubscription { handle }
    }
}

/// Handle to the registered auth listener. Dropping it stops delivery.
#[derive(Debug)]
pub struct AuthSubscription {
    handle: AbortHandle,
}

impl AuthSubscription {
    /// Stop delivery. Dropping the subscription has the same effect.
    pub fn unsubscribe(&self) {
        self.handle.abort();
    }

    /// The listener task is still running.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
