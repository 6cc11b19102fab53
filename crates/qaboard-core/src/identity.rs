//! In-process identity provider.
//!
//! Stands in for a hosted popup sign-in: the profile is fixed at
//! construction and the session is published through a `watch` channel.
//! Used by the CLI and by tests, which can script failures and a provider
//! that never confirms the sign-in through its listener.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::{BoardError, BoardResult, Identity};
use crate::session::{IdentityProvider, SignInOutcome};

pub struct LocalIdentityProvider {
    profile: Identity,
    session: watch::Sender<Option<Identity>>,
    first_time: AtomicBool,
    confirm_sign_in: AtomicBool,
    failure: Mutex<Option<String>>,
    popups: AtomicUsize,
}

impl std::fmt::Debug for LocalIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalIdentityProvider")
            .field("uid", &self.profile.uid)
            .field("signed_in", &self.session.borrow().is_some())
            .field("popups", &self.popups())
            .finish()
    }
}

impl LocalIdentityProvider {
    /// Provider for an account that has never signed in, with no session.
    pub fn new(profile: Identity) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            profile,
            session,
            first_time: AtomicBool::new(true),
            confirm_sign_in: AtomicBool::new(true),
            failure: Mutex::new(None),
            popups: AtomicUsize::new(0),
        }
    }

    /// The account has signed in before.
    pub fn returning(self) -> Self {
        self.first_time.store(false, Ordering::SeqCst);
        self
    }

    /// Start with the account already signed in (a restored session).
    pub fn with_existing_session(self) -> Self {
        self.session.send_replace(Some(self.profile.clone()));
        self.returning()
    }

    /// Sign-ins succeed but the listener never reports them.
    pub fn unconfirmed(self) -> Self {
        self.confirm_sign_in.store(false, Ordering::SeqCst);
        self
    }

    /// Make the next popup fail with `message`.
    pub fn fail_next_sign_in(&self, message: impl Into<String>) {
        *self
            .failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(message.into());
    }

    /// Publish a session change from outside the popup flow (expiry,
    /// another tab).
    pub fn set_session(&self, identity: Option<Identity>) {
        self.session.send_replace(identity);
    }

    pub fn profile(&self) -> &Identity {
        &self.profile
    }

    /// Number of popup flows started.
    pub fn popups(&self) -> usize {
        self.popups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in_with_popup(&self) -> BoardResult<SignInOutcome> {
        self.popups.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(message) = failure {
            return Err(BoardError::Identity(message));
        }

        let is_new_user = self.first_time.swap(false, Ordering::SeqCst);
        if self.confirm_sign_in.load(Ordering::SeqCst) {
            self.session.send_replace(Some(self.profile.clone()));
        }
        Ok(SignInOutcome {
            identity: self.profile.clone(),
            is_new_user,
        })
    }

    async fn sign_out(&self) -> BoardResult<()> {
        self.session.send_replace(None);
        Ok(())
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.session.subscribe()
    }
}
