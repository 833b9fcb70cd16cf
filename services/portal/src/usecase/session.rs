use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{info, warn};

use crate::domain::repository::AuthPort;
use crate::domain::types::{Identity, Metadata, SignUp};
use crate::error::PortalError;

/// Session state as observed by dependents.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Not yet resolved against the auth provider.
    Unknown,
    Anonymous,
    Authenticated(Identity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Tracks who is signed in and publishes every change on a watch channel.
///
/// Errors from the auth provider are returned unmodified and never retried.
pub struct SessionProvider<A: AuthPort> {
    auth: A,
    state: watch::Sender<SessionState>,
    /// Bumped on every transition, so signing back in as the same user is a new session.
    epoch: AtomicU64,
}

impl<A: AuthPort> SessionProvider<A> {
    pub fn new(auth: A) -> Self {
        Self {
            auth,
            state: watch::Sender::new(SessionState::Unknown),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    /// Number of state transitions so far.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// The epoch and identity, read under one borrow of the state.
    pub fn snapshot(&self) -> (u64, Option<Identity>) {
        let state = self.state.borrow();
        (self.epoch(), state.identity().cloned())
    }

    /// True only while the initial state has not been resolved.
    pub fn is_loading(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Unknown)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Resolve the initial state from the provider's stored session.
    ///
    /// A failure still leaves the provider resolved, as signed out.
    pub async fn restore(&self) -> Result<Option<Identity>, PortalError> {
        match self.auth.current_identity().await {
            Ok(Some(identity)) => {
                info!(user_id = %identity.id, "session restored");
                self.set(SessionState::Authenticated(identity.clone()));
                Ok(Some(identity))
            }
            Ok(None) => {
                self.set(SessionState::Anonymous);
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "session restore failed");
                self.resolve_unknown();
                Err(e)
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, PortalError> {
        let identity = self.auth.sign_in(email, password).await?;
        info!(user_id = %identity.id, "signed in");
        self.set(SessionState::Authenticated(identity.clone()));
        Ok(identity)
    }

    /// Register a new account. When the provider holds back the session until
    /// the email is confirmed, the state stays (or becomes) anonymous.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Metadata,
    ) -> Result<SignUp, PortalError> {
        let outcome = self.auth.sign_up(email, password, metadata).await?;
        match &outcome {
            SignUp::SignedIn(identity) => {
                info!(user_id = %identity.id, "signed up");
                self.set(SessionState::Authenticated(identity.clone()));
            }
            SignUp::ConfirmationPending(identity) => {
                info!(user_id = %identity.id, "signed up, confirmation pending");
                self.resolve_unknown();
            }
        }
        Ok(outcome)
    }

    pub async fn sign_out(&self) -> Result<(), PortalError> {
        self.auth.sign_out().await?;
        info!("signed out");
        self.set(SessionState::Anonymous);
        Ok(())
    }

    fn set(&self, next: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            self.epoch.fetch_add(1, Ordering::AcqRel);
            true
        });
    }

    fn resolve_unknown(&self) {
        self.state.send_if_modified(|current| {
            if matches!(current, SessionState::Unknown) {
                *current = SessionState::Anonymous;
                self.epoch.fetch_add(1, Ordering::AcqRel);
                true
            } else {
                false
            }
        });
    }
}
