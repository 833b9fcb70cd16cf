//! In-memory auth provider implementing `AuthPort`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use portal::domain::repository::AuthPort;
use portal::domain::types::{Identity, Metadata, SignUp};
use portal::error::{Collaborator, PortalError, RemoteError};
use portal_domain::id::UserId;

struct Account {
    password: String,
    identity: Identity,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    session: Option<Identity>,
    confirm_email: bool,
    fail_next: Option<RemoteError>,
    calls: usize,
}

/// Shared handle; clones see the same accounts and session.
#[derive(Clone, Default)]
pub struct MemoryAuth {
    state: Arc<Mutex<State>>,
}

pub fn invalid_credentials() -> RemoteError {
    RemoteError::new(Collaborator::Auth, "Invalid login credentials")
        .with_code("invalid_credentials")
        .with_status(400)
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign-ups return no session until the email is confirmed.
    pub fn require_email_confirmation(self) -> Self {
        self.lock().confirm_email = true;
        self
    }

    /// Register an account directly and return its identity.
    pub fn register(&self, email: &str, password: &str, metadata: Metadata) -> Identity {
        let identity = Identity {
            id: UserId(Uuid::new_v4()),
            email: Some(email.to_owned()),
            metadata,
        };
        self.lock().accounts.insert(
            email.to_owned(),
            Account {
                password: password.to_owned(),
                identity: identity.clone(),
            },
        );
        identity
    }

    /// Pretend a session was persisted by an earlier run.
    pub fn resume(&self, identity: Identity) {
        self.lock().session = Some(identity);
    }

    pub fn fail_next(&self, error: RemoteError) {
        self.lock().fail_next = Some(error);
    }

    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(&self) -> Result<std::sync::MutexGuard<'_, State>, PortalError> {
        let mut state = self.lock();
        state.calls += 1;
        match state.fail_next.take() {
            Some(e) => Err(e.into()),
            None => Ok(state),
        }
    }
}

impl AuthPort for MemoryAuth {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Metadata,
    ) -> Result<SignUp, PortalError> {
        let confirm = {
            let state = self.begin()?;
            if state.accounts.contains_key(email) {
                return Err(RemoteError::new(Collaborator::Auth, "User already registered")
                    .with_code("user_already_exists")
                    .with_status(422)
                    .into());
            }
            state.confirm_email
        };
        let identity = self.register(email, password, metadata);
        if confirm {
            return Ok(SignUp::ConfirmationPending(identity));
        }
        self.lock().session = Some(identity.clone());
        Ok(SignUp::SignedIn(identity))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, PortalError> {
        let mut state = self.begin()?;
        let identity = match state.accounts.get(email) {
            Some(account) if account.password == password => account.identity.clone(),
            _ => return Err(invalid_credentials().into()),
        };
        state.session = Some(identity.clone());
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), PortalError> {
        self.begin()?.session = None;
        Ok(())
    }

    async fn current_identity(&self) -> Result<Option<Identity>, PortalError> {
        Ok(self.begin()?.session.clone())
    }
}
