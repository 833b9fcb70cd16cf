use anyhow::Context as _;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::repository::AuthPort;
use crate::domain::types::{Identity, Metadata, SignUp};
use crate::error::{Collaborator, PortalError};
use crate::infra::http::{SupabaseHttp, remote_error, send, send_json};

/// Session returned by the token and signup endpoints.
#[derive(Debug, Deserialize)]
struct SessionBody {
    access_token: String,
    user: Identity,
}

/// Auth client for the backend's `/auth/v1` endpoints.
///
/// The access token of a successful sign-in is stored on the shared transport,
/// so table and storage clients built on the same [`SupabaseHttp`] act as the user.
#[derive(Clone)]
pub struct GoTrueAuthClient {
    http: SupabaseHttp,
}

impl GoTrueAuthClient {
    pub fn new(http: SupabaseHttp) -> Self {
        Self { http }
    }

    /// Resume a session from a previously issued access token.
    pub fn with_access_token(self, token: impl Into<String>) -> Self {
        self.http.set_token(Some(token.into()));
        self
    }

    fn open(&self, session: SessionBody) -> Identity {
        self.http.set_token(Some(session.access_token));
        session.user
    }
}

impl AuthPort for GoTrueAuthClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Metadata,
    ) -> Result<SignUp, PortalError> {
        let url = self.http.url("auth/v1/signup")?;
        let request = self
            .http
            .request(Method::POST, url)
            .json(&json!({ "email": email, "password": password, "data": metadata }));
        let body: Value = send_json(Collaborator::Auth, request).await?;

        // With email confirmation enabled the body is the bare user, no session.
        if body.get("access_token").is_some() {
            let session: SessionBody = serde_json::from_value(body)
                .context("decode signup session")?;
            return Ok(SignUp::SignedIn(self.open(session)));
        }
        let user = body.get("user").cloned().unwrap_or(body);
        let identity: Identity = serde_json::from_value(user)
            .context("decode signup user")?;
        debug!(user_id = %identity.id, "signup awaiting confirmation");
        Ok(SignUp::ConfirmationPending(identity))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, PortalError> {
        let mut url = self.http.url("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let request = self
            .http
            .request(Method::POST, url)
            .json(&json!({ "email": email, "password": password }));
        let session: SessionBody = send_json(Collaborator::Auth, request).await?;
        Ok(self.open(session))
    }

    async fn sign_out(&self) -> Result<(), PortalError> {
        if self.http.token().is_none() {
            return Ok(());
        }
        let url = self.http.url("auth/v1/logout")?;
        send(Collaborator::Auth, self.http.request(Method::POST, url)).await?;
        self.http.set_token(None);
        Ok(())
    }

    async fn current_identity(&self) -> Result<Option<Identity>, PortalError> {
        if self.http.token().is_none() {
            return Ok(None);
        }
        let url = self.http.url("auth/v1/user")?;
        let response = self
            .http
            .request(Method::GET, url)
            .send()
            .await
            .context("auth request")?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("stored session rejected");
                self.http.set_token(None);
                Ok(None)
            }
            status if status.is_success() => {
                let identity = response
                    .json()
                    .await
                    .context("decode auth user")?;
                Ok(Some(identity))
            }
            _ => Err(remote_error(Collaborator::Auth, response).await),
        }
    }
}
