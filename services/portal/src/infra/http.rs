use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Context as _;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::error;

use crate::error::{Collaborator, PortalError, RemoteError};

/// Shared transport for the hosted backend: one connection pool, the public
/// API key and the bearer token of the current session.
///
/// Cloning is cheap; clones see the same token.
#[derive(Clone)]
pub struct SupabaseHttp {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    base: Url,
    anon_key: String,
    token: RwLock<Option<String>>,
}

impl SupabaseHttp {
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> Result<Self, PortalError> {
        let mut base = Url::parse(base_url).with_context(|| format!("parse backend url {base_url:?}"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("portal/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                base,
                anon_key: anon_key.into(),
                token: RwLock::new(None),
            }),
        })
    }

    pub fn base(&self) -> &Url {
        &self.inner.base
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Resolve `path` (no leading slash) against the base URL.
    pub fn url(&self, path: &str) -> Result<Url, PortalError> {
        let url = self
            .inner
            .base
            .join(path)
            .with_context(|| format!("join backend path {path:?}"))?;
        Ok(url)
    }

    /// Request carrying the API key and the session token (the API key when signed out).
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self.token().unwrap_or_else(|| self.inner.anon_key.clone());
        self.inner
            .client
            .request(method, url)
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(bearer)
    }
}

/// Send and fail with the backend's own error unless the status is a success.
pub async fn send(origin: Collaborator, request: RequestBuilder) -> Result<Response, PortalError> {
    let response = request
        .send()
        .await
        .with_context(|| format!("{} request", origin.as_str()))?;
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(remote_error(origin, response).await)
    }
}

pub async fn send_json<T: DeserializeOwned>(
    origin: Collaborator,
    request: RequestBuilder,
) -> Result<T, PortalError> {
    let response = send(origin, request).await?;
    let body = response
        .json()
        .await
        .with_context(|| format!("decode {} response", origin.as_str()))?;
    Ok(body)
}

/// Build a [`RemoteError`] from a failed response.
///
/// The code comes from `error_code`, `code` or `error`; the message from
/// `message`, `msg`, `error_description` or `error`. Without a JSON body the
/// status reason is used.
pub async fn remote_error(origin: Collaborator, response: Response) -> PortalError {
    let status = response.status();
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            error!(origin = origin.as_str(), error = %e, "failed to read error body");
            String::new()
        }
    };
    let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
    let field = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| body.get(*k).and_then(Value::as_str))
            .map(str::to_owned)
    };

    let message = field(&["message", "msg", "error_description", "error"])
        .or_else(|| Some(text.trim().to_owned()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_owned());
    let mut err = RemoteError::new(origin, message).with_status(status.as_u16());
    if let Some(code) = field(&["error_code", "code", "error"]) {
        err = err.with_code(code);
    }
    err.into()
}
