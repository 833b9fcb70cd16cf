use bytes::Bytes;
use reqwest::Method;
use serde_json::json;

use crate::domain::repository::StoragePort;
use crate::error::{Collaborator, PortalError};
use crate::infra::http::{SupabaseHttp, send};

/// Object storage client for the backend's `/storage/v1` endpoints.
#[derive(Clone)]
pub struct StorageClient {
    http: SupabaseHttp,
}

impl StorageClient {
    pub fn new(http: SupabaseHttp) -> Self {
        Self { http }
    }
}

impl StoragePort for StorageClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
        overwrite: bool,
    ) -> Result<String, PortalError> {
        let url = self.http.url(&format!("storage/v1/object/{bucket}/{path}"))?;
        let request = self
            .http
            .request(Method::POST, url)
            .header("content-type", content_type)
            .header("x-upsert", if overwrite { "true" } else { "false" })
            .body(bytes);
        send(Collaborator::Storage, request).await?;
        Ok(path.to_owned())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}storage/v1/object/public/{bucket}/{path}",
            self.http.base()
        )
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), PortalError> {
        let url = self.http.url(&format!("storage/v1/object/{bucket}"))?;
        let request = self
            .http
            .request(Method::DELETE, url)
            .json(&json!({ "prefixes": paths }));
        send(Collaborator::Storage, request).await?;
        Ok(())
    }
}
