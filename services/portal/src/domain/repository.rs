#![allow(async_fn_in_trait)]

use bytes::Bytes;
use serde_json::Value;

use portal_domain::id::{RecordId, UserId};
use portal_domain::sort::OrderBy;

use crate::domain::types::{Identity, Metadata, SignUp};
use crate::error::PortalError;

/// Equality filter on one column (`column = value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: &'static str,
    pub value: String,
}

impl Filter {
    pub fn eq(column: &'static str, value: impl ToString) -> Self {
        Self {
            column,
            value: value.to_string(),
        }
    }

    /// Rows owned by `user_id`.
    pub fn owner(user_id: UserId) -> Self {
        Self::eq("user_id", user_id)
    }

    /// Whether a JSON row satisfies this filter.
    pub fn matches(&self, row: &Value) -> bool {
        match row.get(self.column) {
            Some(Value::String(s)) => *s == self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// Port for the remote authentication provider.
///
/// Errors are returned as the provider reported them; callers surface them unmodified.
pub trait AuthPort: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Metadata,
    ) -> Result<SignUp, PortalError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, PortalError>;

    async fn sign_out(&self) -> Result<(), PortalError>;

    /// Identity of the session the provider currently holds, if any.
    async fn current_identity(&self) -> Result<Option<Identity>, PortalError>;
}

/// Port for the remote relational store. Rows travel as JSON objects.
pub trait TablePort: Send + Sync {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<OrderBy>,
    ) -> Result<Vec<Value>, PortalError>;

    /// Exactly one matching row. Zero rows fail with the `PGRST116` kind.
    async fn select_single(&self, table: &str, filter: &Filter) -> Result<Value, PortalError>;

    /// Insert and return the stored row, with server-assigned id and timestamps.
    async fn insert(&self, table: &str, row: Value) -> Result<Value, PortalError>;

    async fn update(&self, table: &str, id: RecordId, patch: Value) -> Result<Value, PortalError>;

    async fn delete(&self, table: &str, id: RecordId) -> Result<(), PortalError>;

    /// Insert, or replace the row whose `conflict_key` column matches.
    async fn upsert(
        &self,
        table: &str,
        row: Value,
        conflict_key: &str,
    ) -> Result<Value, PortalError>;
}

// Accessors for one identity share a single table client.
impl<T: TablePort + ?Sized> TablePort for &T {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<OrderBy>,
    ) -> Result<Vec<Value>, PortalError> {
        (**self).select(table, filter, order).await
    }

    async fn select_single(&self, table: &str, filter: &Filter) -> Result<Value, PortalError> {
        (**self).select_single(table, filter).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, PortalError> {
        (**self).insert(table, row).await
    }

    async fn update(&self, table: &str, id: RecordId, patch: Value) -> Result<Value, PortalError> {
        (**self).update(table, id, patch).await
    }

    async fn delete(&self, table: &str, id: RecordId) -> Result<(), PortalError> {
        (**self).delete(table, id).await
    }

    async fn upsert(
        &self,
        table: &str,
        row: Value,
        conflict_key: &str,
    ) -> Result<Value, PortalError> {
        (**self).upsert(table, row, conflict_key).await
    }
}

/// Port for the remote object store.
pub trait StoragePort: Send + Sync {
    /// Store `bytes` at `path` and return the stored path.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
        overwrite: bool,
    ) -> Result<String, PortalError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), PortalError>;
}
