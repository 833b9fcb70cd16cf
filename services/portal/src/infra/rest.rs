use reqwest::{Method, Url};
use serde_json::Value;
use tracing::debug;

use portal_domain::id::RecordId;
use portal_domain::sort::OrderBy;

use crate::domain::repository::{Filter, TablePort};
use crate::error::{Collaborator, PortalError};
use crate::infra::http::{SupabaseHttp, send, send_json};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_ROW: &str = "return=representation";

/// Table client for the backend's REST interface (`/rest/v1/{table}`).
#[derive(Clone)]
pub struct RestTableClient {
    http: SupabaseHttp,
}

impl RestTableClient {
    pub fn new(http: SupabaseHttp) -> Self {
        Self { http }
    }

    fn table_url(&self, table: &str) -> Result<Url, PortalError> {
        self.http.url(&format!("rest/v1/{table}"))
    }

    fn filtered_url(&self, table: &str, filter: &Filter) -> Result<Url, PortalError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair(filter.column, &format!("eq.{}", filter.value));
        Ok(url)
    }

    fn row_url(&self, table: &str, id: RecordId) -> Result<Url, PortalError> {
        self.filtered_url(table, &Filter::eq("id", id))
    }
}

impl TablePort for RestTableClient {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<OrderBy>,
    ) -> Result<Vec<Value>, PortalError> {
        let mut url = self.filtered_url(table, filter)?;
        if let Some(order) = order {
            url.query_pairs_mut()
                .append_pair("order", &format!("{}.{}", order.column, order.sort.as_str()));
        }
        debug!(table, "select");
        send_json(Collaborator::Table, self.http.request(Method::GET, url)).await
    }

    async fn select_single(&self, table: &str, filter: &Filter) -> Result<Value, PortalError> {
        let url = self.filtered_url(table, filter)?;
        debug!(table, "select single");
        let request = self
            .http
            .request(Method::GET, url)
            .header("accept", SINGLE_OBJECT);
        send_json(Collaborator::Table, request).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, PortalError> {
        let url = self.table_url(table)?;
        let request = self
            .http
            .request(Method::POST, url)
            .header("accept", SINGLE_OBJECT)
            .header("prefer", RETURN_ROW)
            .json(&row);
        send_json(Collaborator::Table, request).await
    }

    async fn update(&self, table: &str, id: RecordId, patch: Value) -> Result<Value, PortalError> {
        let url = self.row_url(table, id)?;
        let request = self
            .http
            .request(Method::PATCH, url)
            .header("accept", SINGLE_OBJECT)
            .header("prefer", RETURN_ROW)
            .json(&patch);
        send_json(Collaborator::Table, request).await
    }

    async fn delete(&self, table: &str, id: RecordId) -> Result<(), PortalError> {
        let url = self.row_url(table, id)?;
        send(Collaborator::Table, self.http.request(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn upsert(
        &self,
        table: &str,
        row: Value,
        conflict_key: &str,
    ) -> Result<Value, PortalError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("on_conflict", conflict_key);
        let request = self
            .http
            .request(Method::POST, url)
            .header("accept", SINGLE_OBJECT)
            .header("prefer", format!("resolution=merge-duplicates,{RETURN_ROW}"))
            .json(&row);
        send_json(Collaborator::Table, request).await
    }
}
