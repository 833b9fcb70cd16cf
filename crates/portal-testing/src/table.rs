//! In-memory table store implementing `TablePort`.
//!
//! Assigns ids and timestamps the way the hosted store does, evaluates
//! equality filters and ordering, and lets a test inject one failure per
//! operation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use portal::domain::repository::{Filter, TablePort};
use portal::error::{Collaborator, PortalError, RemoteError};
use portal_core::serde::format_rfc3339_ms;
use portal_domain::id::RecordId;
use portal_domain::sort::{OrderBy, Sort};

/// Table operations, for counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableOp {
    Select,
    SelectSingle,
    Insert,
    Update,
    Delete,
    Upsert,
}

/// How an injected failure behaves.
#[derive(Debug, Clone)]
pub enum Fault {
    /// The store rejects the call and nothing changes.
    Reject(RemoteError),
    /// The write is applied but the caller receives an error (lost acknowledgment).
    CommitThenFail(RemoteError),
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Value>>,
    faults: HashMap<TableOp, Fault>,
    calls: HashMap<TableOp, usize>,
}

/// Shared handle; clones see the same rows.
#[derive(Clone, Default)]
pub struct MemoryTable {
    state: Arc<Mutex<State>>,
}

pub fn rejected(message: &str) -> RemoteError {
    RemoteError::new(Collaborator::Table, message)
        .with_code("42501")
        .with_status(403)
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `row` as-is, filling `id` and timestamps when absent.
    pub fn seed(&self, table: &str, row: Value) -> Value {
        let row = stamp_new(row);
        self.lock()
            .tables
            .entry(table.to_owned())
            .or_default()
            .push(row.clone());
        row
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// The next call of `op` fails with `fault`.
    pub fn fail_next(&self, op: TableOp, fault: Fault) {
        self.lock().faults.insert(op, fault);
    }

    pub fn calls(&self, op: TableOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count the call and run `apply`, honouring any injected fault.
    fn run<T>(
        &self,
        op: TableOp,
        apply: impl FnOnce(&mut State) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        let mut state = self.lock();
        *state.calls.entry(op).or_default() += 1;
        match state.faults.remove(&op) {
            Some(Fault::Reject(e)) => Err(e),
            Some(Fault::CommitThenFail(e)) => {
                let _ = apply(&mut *state);
                Err(e)
            }
            None => apply(&mut *state),
        }
    }

    /// Rows matching every `(column, value)` condition, optionally ordered.
    pub fn select_rows(
        &self,
        table: &str,
        conditions: &[(&str, &str)],
        order: Option<(&str, Sort)>,
    ) -> Result<Vec<Value>, RemoteError> {
        self.run(TableOp::Select, |state| {
            let mut rows: Vec<Value> = state
                .tables
                .get(table)
                .map(|rows| {
                    rows.iter()
                        .filter(|r| matches_all(r, conditions))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            if let Some((column, sort)) = order {
                rows.sort_by(|a, b| {
                    let ordering = sort_key(a, column).cmp(&sort_key(b, column));
                    match sort {
                        Sort::Asc => ordering,
                        Sort::Desc => ordering.reverse(),
                    }
                });
            }
            Ok(rows)
        })
    }

    /// Exactly one matching row, otherwise the store's "no rows" error.
    pub fn select_one(&self, table: &str, conditions: &[(&str, &str)]) -> Result<Value, RemoteError> {
        self.run(TableOp::SelectSingle, |state| {
            let matching: Vec<&Value> = state
                .tables
                .get(table)
                .map(|rows| {
                    rows.iter()
                        .filter(|r| matches_all(r, conditions))
                        .collect()
                })
                .unwrap_or_default();
            match matching.as_slice() {
                [row] => Ok((*row).clone()),
                _ => Err(RemoteError::no_rows()),
            }
        })
    }

    pub fn insert_row(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        self.run(TableOp::Insert, |state| {
            let row = stamp_new(row);
            state
                .tables
                .entry(table.to_owned())
                .or_default()
                .push(row.clone());
            Ok(row)
        })
    }

    pub fn update_row(&self, table: &str, id: &str, patch: Value) -> Result<Value, RemoteError> {
        self.run(TableOp::Update, |state| {
            let row = state
                .tables
                .get_mut(table)
                .and_then(|rows| rows.iter_mut().find(|r| r["id"] == id))
                .ok_or_else(RemoteError::no_rows)?;
            merge(row, patch);
            Ok(row.clone())
        })
    }

    pub fn delete_row(&self, table: &str, id: &str) -> Result<(), RemoteError> {
        self.run(TableOp::Delete, |state| {
            if let Some(rows) = state.tables.get_mut(table) {
                rows.retain(|r| r["id"] != id);
            }
            Ok(())
        })
    }

    pub fn upsert_row(
        &self,
        table: &str,
        row: Value,
        conflict_key: &str,
    ) -> Result<Value, RemoteError> {
        self.run(TableOp::Upsert, |state| {
            let rows = state.tables.entry(table.to_owned()).or_default();
            let key = row.get(conflict_key).cloned().unwrap_or(Value::Null);
            if let Some(existing) = rows
                .iter_mut()
                .find(|r| !key.is_null() && r.get(conflict_key) == Some(&key))
            {
                merge(existing, row);
                existing["updated_at"] = Value::String(format_rfc3339_ms(&Utc::now()));
                return Ok(existing.clone());
            }
            let row = stamp_new(row);
            rows.push(row.clone());
            Ok(row)
        })
    }
}

impl TablePort for MemoryTable {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<OrderBy>,
    ) -> Result<Vec<Value>, PortalError> {
        let order = order.map(|o| (o.column, o.sort));
        Ok(self.select_rows(table, &[(filter.column, filter.value.as_str())], order)?)
    }

    async fn select_single(&self, table: &str, filter: &Filter) -> Result<Value, PortalError> {
        Ok(self.select_one(table, &[(filter.column, filter.value.as_str())])?)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, PortalError> {
        Ok(self.insert_row(table, row)?)
    }

    async fn update(&self, table: &str, id: RecordId, patch: Value) -> Result<Value, PortalError> {
        Ok(self.update_row(table, &id.to_string(), patch)?)
    }

    async fn delete(&self, table: &str, id: RecordId) -> Result<(), PortalError> {
        Ok(self.delete_row(table, &id.to_string())?)
    }

    async fn upsert(
        &self,
        table: &str,
        row: Value,
        conflict_key: &str,
    ) -> Result<Value, PortalError> {
        Ok(self.upsert_row(table, row, conflict_key)?)
    }
}

fn stamp_new(row: Value) -> Value {
    let mut object = match row {
        Value::Object(object) => object,
        other => panic!("rows must be JSON objects, got {other}"),
    };
    let now = Value::String(format_rfc3339_ms(&Utc::now()));
    object
        .entry("id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    object.entry("created_at").or_insert_with(|| now.clone());
    object.entry("updated_at").or_insert(now);
    Value::Object(object)
}

fn merge(row: &mut Value, patch: Value) {
    let (Some(row), Value::Object(patch)) = (row.as_object_mut(), patch) else {
        return;
    };
    for (k, v) in patch {
        row.insert(k, v);
    }
}

fn matches_all(row: &Value, conditions: &[(&str, &str)]) -> bool {
    conditions.iter().all(|&(column, value)| match row.get(column) {
        Some(Value::String(s)) => s == value,
        Some(Value::Null) | None => false,
        Some(other) => other.to_string() == value,
    })
}

/// Text form of a column for ordering; dates and timestamps sort lexically.
fn sort_key(row: &Value, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
