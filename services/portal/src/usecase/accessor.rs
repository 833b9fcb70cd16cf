//! Cached access to the per-user portal tables.
//!
//! An accessor is bound to one owner at construction and never changes owner.
//! The cache is replaced wholesale by fetches and patched from mutation
//! responses; a failed call leaves it exactly as it was. Writes whose
//! acknowledgment is lost are not reconciled until the next fetch.

use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Context as _;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use portal_core::serde::format_rfc3339_ms;
use portal_domain::id::{RecordId, UserId};

use crate::domain::repository::{Filter, TablePort};
use crate::domain::types::{
    DutyAssignment, EmployeePass, EmployeeProfile, FamilyMember, HealthRecord, InsertPosition,
    Record, Upsert, expiring_soon,
};
use crate::error::PortalError;

pub type PassAccessor<P> = RecordAccessor<EmployeePass, P>;
pub type FamilyAccessor<P> = RecordAccessor<FamilyMember, P>;
pub type DutyAccessor<P> = RecordAccessor<DutyAssignment, P>;
pub type ProfileAccessor<P> = SingleRecordAccessor<EmployeeProfile, P>;
pub type HealthAccessor<P> = SingleRecordAccessor<HealthRecord, P>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn decode<T: Record>(row: Value) -> Result<T, PortalError> {
    let row = serde_json::from_value(row)
        .with_context(|| format!("decode {} row", T::TABLE.name))?;
    Ok(row)
}

/// Serialize an insert payload and stamp it with its owner.
fn owned_row<B: Serialize>(owner: UserId, body: &B) -> Result<Value, PortalError> {
    let mut row = serde_json::to_value(body).context("encode row")?;
    let object = row
        .as_object_mut()
        .context("row payload must serialize to a JSON object")?;
    object.insert("user_id".to_owned(), Value::String(owner.to_string()));
    Ok(row)
}

/// Serialize a partial update and stamp its modification time.
fn stamped_patch<B: Serialize>(patch: &B) -> Result<Value, PortalError> {
    let mut value = serde_json::to_value(patch).context("encode patch")?;
    let object = value
        .as_object_mut()
        .context("patch payload must serialize to a JSON object")?;
    object.insert(
        "updated_at".to_owned(),
        Value::String(format_rfc3339_ms(&Utc::now())),
    );
    Ok(value)
}

// ── Collection accessor ──────────────────────────────────────────────────────

/// Cached rows of one many-per-owner table (passes, family members, duties).
pub struct RecordAccessor<T: Record, P: TablePort> {
    table: P,
    owner: UserId,
    cache: Mutex<Vec<T>>,
}

impl<T: Record, P: TablePort> RecordAccessor<T, P> {
    pub fn new(table: P, owner: UserId) -> Self {
        Self {
            table,
            owner,
            cache: Mutex::new(Vec::new()),
        }
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    /// Snapshot of the cached rows, in cache order.
    pub fn rows(&self) -> Vec<T> {
        lock(&self.cache).clone()
    }

    /// Fetch the owner's rows in the table's order and replace the cache with them.
    pub async fn fetch_all(&self) -> Result<Vec<T>, PortalError> {
        let config = T::TABLE;
        let rows = self
            .table
            .select(config.name, &Filter::owner(self.owner), config.order)
            .await?;
        let rows = rows
            .into_iter()
            .map(decode::<T>)
            .collect::<Result<Vec<_>, _>>()?;
        *lock(&self.cache) = rows.clone();
        debug!(table = config.name, count = rows.len(), "cache replaced");
        Ok(rows)
    }

    pub async fn add(&self, new: T::New) -> Result<T, PortalError> {
        let config = T::TABLE;
        let row = owned_row(self.owner, &new)?;
        let created: T = decode(self.table.insert(config.name, row).await?)?;
        {
            let mut cache = lock(&self.cache);
            match config.insert_at {
                InsertPosition::Prepend => cache.insert(0, created.clone()),
                InsertPosition::Append => cache.push(created.clone()),
            }
        }
        debug!(table = config.name, id = %created.id(), "row added");
        Ok(created)
    }

    pub async fn update(&self, id: RecordId, patch: T::Patch) -> Result<T, PortalError> {
        let config = T::TABLE;
        let patch = stamped_patch(&patch)?;
        let updated: T = decode(self.table.update(config.name, id, patch).await?)?;
        for row in lock(&self.cache).iter_mut().filter(|r| r.id() == id) {
            *row = updated.clone();
        }
        debug!(table = config.name, %id, "row updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: RecordId) -> Result<(), PortalError> {
        let config = T::TABLE;
        self.table.delete(config.name, id).await?;
        lock(&self.cache).retain(|r| r.id() != id);
        debug!(table = config.name, %id, "row deleted");
        Ok(())
    }
}

impl<P: TablePort> RecordAccessor<EmployeePass, P> {
    /// Active passes expiring within the warning window, recomputed from the cache.
    pub fn expiring_soon(&self) -> Vec<EmployeePass> {
        expiring_soon(&lock(&self.cache), Utc::now())
    }
}

// ── Single-row accessor ──────────────────────────────────────────────────────

/// Cached row of a zero-or-one-per-owner table (profile, health record).
pub struct SingleRecordAccessor<T: Record, P: TablePort> {
    table: P,
    owner: UserId,
    slot: Mutex<Option<T>>,
}

impl<T: Record, P: TablePort> SingleRecordAccessor<T, P> {
    pub fn new(table: P, owner: UserId) -> Self {
        Self {
            table,
            owner,
            slot: Mutex::new(None),
        }
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn current(&self) -> Option<T> {
        lock(&self.slot).clone()
    }

    /// Fetch the owner's row. "No matching row" is `Ok(None)`; other errors propagate.
    pub async fn fetch(&self) -> Result<Option<T>, PortalError> {
        let config = T::TABLE;
        let row = match self
            .table
            .select_single(config.name, &Filter::owner(self.owner))
            .await
        {
            Ok(row) => Some(decode::<T>(row)?),
            Err(e) if e.is_no_rows() => None,
            Err(e) => return Err(e),
        };
        *lock(&self.slot) = row.clone();
        debug!(table = config.name, present = row.is_some(), "slot replaced");
        Ok(row)
    }

    pub async fn insert(&self, new: T::New) -> Result<T, PortalError> {
        let config = T::TABLE;
        let row = owned_row(self.owner, &new)?;
        let created: T = decode(self.table.insert(config.name, row).await?)?;
        *lock(&self.slot) = Some(created.clone());
        debug!(table = config.name, id = %created.id(), "row inserted");
        Ok(created)
    }

    /// Partial update. The slot is replaced when it is empty or holds the same row.
    pub async fn update(&self, id: RecordId, patch: T::Patch) -> Result<T, PortalError> {
        let config = T::TABLE;
        let patch = stamped_patch(&patch)?;
        let updated: T = decode(self.table.update(config.name, id, patch).await?)?;
        {
            let mut slot = lock(&self.slot);
            let replace = match slot.as_ref() {
                Some(current) => current.id() == id,
                None => updated.owner() == self.owner,
            };
            if replace {
                *slot = Some(updated.clone());
            }
        }
        debug!(table = config.name, %id, "row updated");
        Ok(updated)
    }
}

impl<T: Upsert, P: TablePort> SingleRecordAccessor<T, P> {
    /// Insert or replace the owner's row, keyed on the record's conflict column.
    pub async fn upsert(&self, input: T::Input) -> Result<T, PortalError> {
        let config = T::TABLE;
        let row = owned_row(self.owner, &input)?;
        let stored: T = decode(
            self.table
                .upsert(config.name, row, T::CONFLICT_KEY)
                .await?,
        )?;
        *lock(&self.slot) = Some(stored.clone());
        debug!(table = config.name, id = %stored.id(), "row upserted");
        Ok(stored)
    }
}
