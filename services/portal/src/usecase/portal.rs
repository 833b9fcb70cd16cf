use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::domain::repository::{AuthPort, TablePort};
use crate::domain::types::Identity;
use crate::error::PortalError;
use crate::usecase::accessor::{
    DutyAccessor, FamilyAccessor, HealthAccessor, PassAccessor, ProfileAccessor,
};
use crate::usecase::bootstrap::{ProfileBootstrap, ProfileStatus};
use crate::usecase::session::SessionProvider;

/// Every accessor for one signed-in identity.
pub struct EmployeeRecords<P: TablePort> {
    identity: Identity,
    pub profile: ProfileAccessor<P>,
    pub passes: PassAccessor<P>,
    pub health: HealthAccessor<P>,
    pub family: FamilyAccessor<P>,
    pub duties: DutyAccessor<P>,
    bootstrap: ProfileBootstrap,
}

impl<P: TablePort + Clone> EmployeeRecords<P> {
    pub fn new(table: P, identity: Identity) -> Self {
        let owner = identity.id;
        Self {
            profile: ProfileAccessor::new(table.clone(), owner),
            passes: PassAccessor::new(table.clone(), owner),
            health: HealthAccessor::new(table.clone(), owner),
            family: FamilyAccessor::new(table.clone(), owner),
            duties: DutyAccessor::new(table, owner),
            bootstrap: ProfileBootstrap::new(),
            identity,
        }
    }
}

impl<P: TablePort> EmployeeRecords<P> {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Fetch the profile, synthesizing it at most once for this identity.
    pub async fn ensure_profile(&self) -> Result<ProfileStatus, PortalError> {
        self.bootstrap
            .ensure_profile(&self.identity, &self.profile)
            .await
    }

    /// Bootstrap the profile and fetch every table concurrently.
    ///
    /// Tables fail independently; a failure leaves that table's cache as it was.
    pub async fn refresh(&self) -> Refresh {
        let (profile, passes, health, family, duties) = tokio::join!(
            self.ensure_profile(),
            self.passes.fetch_all(),
            self.health.fetch(),
            self.family.fetch_all(),
            self.duties.fetch_all(),
        );

        let mut failures = Vec::new();
        let mut note = |table: &'static str, result: Result<(), PortalError>| {
            if let Err(e) = result {
                warn!(table, error = %e, "refresh failed");
                failures.push(TableFailure { table, error: e });
            }
        };
        note("employee_passes", passes.map(drop));
        note("health_records", health.map(drop));
        note("family_members", family.map(drop));
        note("duty_assignments", duties.map(drop));

        Refresh { profile, failures }
    }
}

/// A table that could not be refreshed.
#[derive(Debug)]
pub struct TableFailure {
    pub table: &'static str,
    pub error: PortalError,
}

/// Outcome of [`EmployeeRecords::refresh`].
#[derive(Debug)]
pub struct Refresh {
    pub profile: Result<ProfileStatus, PortalError>,
    pub failures: Vec<TableFailure>,
}

/// Records built for one session, tagged with the session epoch they belong to.
struct Slot<P: TablePort> {
    epoch: u64,
    records: Arc<EmployeeRecords<P>>,
}

/// Ties the session to the accessors of whoever is currently signed in.
pub struct Portal<A: AuthPort, P: TablePort> {
    session: SessionProvider<A>,
    table: P,
    records: Mutex<Option<Slot<P>>>,
}

impl<A: AuthPort, P: TablePort + Clone> Portal<A, P> {
    pub fn new(auth: A, table: P) -> Self {
        Self {
            session: SessionProvider::new(auth),
            table,
            records: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &SessionProvider<A> {
        &self.session
    }

    /// Accessors for the current session; `None` when signed out.
    ///
    /// Built on first access and discarded once the session moves on, even
    /// when the same user signs back in.
    pub fn records(&self) -> Option<Arc<EmployeeRecords<P>>> {
        let (epoch, identity) = self.session.snapshot();
        let mut slot = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(identity) = identity else {
            if slot.take().is_some() {
                debug!("per-identity caches discarded");
            }
            return None;
        };
        if let Some(current) = slot.as_ref().filter(|s| s.epoch == epoch) {
            return Some(Arc::clone(&current.records));
        }
        debug!(user_id = %identity.id, epoch, "per-identity caches built");
        let records = Arc::new(EmployeeRecords::new(self.table.clone(), identity));
        *slot = Some(Slot {
            epoch,
            records: Arc::clone(&records),
        });
        Some(records)
    }

    /// Records of the signed-in identity, or `NotSignedIn`.
    pub fn require_records(&self) -> Result<Arc<EmployeeRecords<P>>, PortalError> {
        self.records().ok_or(PortalError::NotSignedIn)
    }

    pub async fn refresh(&self) -> Result<Refresh, PortalError> {
        let records = self.require_records()?;
        Ok(records.refresh().await)
    }
}
