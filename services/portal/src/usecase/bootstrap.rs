use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domain::repository::TablePort;
use crate::domain::types::{EmployeeProfile, Identity, NewEmployeeProfile};
use crate::error::PortalError;
use crate::usecase::accessor::ProfileAccessor;

/// Outcome of [`ProfileBootstrap::ensure_profile`].
#[derive(Debug)]
pub enum ProfileStatus {
    /// The profile row already existed.
    Existing(EmployeeProfile),
    /// The profile was synthesized from identity metadata and stored.
    Created(EmployeeProfile),
    /// No profile row. `error` carries the insert failure of this call's
    /// synthesis attempt; it is `None` when synthesis was already spent.
    Missing { error: Option<PortalError> },
}

impl ProfileStatus {
    pub fn profile(&self) -> Option<&EmployeeProfile> {
        match self {
            Self::Existing(p) | Self::Created(p) => Some(p),
            Self::Missing { .. } => None,
        }
    }
}

/// Creates the employee profile from registration metadata when it is absent.
///
/// One instance lives for one signed-in session and synthesizes at most once.
#[derive(Debug, Default)]
pub struct ProfileBootstrap {
    attempted: AtomicBool,
}

impl ProfileBootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempted(&self) -> bool {
        self.attempted.load(Ordering::Acquire)
    }

    /// Fetch the profile and synthesize it if missing.
    ///
    /// A fetch failure is returned as an error and does not spend the attempt.
    pub async fn ensure_profile<P: TablePort>(
        &self,
        identity: &Identity,
        profiles: &ProfileAccessor<P>,
    ) -> Result<ProfileStatus, PortalError> {
        if let Some(profile) = profiles.fetch().await? {
            return Ok(ProfileStatus::Existing(profile));
        }
        if self.attempted.swap(true, Ordering::AcqRel) {
            return Ok(ProfileStatus::Missing { error: None });
        }

        match profiles.insert(profile_from_identity(identity)).await {
            Ok(profile) => {
                info!(user_id = %identity.id, "profile created from registration metadata");
                Ok(ProfileStatus::Created(profile))
            }
            Err(e) => {
                warn!(user_id = %identity.id, error = %e, "profile creation failed");
                Ok(ProfileStatus::Missing { error: Some(e) })
            }
        }
    }
}

/// Build an insert payload from the identity's registration metadata.
///
/// Missing text fields become empty strings. Missing or unknown enumeration
/// values take the defaults (Skilled, Operations, Central Railway).
pub fn profile_from_identity(identity: &Identity) -> NewEmployeeProfile {
    let text = |key: &str| identity.metadata_str(key).unwrap_or_default().to_owned();
    NewEmployeeProfile {
        full_name: text("full_name"),
        employee_id: text("employee_id"),
        cadre: choice(identity, "cadre"),
        department: choice(identity, "department"),
        division: choice(identity, "division"),
        designation: text("designation"),
        date_of_birth: date(identity, "date_of_birth"),
        date_of_joining: date(identity, "date_of_joining"),
        phone_number: text("phone_number"),
        address: text("address"),
        profile_image_url: None,
    }
}

fn choice<T>(identity: &Identity, key: &str) -> T
where
    T: FromStr + Default,
    T::Err: std::fmt::Display,
{
    let Some(raw) = identity.metadata_str(key) else {
        return T::default();
    };
    raw.parse().unwrap_or_else(|e| {
        warn!(key, error = %e, "unrecognised metadata value, using default");
        T::default()
    })
}

fn date(identity: &Identity, key: &str) -> Option<NaiveDate> {
    let raw = identity.metadata_str(key)?;
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(e) => {
            warn!(key, value = raw, error = %e, "unparseable metadata date, leaving empty");
            None
        }
    }
}
