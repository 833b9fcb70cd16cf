use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use portal_core::serde::optional_date;
use portal_domain::employee::{Cadre, Department, Division};
use portal_domain::family::Relation;
use portal_domain::id::{RecordId, UserId};
use portal_domain::pass::{PassStatus, PassType, TrainType};
use portal_domain::sort::OrderBy;

/// Free-form key/value bag attached to an identity at registration.
pub type Metadata = Map<String, Value>;

/// Passes expiring within this many days are flagged for renewal.
pub const EXPIRY_WARNING_DAYS: i64 = 30;

/// The authenticated subject a session represents.
///
/// Deserializes directly from the auth provider's user object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "user_metadata")]
    pub metadata: Metadata,
}

impl Identity {
    /// Non-empty string value of a metadata key.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Result of a sign-up call.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUp {
    /// The provider opened a session immediately.
    SignedIn(Identity),
    /// The account exists but the email must be confirmed before signing in.
    ConfirmationPending(Identity),
}

impl SignUp {
    pub fn identity(&self) -> &Identity {
        match self {
            Self::SignedIn(identity) | Self::ConfirmationPending(identity) => identity,
        }
    }
}

// ── Table configuration ──────────────────────────────────────────────────────

/// Where a freshly inserted row lands in a cached collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Prepend,
    Append,
}

/// Static description of one remote table.
#[derive(Debug, Clone, Copy)]
pub struct TableConfig {
    pub name: &'static str,
    /// Ordering applied by `fetch_all`; `None` for single-row tables.
    pub order: Option<OrderBy>,
    pub insert_at: InsertPosition,
}

/// A row type stored in one remote table, keyed by owner.
pub trait Record: Clone + serde::de::DeserializeOwned + Send + Sync {
    /// Insert payload, without `user_id` (the accessor adds it).
    type New: Serialize;
    /// Partial update payload; unset fields are left untouched remotely.
    type Patch: Serialize;

    const TABLE: TableConfig;

    fn id(&self) -> RecordId;
    fn owner(&self) -> UserId;
}

/// A single-row-per-owner record that can be written with insert-or-replace.
pub trait Upsert: Record {
    type Input: Serialize;

    const CONFLICT_KEY: &'static str;
}

// ── EmployeeProfile ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub id: RecordId,
    pub user_id: UserId,
    pub full_name: String,
    pub employee_id: String,
    pub cadre: Cadre,
    pub department: Department,
    pub division: Division,
    #[serde(default)]
    pub designation: String,
    #[serde(default, deserialize_with = "optional_date")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_date")]
    pub date_of_joining: Option<NaiveDate>,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEmployeeProfile {
    pub full_name: String,
    pub employee_id: String,
    pub cadre: Cadre,
    pub department: Department,
    pub division: Division,
    pub designation: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_joining: Option<NaiveDate>,
    pub phone_number: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cadre: Option<Cadre>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub division: Option<Division>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_joining: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// `Some(None)` clears the photo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<Option<String>>,
}

impl Record for EmployeeProfile {
    type New = NewEmployeeProfile;
    type Patch = ProfilePatch;

    const TABLE: TableConfig = TableConfig {
        name: "employee_profiles",
        order: None,
        insert_at: InsertPosition::Append,
    };

    fn id(&self) -> RecordId {
        self.id
    }

    fn owner(&self) -> UserId {
        self.user_id
    }
}

// ── EmployeePass ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeePass {
    pub id: RecordId,
    pub user_id: UserId,
    pub pass_type: PassType,
    pub train_type: TrainType,
    pub origin: String,
    pub destination: String,
    pub issue_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub status: PassStatus,
    #[serde(default)]
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmployeePass {
    /// Active and expiring (or already expired) on or before `now` plus the warning window.
    ///
    /// The expiry date is taken at midnight UTC.
    pub fn is_expiring_soon(&self, now: DateTime<Utc>) -> bool {
        let threshold = now + Duration::days(EXPIRY_WARNING_DAYS);
        self.status == PassStatus::Active
            && self.expiry_date.and_time(NaiveTime::MIN).and_utc() <= threshold
    }
}

/// Passes from `passes` that need renewal, in their cached order.
pub fn expiring_soon(passes: &[EmployeePass], now: DateTime<Utc>) -> Vec<EmployeePass> {
    passes
        .iter()
        .filter(|p| p.is_expiring_soon(now))
        .cloned()
        .collect()
}

// Issue/expiry ordering is not checked here; the store accepts either.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEmployeePass {
    pub pass_type: PassType,
    pub train_type: TrainType,
    pub origin: String,
    pub destination: String,
    pub issue_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub status: PassStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_type: Option<PassType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_type: Option<TrainType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PassStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl Record for EmployeePass {
    type New = NewEmployeePass;
    type Patch = PassPatch;

    const TABLE: TableConfig = TableConfig {
        name: "employee_passes",
        order: Some(OrderBy::asc("expiry_date")),
        insert_at: InsertPosition::Append,
    };

    fn id(&self) -> RecordId {
        self.id
    }

    fn owner(&self) -> UserId {
        self.user_id
    }
}

// ── HealthRecord ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub id: RecordId,
    pub user_id: UserId,
    #[serde(default)]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub chronic_conditions: Option<String>,
    #[serde(default, deserialize_with = "optional_date")]
    pub last_medical_check: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_date")]
    pub next_medical_due: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full replacement payload for the health record; `None` clears a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthRecordInput {
    pub blood_group: Option<String>,
    pub allergies: Option<String>,
    pub chronic_conditions: Option<String>,
    pub last_medical_check: Option<NaiveDate>,
    pub next_medical_due: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl Record for HealthRecord {
    type New = HealthRecordInput;
    type Patch = HealthRecordInput;

    const TABLE: TableConfig = TableConfig {
        name: "health_records",
        order: None,
        insert_at: InsertPosition::Append,
    };

    fn id(&self) -> RecordId {
        self.id
    }

    fn owner(&self) -> UserId {
        self.user_id
    }
}

impl Upsert for HealthRecord {
    type Input = HealthRecordInput;

    const CONFLICT_KEY: &'static str = "user_id";
}

// ── FamilyMember ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: RecordId,
    pub user_id: UserId,
    pub full_name: String,
    pub relation: Relation,
    #[serde(default, deserialize_with = "optional_date")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewFamilyMember {
    pub full_name: String,
    pub relation: Relation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FamilyMemberPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<Relation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

impl Record for FamilyMember {
    type New = NewFamilyMember;
    type Patch = FamilyMemberPatch;

    const TABLE: TableConfig = TableConfig {
        name: "family_members",
        order: Some(OrderBy::desc("created_at")),
        insert_at: InsertPosition::Prepend,
    };

    fn id(&self) -> RecordId {
        self.id
    }

    fn owner(&self) -> UserId {
        self.user_id
    }
}

// ── DutyAssignment ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DutyAssignment {
    pub id: RecordId,
    pub user_id: UserId,
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    pub duty_date: NaiveDate,
    #[serde(default)]
    pub shift: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDutyAssignment {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub duty_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DutyAssignmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duty_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Record for DutyAssignment {
    type New = NewDutyAssignment;
    type Patch = DutyAssignmentPatch;

    const TABLE: TableConfig = TableConfig {
        name: "duty_assignments",
        order: Some(OrderBy::asc("duty_date")),
        insert_at: InsertPosition::Append,
    };

    fn id(&self) -> RecordId {
        self.id
    }

    fn owner(&self) -> UserId {
        self.user_id
    }
}
