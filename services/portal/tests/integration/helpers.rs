use chrono::{Duration, NaiveDate, Utc};
use serde_json::Value;

use portal::domain::types::{
    Metadata, NewDutyAssignment, NewEmployeePass, NewFamilyMember,
};
use portal::usecase::portal::Portal;
use portal_domain::family::Relation;
use portal_domain::pass::{PassStatus, PassType, TrainType};
use portal_testing::{MemoryAuth, MemoryTable};

pub const EMAIL: &str = "asha@example.com";
pub const PASSWORD: &str = "secret1";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn days_from_today(days: i64) -> NaiveDate {
    (Utc::now() + Duration::days(days)).date_naive()
}

pub fn metadata(value: Value) -> Metadata {
    match value {
        Value::Object(map) => map,
        other => panic!("metadata must be an object, got {other}"),
    }
}

pub fn new_pass(expiry: NaiveDate, status: PassStatus) -> NewEmployeePass {
    NewEmployeePass {
        pass_type: PassType::Privilege,
        train_type: TrainType::Express,
        origin: "Mumbai CSMT".into(),
        destination: "Nagpur".into(),
        issue_date: date(2024, 1, 1),
        expiry_date: expiry,
        status,
        remarks: None,
    }
}

pub fn new_family(name: &str, relation: Relation) -> NewFamilyMember {
    NewFamilyMember {
        full_name: name.into(),
        relation,
        date_of_birth: None,
        profile_image_url: None,
    }
}

pub fn new_duty(title: &str, on: NaiveDate) -> NewDutyAssignment {
    NewDutyAssignment {
        title: title.into(),
        location: Some("Kalyan yard".into()),
        duty_date: on,
        shift: Some("Night".into()),
        notes: None,
    }
}

/// Portal over in-memory fakes with one registered account, already signed in.
pub async fn signed_in_portal(
    meta: Metadata,
) -> (Portal<MemoryAuth, MemoryTable>, MemoryAuth, MemoryTable) {
    let auth = MemoryAuth::new();
    auth.register(EMAIL, PASSWORD, meta);
    let table = MemoryTable::new();
    let portal = Portal::new(auth.clone(), table.clone());
    portal.session().restore().await.unwrap();
    portal.session().sign_in(EMAIL, PASSWORD).await.unwrap();
    (portal, auth, table)
}
