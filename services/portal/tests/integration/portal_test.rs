use std::sync::Arc;

use serde_json::json;

use portal::error::PortalError;
use portal::usecase::bootstrap::ProfileStatus;
use portal::usecase::portal::Portal;
use portal_domain::family::Relation;
use portal_domain::pass::PassStatus;
use portal_testing::table::rejected;
use portal_testing::{Fault, MemoryAuth, MemoryTable, TableOp};

use crate::helpers::{
    EMAIL, PASSWORD, days_from_today, metadata, new_family, new_pass, signed_in_portal,
};

// ── Lifecycle ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_have_no_records_while_signed_out() {
    let portal = Portal::new(MemoryAuth::new(), MemoryTable::new());
    portal.session().restore().await.unwrap();

    assert!(portal.records().is_none());
    assert!(matches!(portal.require_records(), Err(PortalError::NotSignedIn)));
    assert!(matches!(portal.refresh().await, Err(PortalError::NotSignedIn)));
}

#[tokio::test]
async fn should_reuse_records_for_same_identity() {
    let (portal, _, _) = signed_in_portal(Default::default()).await;

    let first = portal.records().unwrap();
    let second = portal.records().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.passes.owner(), first.identity().id);
}

#[tokio::test]
async fn should_discard_caches_on_sign_out() {
    let (portal, _, table) = signed_in_portal(Default::default()).await;
    let before = portal.records().unwrap();
    before
        .family
        .add(new_family("Ravi", Relation::Son))
        .await
        .unwrap();
    assert_eq!(before.family.rows().len(), 1);

    portal.session().sign_out().await.unwrap();
    assert!(portal.records().is_none());

    portal.session().sign_in(EMAIL, PASSWORD).await.unwrap();
    let after = portal.records().unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(after.family.rows().is_empty());
    assert_eq!(table.rows("family_members").len(), 1);
}

#[tokio::test]
async fn should_start_fresh_session_when_same_user_signs_back_in() {
    let (portal, _, table) = signed_in_portal(Default::default()).await;
    let before = portal.records().unwrap();
    before
        .family
        .add(new_family("Ravi", Relation::Son))
        .await
        .unwrap();
    table.fail_next(TableOp::Insert, Fault::Reject(rejected("permission denied")));
    let first = portal.refresh().await.unwrap();
    assert!(matches!(first.profile, Ok(ProfileStatus::Missing { error: Some(_) })));

    // No records() call while signed out.
    portal.session().sign_out().await.unwrap();
    portal.session().sign_in(EMAIL, PASSWORD).await.unwrap();

    let after = portal.records().unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.identity().id, before.identity().id);
    assert!(after.family.rows().is_empty());

    let second = portal.refresh().await.unwrap();
    assert!(matches!(second.profile, Ok(ProfileStatus::Created(_))));
    assert_eq!(after.family.rows().len(), 1);
    assert_eq!(table.calls(TableOp::Insert), 3);
}

#[tokio::test]
async fn should_rebuild_records_when_identity_changes() {
    let (portal, auth, _) = signed_in_portal(Default::default()).await;
    let asha = portal.records().unwrap();

    auth.register("ravi@example.com", PASSWORD, Default::default());
    portal
        .session()
        .sign_in("ravi@example.com", PASSWORD)
        .await
        .unwrap();

    let ravi = portal.records().unwrap();
    assert_ne!(asha.identity().id, ravi.identity().id);
    assert_eq!(ravi.duties.owner(), ravi.identity().id);
}

// ── Refresh ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_bootstrap_profile_and_load_every_table() {
    let meta = metadata(json!({ "full_name": "Asha Patil", "employee_id": "E1001" }));
    let (portal, _, table) = signed_in_portal(meta).await;
    let owner = portal.records().unwrap().identity().id;
    table.seed(
        "employee_passes",
        json!({
            "user_id": owner, "pass_type": "Privilege", "train_type": "Mail",
            "origin": "Mumbai CSMT", "destination": "Howrah",
            "issue_date": "2024-01-01", "expiry_date": days_from_today(5), "status": "active",
        }),
    );

    let refresh = portal.refresh().await.unwrap();

    assert!(refresh.failures.is_empty());
    let Ok(ProfileStatus::Created(profile)) = refresh.profile else {
        panic!("expected the profile to be created");
    };
    assert_eq!(profile.employee_id, "E1001");

    let records = portal.records().unwrap();
    assert_eq!(records.passes.rows().len(), 1);
    assert_eq!(records.passes.expiring_soon().len(), 1);
    assert_eq!(records.health.current(), None);
    assert_eq!(records.profile.current(), Some(profile));
}

#[tokio::test]
async fn should_report_failing_table_and_keep_its_cache() {
    let (portal, _, table) = signed_in_portal(Default::default()).await;
    let records = portal.records().unwrap();
    records
        .passes
        .add(new_pass(days_from_today(90), PassStatus::Active))
        .await
        .unwrap();
    records
        .family
        .add(new_family("Meera", Relation::Daughter))
        .await
        .unwrap();
    let cached_passes = records.passes.rows();
    let cached_family = records.family.rows();

    table.fail_next(TableOp::Select, Fault::Reject(rejected("permission denied")));
    let refresh = portal.refresh().await.unwrap();

    assert_eq!(refresh.failures.len(), 1);
    let failure = &refresh.failures[0];
    assert_eq!(failure.error.to_string(), "permission denied");
    assert!(
        ["employee_passes", "family_members", "duty_assignments"].contains(&failure.table),
        "unexpected table {}",
        failure.table
    );
    // Whichever table failed, both caches hold the same rows as before.
    assert_eq!(records.passes.rows(), cached_passes);
    assert_eq!(records.family.rows(), cached_family);
    assert!(refresh.profile.is_ok());
}

#[tokio::test]
async fn should_not_retry_profile_synthesis_across_refreshes() {
    let (portal, _, table) = signed_in_portal(Default::default()).await;
    table.fail_next(TableOp::Insert, Fault::Reject(rejected("permission denied")));

    let first = portal.refresh().await.unwrap();
    assert!(matches!(first.profile, Ok(ProfileStatus::Missing { error: Some(_) })));

    let second = portal.refresh().await.unwrap();
    assert!(matches!(second.profile, Ok(ProfileStatus::Missing { error: None })));
    assert_eq!(table.calls(TableOp::Insert), 1);
}
