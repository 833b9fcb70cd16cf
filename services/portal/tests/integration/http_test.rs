use bytes::Bytes;
use serde_json::json;

use portal::domain::types::{HealthRecordInput, SignUp};
use portal::infra::auth::GoTrueAuthClient;
use portal::infra::http::SupabaseHttp;
use portal::infra::rest::RestTableClient;
use portal::infra::storage::StorageClient;
use portal::usecase::accessor::{HealthAccessor, PassAccessor, ProfileAccessor};
use portal::usecase::bootstrap::ProfileStatus;
use portal::usecase::portal::Portal;
use portal::usecase::session::SessionProvider;
use portal::usecase::upload::{ImageBuckets, ImageFile, ImageKind, ImageStore};
use portal_domain::id::UserId;
use portal_domain::pass::PassStatus;
use portal_testing::FakeBackend;

use crate::helpers::{EMAIL, PASSWORD, date, days_from_today, new_pass};

struct Clients {
    http: SupabaseHttp,
    auth: GoTrueAuthClient,
    table: RestTableClient,
    storage: StorageClient,
}

fn clients(backend: &FakeBackend) -> Clients {
    let http = SupabaseHttp::new(&backend.url, FakeBackend::ANON_KEY).unwrap();
    Clients {
        auth: GoTrueAuthClient::new(http.clone()),
        table: RestTableClient::new(http.clone()),
        storage: StorageClient::new(http.clone()),
        http,
    }
}

async fn signed_in(backend: &FakeBackend) -> (Clients, UserId) {
    let id = backend.register(EMAIL, PASSWORD, json!({ "full_name": "Asha Patil" }));
    let clients = clients(backend);
    let session = SessionProvider::new(clients.auth.clone());
    session.sign_in(EMAIL, PASSWORD).await.unwrap();
    (clients, UserId(id))
}

// ── Auth ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_sign_in_with_password_grant_and_keep_token() {
    let backend = FakeBackend::spawn().await;
    let id = backend.register(EMAIL, PASSWORD, json!({ "employee_id": "E1001" }));
    let c = clients(&backend);
    let session = SessionProvider::new(c.auth.clone());

    let identity = session.sign_in(EMAIL, PASSWORD).await.unwrap();

    assert_eq!(identity.id, UserId(id));
    assert_eq!(identity.metadata_str("employee_id"), Some("E1001"));
    assert!(c.http.token().is_some());
    let seen = backend.requests_to("/auth/v1/token");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].query.as_deref(), Some("grant_type=password"));
    assert_eq!(seen[0].header("apikey"), Some(FakeBackend::ANON_KEY));
}

#[tokio::test]
async fn should_surface_auth_error_message_and_code() {
    let backend = FakeBackend::spawn().await;
    backend.register(EMAIL, PASSWORD, json!({}));
    let c = clients(&backend);

    let err = SessionProvider::new(c.auth)
        .sign_in(EMAIL, "wrong-password")
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Invalid login credentials");
    let remote = err.remote().unwrap();
    assert_eq!(remote.code.as_deref(), Some("invalid_credentials"));
    assert_eq!(remote.status, Some(400));
    assert_eq!(c.http.token(), None);
}

#[tokio::test]
async fn should_report_pending_confirmation_without_session() {
    let backend = FakeBackend::spawn().await;
    backend.require_email_confirmation();
    let c = clients(&backend);
    let session = SessionProvider::new(c.auth);

    let meta = json!({ "full_name": "Asha" }).as_object().cloned().unwrap();
    let outcome = session.sign_up(EMAIL, PASSWORD, meta).await.unwrap();

    let SignUp::ConfirmationPending(identity) = outcome else {
        panic!("expected pending confirmation");
    };
    assert_eq!(identity.email.as_deref(), Some(EMAIL));
    assert_eq!(c.http.token(), None);
    assert_eq!(session.current_identity(), None);
}

#[tokio::test]
async fn should_restore_session_from_access_token() {
    let backend = FakeBackend::spawn().await;
    let id = backend.register(EMAIL, PASSWORD, json!({}));
    let token = backend.issue_token(EMAIL).unwrap();
    let c = clients(&backend);
    let session = SessionProvider::new(c.auth.with_access_token(token.clone()));

    let identity = session.restore().await.unwrap().unwrap();

    assert_eq!(identity.id, UserId(id));
    let seen = backend.requests_to("/auth/v1/user");
    assert_eq!(seen[0].header("authorization"), Some(format!("Bearer {token}").as_str()));
}

#[tokio::test]
async fn should_treat_rejected_token_as_signed_out() {
    let backend = FakeBackend::spawn().await;
    let c = clients(&backend);
    let session = SessionProvider::new(c.auth.with_access_token("stale-token"));

    assert_eq!(session.restore().await.unwrap(), None);
    assert_eq!(c.http.token(), None);
    assert!(!session.is_loading());
}

#[tokio::test]
async fn should_fall_back_to_api_key_after_sign_out() {
    let backend = FakeBackend::spawn().await;
    let (c, owner) = signed_in(&backend).await;
    SessionProvider::new(c.auth.clone()).sign_out().await.unwrap();

    PassAccessor::new(c.table.clone(), owner).fetch_all().await.unwrap();

    assert_eq!(backend.requests_to("/auth/v1/logout").len(), 1);
    let rest = backend.requests_to("/rest/v1/");
    let bearer = format!("Bearer {}", FakeBackend::ANON_KEY);
    assert_eq!(rest[0].header("authorization"), Some(bearer.as_str()));
}

// ── Tables ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_map_missing_single_row_to_none() {
    let backend = FakeBackend::spawn().await;
    let (c, owner) = signed_in(&backend).await;

    let profile = ProfileAccessor::new(c.table, owner).fetch().await.unwrap();

    assert_eq!(profile, None);
    let seen = backend.requests_to("/rest/v1/employee_profiles");
    assert_eq!(
        seen[0].header("accept"),
        Some("application/vnd.pgrst.object+json")
    );
}

#[tokio::test]
async fn should_filter_by_owner_and_order_passes() {
    let backend = FakeBackend::spawn().await;
    let (c, owner) = signed_in(&backend).await;
    let passes = PassAccessor::new(c.table.clone(), owner);
    passes
        .add(new_pass(date(2030, 6, 1), PassStatus::Active))
        .await
        .unwrap();
    passes
        .add(new_pass(date(2030, 1, 1), PassStatus::Active))
        .await
        .unwrap();

    let fetched = passes.fetch_all().await.unwrap();

    assert_eq!(fetched[0].expiry_date, date(2030, 1, 1));
    assert!(fetched.iter().all(|p| p.user_id == owner));
    let get = backend
        .requests_to("/rest/v1/employee_passes")
        .into_iter()
        .find(|r| r.method == "GET")
        .unwrap();
    let query = get.query.unwrap();
    assert!(query.contains(&format!("user_id=eq.{owner}")));
    assert!(query.contains("order=expiry_date.asc"));
    assert_eq!(
        get.headers.get("authorization").map(|v| v.to_str().unwrap().to_owned()),
        Some(format!("Bearer {}", c.http.token().unwrap()))
    );
}

#[tokio::test]
async fn should_surface_table_error_for_failed_update() {
    let backend = FakeBackend::spawn().await;
    let (c, owner) = signed_in(&backend).await;
    let passes = PassAccessor::new(c.table, owner);
    let pass = passes
        .add(new_pass(days_from_today(3), PassStatus::Active))
        .await
        .unwrap();
    backend.table.fail_next(
        portal_testing::TableOp::Update,
        portal_testing::Fault::Reject(portal_testing::table::rejected("permission denied")),
    );

    let err = passes
        .update(pass.id, Default::default())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "permission denied");
    assert_eq!(err.remote().and_then(|e| e.code.as_deref()), Some("42501"));
    assert_eq!(passes.rows(), vec![pass]);
}

#[tokio::test]
async fn should_upsert_health_record_on_owner() {
    let backend = FakeBackend::spawn().await;
    let (c, owner) = signed_in(&backend).await;
    let health = HealthAccessor::new(c.table, owner);

    let first = health
        .upsert(HealthRecordInput {
            blood_group: Some("B+".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    let second = health
        .upsert(HealthRecordInput {
            blood_group: Some("B+".into()),
            notes: Some("Annual check done".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(backend.table.rows("health_records").len(), 1);
    let post = backend.requests_to("/rest/v1/health_records");
    assert_eq!(post[0].query.as_deref(), Some("on_conflict=user_id"));
    assert!(post[0].header("prefer").unwrap().contains("resolution=merge-duplicates"));
}

#[tokio::test]
async fn should_run_portal_refresh_over_http() {
    let backend = FakeBackend::spawn().await;
    backend.register(
        EMAIL,
        PASSWORD,
        json!({ "full_name": "Asha Patil", "employee_id": "E1001", "cadre": "Officer" }),
    );
    let c = clients(&backend);
    let portal = Portal::new(c.auth, c.table);
    portal.session().restore().await.unwrap();
    portal.session().sign_in(EMAIL, PASSWORD).await.unwrap();

    let refresh = portal.refresh().await.unwrap();

    assert!(refresh.failures.is_empty());
    assert!(matches!(refresh.profile, Ok(ProfileStatus::Created(_))));
    assert_eq!(backend.table.rows("employee_profiles")[0]["employee_id"], "E1001");
}

// ── Storage ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_upload_and_delete_photo_over_http() {
    let backend = FakeBackend::spawn().await;
    let (c, owner) = signed_in(&backend).await;
    let images = ImageStore::new(c.storage, ImageBuckets::default());
    let photo = ImageFile {
        name: "me.png".into(),
        content_type: "image/png".into(),
        bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
    };

    let url = images.upload(ImageKind::Profile, owner, &photo).await.unwrap();

    let prefix = format!("{}/storage/v1/object/public/employee-profiles/{owner}/", backend.url);
    assert!(url.starts_with(&prefix), "{url}");
    let paths = backend.storage.paths("employee-profiles");
    assert_eq!(paths.len(), 1);
    let stored = backend.storage.object("employee-profiles", &paths[0]).unwrap();
    assert_eq!(stored.content_type, "image/png");
    let upload = &backend.requests_to("/storage/v1/object/employee-profiles/")[0];
    assert_eq!(upload.header("x-upsert"), Some("true"));

    assert!(images.delete(ImageKind::Profile, &url).await.unwrap());
    assert!(backend.storage.paths("employee-profiles").is_empty());
}

#[tokio::test]
async fn should_not_overwrite_family_photos() {
    let backend = FakeBackend::spawn().await;
    let (c, owner) = signed_in(&backend).await;
    let images = ImageStore::new(c.storage, ImageBuckets::default());
    let photo = ImageFile {
        name: "son.webp".into(),
        content_type: "image/webp".into(),
        bytes: Bytes::from_static(b"RIFF"),
    };

    images.upload(ImageKind::Family, owner, &photo).await.unwrap();

    let upload = &backend.requests_to("/storage/v1/object/family-profiles/")[0];
    assert_eq!(upload.header("x-upsert"), Some("false"));
    assert!(upload.path.ends_with(".webp"));
}
