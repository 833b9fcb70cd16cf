use serde_json::json;

use portal::domain::types::SignUp;
use portal::error::{Collaborator, RemoteError};
use portal::usecase::session::{SessionProvider, SessionState};
use portal_testing::MemoryAuth;

use crate::helpers::{EMAIL, PASSWORD, metadata};

// ── Restore ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_start_unknown_and_resolve_to_anonymous() {
    let session = SessionProvider::new(MemoryAuth::new());
    assert!(session.is_loading());
    assert_eq!(session.state(), SessionState::Unknown);

    assert_eq!(session.restore().await.unwrap(), None);
    assert!(!session.is_loading());
    assert_eq!(session.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn should_restore_persisted_session() {
    let auth = MemoryAuth::new();
    let identity = auth.register(EMAIL, PASSWORD, metadata(json!({ "full_name": "Asha" })));
    auth.resume(identity.clone());

    let session = SessionProvider::new(auth);
    assert_eq!(session.restore().await.unwrap(), Some(identity.clone()));
    assert_eq!(session.current_identity(), Some(identity));
}

#[tokio::test]
async fn should_resolve_loading_even_when_restore_fails() {
    let auth = MemoryAuth::new();
    auth.fail_next(RemoteError::new(Collaborator::Auth, "network unreachable"));
    let session = SessionProvider::new(auth);

    let err = session.restore().await.unwrap_err();
    assert_eq!(err.to_string(), "network unreachable");
    assert!(!session.is_loading());
    assert_eq!(session.current_identity(), None);
}

// ── Sign in / sign up / sign out ─────────────────────────────────────────────

#[tokio::test]
async fn should_publish_identity_on_sign_in() {
    let auth = MemoryAuth::new();
    let identity = auth.register(EMAIL, PASSWORD, Default::default());
    let session = SessionProvider::new(auth);
    session.restore().await.unwrap();
    let mut rx = session.subscribe();
    rx.mark_unchanged();

    session.sign_in(EMAIL, PASSWORD).await.unwrap();

    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), SessionState::Authenticated(identity));
}

#[tokio::test]
async fn should_surface_provider_message_on_bad_password() {
    let auth = MemoryAuth::new();
    auth.register(EMAIL, PASSWORD, Default::default());
    let session = SessionProvider::new(auth.clone());
    session.restore().await.unwrap();

    let err = session.sign_in(EMAIL, "wrong-password").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid login credentials");
    assert_eq!(err.remote().and_then(|e| e.status), Some(400));
    assert_eq!(session.state(), SessionState::Anonymous);
    // One restore plus one sign-in; nothing is retried.
    assert_eq!(auth.calls(), 2);
}

#[tokio::test]
async fn should_sign_up_and_sign_in_immediately() {
    let session = SessionProvider::new(MemoryAuth::new());
    session.restore().await.unwrap();

    let meta = metadata(json!({ "full_name": "Asha", "employee_id": "E1001" }));
    let outcome = session.sign_up(EMAIL, PASSWORD, meta).await.unwrap();

    let SignUp::SignedIn(identity) = outcome else {
        panic!("expected an immediate session");
    };
    assert_eq!(identity.metadata_str("employee_id"), Some("E1001"));
    assert_eq!(session.current_identity(), Some(identity));
}

#[tokio::test]
async fn should_stay_anonymous_while_confirmation_pending() {
    let auth = MemoryAuth::new().require_email_confirmation();
    let session = SessionProvider::new(auth);

    let outcome = session.sign_up(EMAIL, PASSWORD, Default::default()).await.unwrap();
    assert!(matches!(outcome, SignUp::ConfirmationPending(_)));
    assert!(!session.is_loading());
    assert_eq!(session.state(), SessionState::Anonymous);

    // The account exists and can sign in once confirmed.
    session.sign_in(EMAIL, PASSWORD).await.unwrap();
    assert!(session.current_identity().is_some());
}

#[tokio::test]
async fn should_reject_duplicate_sign_up() {
    let auth = MemoryAuth::new();
    auth.register(EMAIL, PASSWORD, Default::default());
    let session = SessionProvider::new(auth);
    session.restore().await.unwrap();

    let err = session
        .sign_up(EMAIL, PASSWORD, Default::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "User already registered");
    assert_eq!(session.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn should_clear_identity_on_sign_out() {
    let auth = MemoryAuth::new();
    auth.register(EMAIL, PASSWORD, Default::default());
    let session = SessionProvider::new(auth);
    session.sign_in(EMAIL, PASSWORD).await.unwrap();
    let mut rx = session.subscribe();
    rx.mark_unchanged();

    session.sign_out().await.unwrap();

    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), SessionState::Anonymous);
    assert_eq!(session.current_identity(), None);
}

#[tokio::test]
async fn should_keep_session_when_sign_out_fails() {
    let auth = MemoryAuth::new();
    let identity = auth.register(EMAIL, PASSWORD, Default::default());
    let session = SessionProvider::new(auth.clone());
    session.sign_in(EMAIL, PASSWORD).await.unwrap();

    auth.fail_next(RemoteError::new(Collaborator::Auth, "network unreachable"));
    assert!(session.sign_out().await.is_err());
    assert_eq!(session.current_identity(), Some(identity));
}
