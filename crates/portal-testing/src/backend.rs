//! In-process stand-in for the hosted backend's HTTP surface.
//!
//! Serves the auth, REST and storage endpoints the portal's HTTP adapters
//! call, backed by [`MemoryTable`] and [`MemoryStorage`], and records every
//! request so tests can assert on headers and query strings.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use portal::domain::repository::StoragePort;
use portal::error::{PortalError, RemoteError};
use portal_domain::sort::Sort;

use crate::storage::MemoryStorage;
use crate::table::MemoryTable;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// What the backend saw of one request.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

struct Account {
    password: String,
    user: Value,
}

#[derive(Default)]
struct Inner {
    accounts: Mutex<HashMap<String, Account>>,
    sessions: Mutex<HashMap<String, Value>>,
    seen: Mutex<Vec<SeenRequest>>,
    confirm_email: AtomicBool,
}

#[derive(Clone)]
struct BackendState {
    table: MemoryTable,
    storage: MemoryStorage,
    inner: Arc<Inner>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// A running fake backend. The server task lives until the test's runtime shuts down.
pub struct FakeBackend {
    pub url: String,
    pub table: MemoryTable,
    pub storage: MemoryStorage,
    inner: Arc<Inner>,
}

impl FakeBackend {
    pub const ANON_KEY: &'static str = "anon-test-key";

    pub async fn spawn() -> Self {
        let state = BackendState {
            table: MemoryTable::new(),
            storage: MemoryStorage::new(),
            inner: Arc::new(Inner::default()),
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("fake backend address");
        let router = build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("fake backend server error");
        });
        Self {
            url: format!("http://{addr}"),
            table: state.table,
            storage: state.storage,
            inner: state.inner,
        }
    }

    /// Sign-ups return the bare user until the email is confirmed.
    pub fn require_email_confirmation(&self) {
        self.inner.confirm_email.store(true, Ordering::SeqCst);
    }

    /// Register an account and return its user id.
    pub fn register(&self, email: &str, password: &str, metadata: Value) -> Uuid {
        let id = Uuid::new_v4();
        lock(&self.inner.accounts).insert(
            email.to_owned(),
            Account {
                password: password.to_owned(),
                user: user_json(id, email, metadata),
            },
        );
        id
    }

    /// Issue an access token for a registered account, as an earlier sign-in would.
    pub fn issue_token(&self, email: &str) -> Option<String> {
        let user = lock(&self.inner.accounts).get(email)?.user.clone();
        Some(open_session(&self.inner, user))
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        lock(&self.inner.seen).clone()
    }

    /// Requests whose path starts with `prefix`.
    pub fn requests_to(&self, prefix: &str) -> Vec<SeenRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.starts_with(prefix))
            .collect()
    }
}

fn build_router(state: BackendState) -> Router {
    Router::new()
        // Auth
        .route("/auth/v1/signup", post(signup))
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/logout", post(logout))
        .route("/auth/v1/user", get(current_user))
        // REST
        .route(
            "/rest/v1/{table}",
            get(select).post(insert).patch(update).delete(remove_rows),
        )
        // Storage
        .route("/storage/v1/object/{bucket}", delete(remove_objects))
        .route("/storage/v1/object/{bucket}/{*path}", post(upload))
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

async fn record(State(state): State<BackendState>, request: Request, next: Next) -> Response {
    lock(&state.inner.seen).push(SeenRequest {
        method: request.method().to_string(),
        path: request.uri().path().to_owned(),
        query: request.uri().query().map(str::to_owned),
        headers: request.headers().clone(),
    });
    next.run(request).await
}

// ── Auth ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
    #[serde(default)]
    data: Value,
}

fn user_json(id: Uuid, email: &str, metadata: Value) -> Value {
    let metadata = if metadata.is_object() { metadata } else { json!({}) };
    json!({
        "id": id,
        "aud": "authenticated",
        "role": "authenticated",
        "email": email,
        "user_metadata": metadata,
    })
}

fn open_session(inner: &Inner, user: Value) -> String {
    let token = format!("token-{}", Uuid::new_v4());
    lock(&inner.sessions).insert(token.clone(), user);
    token
}

fn session_json(token: String, user: Value) -> Value {
    json!({
        "access_token": token,
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": Uuid::new_v4().to_string(),
        "user": user,
    })
}

fn auth_error(status: StatusCode, code: &str, msg: &str) -> Response {
    let body = json!({ "code": status.as_u16(), "error_code": code, "msg": msg });
    (status, Json(body)).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_owned)
}

async fn signup(State(state): State<BackendState>, Json(body): Json<Credentials>) -> Response {
    let user = {
        let mut accounts = lock(&state.inner.accounts);
        if accounts.contains_key(&body.email) {
            return auth_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "user_already_exists",
                "User already registered",
            );
        }
        let user = user_json(Uuid::new_v4(), &body.email, body.data);
        accounts.insert(
            body.email,
            Account {
                password: body.password,
                user: user.clone(),
            },
        );
        user
    };
    if state.inner.confirm_email.load(Ordering::SeqCst) {
        return Json(user).into_response();
    }
    let token = open_session(&state.inner, user.clone());
    Json(session_json(token, user)).into_response()
}

async fn token(
    State(state): State<BackendState>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Credentials>,
) -> Response {
    if params.get("grant_type").map(String::as_str) != Some("password") {
        return auth_error(StatusCode::BAD_REQUEST, "validation_failed", "unsupported grant_type");
    }
    let user = match lock(&state.inner.accounts).get(&body.email) {
        Some(account) if account.password == body.password => account.user.clone(),
        _ => {
            return auth_error(
                StatusCode::BAD_REQUEST,
                "invalid_credentials",
                "Invalid login credentials",
            );
        }
    };
    let token = open_session(&state.inner, user.clone());
    Json(session_json(token, user)).into_response()
}

async fn logout(State(state): State<BackendState>, headers: HeaderMap) -> Response {
    if let Some(token) = bearer(&headers) {
        lock(&state.inner.sessions).remove(&token);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn current_user(State(state): State<BackendState>, headers: HeaderMap) -> Response {
    let user = bearer(&headers).and_then(|t| lock(&state.inner.sessions).get(&t).cloned());
    match user {
        Some(user) => Json(user).into_response(),
        None => auth_error(StatusCode::UNAUTHORIZED, "bad_jwt", "invalid JWT"),
    }
}

// ── REST ─────────────────────────────────────────────────────────────────────

/// Query string split into reserved parameters and `column=eq.value` filters.
struct RestQuery {
    conditions: Vec<(String, String)>,
    order: Option<(String, Sort)>,
    on_conflict: Option<String>,
}

impl RestQuery {
    fn parse(pairs: Vec<(String, String)>) -> Result<Self, Response> {
        let mut query = Self {
            conditions: Vec::new(),
            order: None,
            on_conflict: None,
        };
        for (key, value) in pairs {
            match key.as_str() {
                "select" => {}
                "on_conflict" => query.on_conflict = Some(value),
                "order" => {
                    let (column, dir) = value.rsplit_once('.').unwrap_or((value.as_str(), "asc"));
                    let sort = if dir == "desc" { Sort::Desc } else { Sort::Asc };
                    query.order = Some((column.to_owned(), sort));
                }
                _ => match value.strip_prefix("eq.") {
                    Some(v) => query.conditions.push((key.clone(), v.to_owned())),
                    None => {
                        return Err(rest_error(
                            StatusCode::BAD_REQUEST,
                            "PGRST100",
                            &format!("unsupported filter on {key}"),
                        ));
                    }
                },
            }
        }
        Ok(query)
    }

    fn conditions(&self) -> Vec<(&str, &str)> {
        self.conditions
            .iter()
            .map(|(c, v)| (c.as_str(), v.as_str()))
            .collect()
    }

    fn id(&self) -> Option<&str> {
        self.conditions
            .iter()
            .find(|(c, _)| c == "id")
            .map(|(_, v)| v.as_str())
    }
}

fn rest_error(status: StatusCode, code: &str, message: &str) -> Response {
    let body = json!({ "code": code, "details": null, "hint": null, "message": message });
    (status, Json(body)).into_response()
}

fn remote_response(e: RemoteError) -> Response {
    let status = e
        .status
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::BAD_REQUEST);
    rest_error(status, e.code.as_deref().unwrap_or("PGRST000"), &e.message)
}

fn wants_object(headers: &HeaderMap) -> bool {
    headers
        .get("accept")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(SINGLE_OBJECT))
}

async fn select(
    State(state): State<BackendState>,
    Path(table): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let query = match RestQuery::parse(pairs) {
        Ok(q) => q,
        Err(response) => return response,
    };
    if wants_object(&headers) {
        return match state.table.select_one(&table, &query.conditions()) {
            Ok(row) => Json(row).into_response(),
            Err(e) => remote_response(e),
        };
    }
    let order = query.order.as_ref().map(|(c, s)| (c.as_str(), *s));
    match state.table.select_rows(&table, &query.conditions(), order) {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => remote_response(e),
    }
}

async fn insert(
    State(state): State<BackendState>,
    Path(table): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    Json(row): Json<Value>,
) -> Response {
    let query = match RestQuery::parse(pairs) {
        Ok(q) => q,
        Err(response) => return response,
    };
    let result = match &query.on_conflict {
        Some(key) => state.table.upsert_row(&table, row, key),
        None => state.table.insert_row(&table, row),
    };
    match result {
        Ok(row) => (StatusCode::CREATED, Json(row)).into_response(),
        Err(e) => remote_response(e),
    }
}

async fn update(
    State(state): State<BackendState>,
    Path(table): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    Json(patch): Json<Value>,
) -> Response {
    let query = match RestQuery::parse(pairs) {
        Ok(q) => q,
        Err(response) => return response,
    };
    let Some(id) = query.id() else {
        return rest_error(StatusCode::BAD_REQUEST, "PGRST100", "update requires an id filter");
    };
    match state.table.update_row(&table, id, patch) {
        Ok(row) => Json(row).into_response(),
        Err(e) => remote_response(e),
    }
}

async fn remove_rows(
    State(state): State<BackendState>,
    Path(table): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let query = match RestQuery::parse(pairs) {
        Ok(q) => q,
        Err(response) => return response,
    };
    let Some(id) = query.id() else {
        return rest_error(StatusCode::BAD_REQUEST, "PGRST100", "delete requires an id filter");
    };
    match state.table.delete_row(&table, id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => remote_response(e),
    }
}

// ── Storage ──────────────────────────────────────────────────────────────────

fn storage_response(e: PortalError) -> Response {
    match e {
        PortalError::Remote(e) => {
            let status = e
                .status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::BAD_REQUEST);
            let body = json!({
                "statusCode": status.as_u16().to_string(),
                "error": e.code.unwrap_or_default(),
                "message": e.message,
            });
            (status, Json(body)).into_response()
        }
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response(),
    }
}

async fn upload(
    State(state): State<BackendState>,
    Path((bucket, path)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");
    let overwrite = headers
        .get("x-upsert")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "true");
    match state
        .storage
        .upload(&bucket, &path, body, content_type, overwrite)
        .await
    {
        Ok(path) => Json(json!({ "Key": format!("{bucket}/{path}"), "Id": Uuid::new_v4() }))
            .into_response(),
        Err(e) => storage_response(e),
    }
}

#[derive(Deserialize)]
struct RemoveBody {
    prefixes: Vec<String>,
}

async fn remove_objects(
    State(state): State<BackendState>,
    Path(bucket): Path<String>,
    Json(body): Json<RemoveBody>,
) -> Response {
    match state.storage.remove(&bucket, &body.prefixes).await {
        Ok(()) => Json(json!([])).into_response(),
        Err(e) => storage_response(e),
    }
}
