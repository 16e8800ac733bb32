#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use costanza_rs_client::{
    ClientConfig, MemoryStorage, Navigator, RequestGateway, SessionManager, UserIdentity,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Push(String),
    Hard(String),
}

#[derive(Default)]
pub struct RecordingNavigator {
    log: Mutex<Vec<Navigation>>,
}

impl RecordingNavigator {
    pub fn log(&self) -> Vec<Navigation> {
        self.log.lock().clone()
    }

    pub fn hard_redirects(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|n| match n {
                Navigation::Hard(path) => Some(path),
                Navigation::Push(_) => None,
            })
            .collect()
    }
}

impl Navigator for RecordingNavigator {
    fn push(&self, path: &str) {
        self.log.lock().push(Navigation::Push(path.to_string()));
    }

    fn hard_redirect(&self, path: &str) {
        self.log.lock().push(Navigation::Hard(path.to_string()));
    }
}

#[derive(Debug, Clone)]
pub enum RefreshBehavior {
    /// Issue `access` (and optionally a rotated refresh token)
    Issue {
        access: String,
        refresh: Option<String>,
        /// Whether resource endpoints accept the issued token
        accepted: bool,
    },
    Reject,
}

/// In-process stand-in for the REST backend
pub struct Backend {
    valid_tokens: Mutex<HashSet<String>>,
    refresh_behavior: Mutex<RefreshBehavior>,
    refresh_delay: Mutex<Duration>,
    me_delay: Mutex<Duration>,
    pub register_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub refresh_bodies: Mutex<Vec<Value>>,
    pub me_calls: AtomicUsize,
    /// Authorization header of every call to a resource endpoint
    pub seen_auth: Mutex<Vec<Option<String>>>,
}

impl Backend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            valid_tokens: Mutex::new(HashSet::new()),
            refresh_behavior: Mutex::new(RefreshBehavior::Issue {
                access: "tok2".into(),
                refresh: None,
                accepted: true,
            }),
            refresh_delay: Mutex::new(Duration::from_millis(0)),
            me_delay: Mutex::new(Duration::from_millis(0)),
            register_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            refresh_bodies: Mutex::new(Vec::new()),
            me_calls: AtomicUsize::new(0),
            seen_auth: Mutex::new(Vec::new()),
        })
    }

    pub fn accept(&self, token: &str) {
        self.valid_tokens.lock().insert(token.to_string());
    }

    pub fn revoke(&self, token: &str) {
        self.valid_tokens.lock().remove(token);
    }

    pub fn set_refresh(&self, behavior: RefreshBehavior) {
        *self.refresh_behavior.lock() = behavior;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock() = delay;
    }

    pub fn set_me_delay(&self, delay: Duration) {
        *self.me_delay.lock() = delay;
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn me_calls(&self) -> usize {
        self.me_calls.load(Ordering::SeqCst)
    }

    pub fn seen_auth(&self) -> Vec<Option<String>> {
        self.seen_auth.lock().clone()
    }

    fn bearer_valid(&self, headers: &HeaderMap) -> bool {
        bearer(headers).is_some_and(|token| self.valid_tokens.lock().contains(&token))
    }
}

pub fn user() -> UserIdentity {
    UserIdentity {
        id: 1,
        username: "a".into(),
        email: "a@x.com".into(),
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Given token not valid for any token type", "code": "token_not_valid"})),
    )
        .into_response()
}

async fn create_token(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    if body["email"] == "a@x.com" && body["password"] == "secret" {
        backend.accept("tok1");
        return Json(json!({"access": "tok1", "refresh": "ref1"})).into_response();
    }
    if body["email"].as_str().map_or(true, str::is_empty) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"email": ["This field may not be blank."]})),
        )
            .into_response();
    }
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "No active account found with the given credentials"})),
    )
        .into_response()
}

async fn register(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    backend.register_calls.fetch_add(1, Ordering::SeqCst);
    if body["email"] == "a@x.com" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"email": ["user with this email already exists."]})),
        )
            .into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({"id": 2, "email": body["email"]})),
    )
        .into_response()
}

async fn me(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    backend.me_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *backend.me_delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if !backend.bearer_valid(&headers) {
        return unauthorized();
    }
    Json(json!({"id": 1, "username": "a", "email": "a@x.com", "first_name": "ignored"}))
        .into_response()
}

async fn refresh(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    backend.refresh_bodies.lock().push(body);

    let delay = *backend.refresh_delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let behavior = backend.refresh_behavior.lock().clone();
    match behavior {
        RefreshBehavior::Issue {
            access,
            refresh,
            accepted,
        } => {
            if accepted {
                backend.accept(&access);
            }
            let mut body = json!({ "access": access });
            if let Some(refresh) = refresh {
                body["refresh"] = json!(refresh);
            }
            Json(body).into_response()
        }
        RefreshBehavior::Reject => unauthorized(),
    }
}

async fn oauth_exchange(
    State(backend): State<Arc<Backend>>,
    Path(provider): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if provider == "github" && body["code"] == "good-code" {
        backend.accept("tok-gh");
        return Json(json!({"access": "tok-gh", "refresh": "ref-gh", "user": "a"})).into_response();
    }
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"detail": "Authorization code is invalid"})),
    )
        .into_response()
}

async fn trails(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    backend.seen_auth.lock().push(auth.clone());
    if !backend.bearer_valid(&headers) {
        return unauthorized();
    }
    Json(json!({"results": [{"id": 1, "titulo": "Rust"}], "auth": auth})).into_response()
}

async fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, Json(json!({"detail": "nope"}))).into_response()
}

async fn search(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !backend.bearer_valid(&headers) {
        return unauthorized();
    }
    Json(json!({"search": params.get("search")})).into_response()
}

async fn send_request(State(backend): State<Arc<Backend>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !backend.bearer_valid(&headers) {
        return unauthorized();
    }
    (StatusCode::CREATED, Json(json!({"id": 9, "to_user": body["to_user"]}))).into_response()
}

async fn remove_friend(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !backend.bearer_valid(&headers) {
        return unauthorized();
    }
    StatusCode::NO_CONTENT.into_response()
}

/// Serve `backend` on an ephemeral port and return its base URL
pub async fn spawn(backend: Arc<Backend>) -> url::Url {
    let app = Router::new()
        .route("/api/auth/jwt/create/", post(create_token))
        .route("/api/auth/users/", post(register))
        .route("/api/auth/users/me/", get(me))
        .route("/api/auth/jwt/refresh/", post(refresh))
        .route("/api/auth/o/{provider}/", post(oauth_exchange))
        .route("/api/v1/trilhas/", get(trails))
        .route("/api/v1/forbidden/", get(forbidden))
        .route("/api/v1/users/users/", get(search))
        .route("/api/v1/friends/request/", post(send_request))
        .route("/api/v1/friends/{id}/", axum::routing::delete(remove_friend))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}").parse().unwrap()
}

pub struct Harness {
    pub backend: Arc<Backend>,
    pub storage: MemoryStorage,
    pub navigator: Arc<RecordingNavigator>,
    pub config: ClientConfig,
    pub session: Arc<SessionManager>,
    pub gateway: Arc<RequestGateway>,
}

impl Harness {
    pub async fn start() -> Self {
        let backend = Backend::new();
        let url = spawn(Arc::clone(&backend)).await;
        let config = ClientConfig::new(url);
        let storage = MemoryStorage::new();
        let navigator = Arc::new(RecordingNavigator::default());
        let session = SessionManager::new(
            config.clone(),
            Arc::new(storage.clone()),
            navigator.clone(),
        )
        .unwrap();
        let gateway = RequestGateway::new(Arc::clone(&session));
        Self {
            backend,
            storage,
            navigator,
            config,
            session,
            gateway,
        }
    }

    /// A fresh session over the same storage, as after a page reload
    pub fn reload(&self) -> (Arc<SessionManager>, Arc<RecordingNavigator>) {
        let navigator = Arc::new(RecordingNavigator::default());
        let session = SessionManager::new(
            self.config.clone(),
            Arc::new(self.storage.clone()),
            navigator.clone(),
        )
        .unwrap();
        (session, navigator)
    }
}
