//! Integration tests for Wanderlance.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p wanderlance-integration-tests
//! ```
//!
//! Every test drives the real router in-process with
//! `tower::ServiceExt::oneshot`, over a JSON store (or `SQLite` file) in a
//! temporary directory. No network or database server is needed.
//!
//! # Test Categories
//!
//! - `auth` - registration, login, tokens, profile and account upkeep
//! - `chat` - chat sessions, auto-chat, and the retry wrapper
//! - `transactions` - transaction visibility and status changes
//! - `admin` - role management, OAuth entry points and health checks
//! - `sqlite` - the same flows over a migrated `SQLite` file

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use wanderlance_api::ai::{AiError, HistoryTurn, TextGenerator};
use wanderlance_api::config::{ApiConfig, StorageConfig};
use wanderlance_api::db::{JsonStore, SqliteStore, Store};
use wanderlance_api::models::User;
use wanderlance_api::state::AppState;
use wanderlance_core::{Email, UserRole};

pub const TEST_JWT_SECRET: &str = "integration-test-secret-9f3a7c2e51b84d06a1e5";
pub const TEST_PASSWORD: &str = "wander-far-2026";

// =============================================================================
// Scripted generator
// =============================================================================

/// A text generator that plays back scripted results, then echoes.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, AiError>>>,
    always: Option<fn() -> AiError>,
    calls: AtomicU32,
}

impl ScriptedGenerator {
    /// Replies `echo: <message>` to everything.
    #[must_use]
    pub fn echo() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Plays `script` in order, then echoes.
    #[must_use]
    pub fn scripted(script: Vec<Result<String, AiError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        })
    }

    /// Fails every call with a fresh error from `make`.
    #[must_use]
    pub fn failing(make: fn() -> AiError) -> Arc<Self> {
        Arc::new(Self {
            always: Some(make),
            ..Self::default()
        })
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn model(&self) -> &str {
        "scripted"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn generate(&self, message: &str, _history: &[HistoryTurn]) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(make) = self.always {
            return Err(make());
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("echo: {message}")))
    }
}

// =============================================================================
// Test application
// =============================================================================

/// A decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// The `{"error": ...}` message, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}

/// The router over a fresh JSON store in a temporary directory.
pub struct TestApp {
    pub state: AppState,
    router: Router,
    dir: tempfile::TempDir,
}

impl TestApp {
    /// App with an echoing generator and no OAuth providers.
    pub async fn new() -> Self {
        Self::with_config(|_| {}, ScriptedGenerator::echo()).await
    }

    /// App with a custom generator.
    pub async fn with_generator(generator: Arc<dyn TextGenerator>) -> Self {
        Self::with_config(|_| {}, generator).await
    }

    /// App with config tweaks applied before the state is built.
    pub async fn with_config(
        configure: impl FnOnce(&mut ApiConfig),
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");

        let mut config = ApiConfig::local(
            SecretString::from(TEST_JWT_SECRET),
            StorageConfig::Json { path: path.clone() },
        );
        config.ai.base_delay = Duration::from_millis(1);
        configure(&mut config);

        let store: Arc<dyn Store> = Arc::new(JsonStore::open(&path).await.unwrap());
        Self::build(dir, config, store, generator)
    }

    /// App backed by a migrated `SQLite` file instead of the JSON store.
    pub async fn sqlite() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let database_url =
            SecretString::from(format!("sqlite://{}", dir.path().join("db.sqlite").display()));

        let mut config = ApiConfig::local(
            SecretString::from(TEST_JWT_SECRET),
            StorageConfig::Sqlite {
                database_url: database_url.clone(),
            },
        );
        config.ai.base_delay = Duration::from_millis(1);

        let store = SqliteStore::connect(&database_url).await.unwrap();
        store.migrate().await.unwrap();
        Self::build(dir, config, Arc::new(store), ScriptedGenerator::echo())
    }

    fn build(
        dir: tempfile::TempDir,
        config: ApiConfig,
        store: Arc<dyn Store>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let state = AppState::new(config, store, generator);
        let router = wanderlance_api::app(state.clone());

        Self { state, router, dir }
    }

    /// Path of the backing JSON file.
    #[must_use]
    pub fn data_file(&self) -> std::path::PathBuf {
        self.dir.path().join("db.json")
    }

    /// Send a raw request.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Send a request with an optional JSON body and bearer token.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.call(Method::GET, path, None, token).await
    }

    pub async fn post(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.call(Method::POST, path, Some(body), token).await
    }

    pub async fn put(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.call(Method::PUT, path, Some(body), token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.call(Method::DELETE, path, None, token).await
    }

    /// Register an account and return its token and user JSON.
    pub async fn register(&self, username: &str, email: &str) -> (String, Value) {
        let response = self
            .post(
                "/api/auth/register",
                serde_json::json!({
                    "username": username,
                    "email": email,
                    "password": TEST_PASSWORD,
                }),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);

        let token = response.body["token"].as_str().unwrap().to_string();
        (token, response.body["user"].clone())
    }

    /// Load a stored user by email.
    pub async fn user(&self, email: &str) -> User {
        self.state
            .store()
            .find_user_by_email(&Email::parse(email).unwrap())
            .await
            .unwrap()
            .unwrap()
    }

    /// Register an account, promote it to admin directly in the store, and
    /// return its token.
    pub async fn admin(&self, username: &str, email: &str) -> String {
        let (token, _) = self.register(username, email).await;
        let mut user = self.user(email).await;
        user.role = UserRole::Admin;
        self.state.store().update_user(&user).await.unwrap();
        token
    }
}
