//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness
//! GET    /health/ready                    - Store reachable
//!
//! # Auth
//! POST   /api/auth/register               - Create account, returns token
//! POST   /api/auth/login                  - Login, returns token and sets cookie
//! POST   /api/auth/logout                 - Clear cookie
//! GET    /api/auth/me                     - Current user (requires auth)
//! PUT    /api/auth/profile                - Update profile (requires auth)
//! PUT    /api/auth/password               - Change password (requires auth)
//! DELETE /api/auth/account                - Delete account (requires auth)
//! GET    /api/auth/{provider}             - Redirect to Google/GitHub consent
//! GET    /api/auth/{provider}/callback    - OAuth callback, redirects to the SPA
//!
//! # Chat (requires auth)
//! POST   /api/chat                        - Send a message in a session
//! GET    /api/chat/sessions/{sessionId}   - Session messages
//! DELETE /api/chat/sessions/{sessionId}   - Clear session
//!
//! # Auto-chat (anonymous)
//! POST   /api/auto-chat                   - Stateless reply
//! GET    /api/auto-chat/status            - Provider configured?
//!
//! # Transactions (requires auth)
//! GET    /api/transactions                - Own (admin: all)
//! POST   /api/transactions                - Record a purchase
//! GET    /api/transactions/{id}           - Owner or admin
//! PUT    /api/transactions/{id}/status    - Transition status (admin)
//!
//! # Admin
//! GET    /api/admin/users                 - List users
//! PUT    /api/admin/users/{id}/role       - Set role
//! ```

pub mod admin;
pub mod auth;
pub mod auto_chat;
pub mod chat;
pub mod health;
pub mod oauth;
pub mod transactions;

use axum::{
    Router,
    extract::FromRequest,
    routing::{get, post, put},
};

use crate::error::AppError;
use crate::state::AppState;

/// JSON body extractor whose rejections use the `{"error": ...}` envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/profile", put(auth::update_profile))
        .route("/password", put(auth::change_password))
        .route("/account", axum::routing::delete(auth::delete_account))
        // Google / GitHub
        .route("/{provider}", get(oauth::start))
        .route("/{provider}/callback", get(oauth::callback))
}

/// Create the chat routes router.
pub fn chat_routes() -> Router<AppState> {
    Router::new().route("/", post(chat::send)).route(
        "/sessions/{session_id}",
        get(chat::session).delete(chat::clear_session),
    )
}

/// Create the anonymous auto-chat routes router.
pub fn auto_chat_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(auto_chat::reply))
        .route("/status", get(auto_chat::status))
}

/// Create the transaction routes router.
pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(transactions::index).post(transactions::create))
        .route("/{id}", get(transactions::show))
        .route("/{id}/status", put(transactions::update_status))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(admin::users))
        .route("/users/{id}/role", put(admin::set_role))
}

/// Create all routes for the API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/auth", auth_routes())
        .nest("/api/chat", chat_routes())
        .nest("/api/auto-chat", auto_chat_routes())
        .nest("/api/transactions", transaction_routes())
        .nest("/api/admin", admin_routes())
}
