//! HTTP middleware stack for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (credentials allowed for the SPA origin only)

pub mod auth;
pub mod request_id;

pub use auth::{AUTH_COOKIE, RequireAdmin, RequireAuth, bearer_or_cookie_token};
pub use request_id::request_id_middleware;
