//! Business logic services.
//!
//! Services sit between route handlers and the repositories, borrowing the
//! shared store for the duration of one request.

pub mod auth;
pub mod chat;
pub mod oauth;
pub mod transactions;

pub use auth::{AuthError, AuthService};
pub use chat::{ChatError, ChatService};
pub use oauth::{OAuthClient, OAuthError, OAuthStateStore};
pub use transactions::{TransactionError, TransactionService};
