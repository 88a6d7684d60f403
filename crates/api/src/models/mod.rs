//! Domain models for the marketplace API.
//!
//! These are validated domain objects; storage backends convert their own
//! row types into them.

pub mod chat;
pub mod transaction;
pub mod user;

pub use chat::{ChatMessage, NewChatMessage};
pub use transaction::{NewTransaction, Transaction};
pub use user::{CurrentUser, NewUser, ProfileUpdate, User};
