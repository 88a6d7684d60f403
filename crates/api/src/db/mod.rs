//! Persistence for the marketplace API.
//!
//! # Backends
//!
//! - [`JsonStore`] - a JSON document on disk behind a small mock ORM
//!   (`users`, `chatMessages`, `transactions` arrays). Default for local
//!   development.
//! - [`SqliteStore`] - `sqlx` over `SQLite`. Schema lives in
//!   `crates/api/migrations/` and is applied with:
//!
//! ```bash
//! cargo run -p wanderlance-cli -- migrate
//! ```
//!
//! Handlers never see a backend directly; they go through the repository
//! traits below via `Arc<dyn Store>`.

pub mod json;
pub mod mock_orm;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use wanderlance_core::{Email, OAuthProvider, TransactionId, TransactionStatus, UserId, Username};

use crate::config::StorageConfig;
use crate::models::{ChatMessage, NewChatMessage, NewTransaction, Transaction, NewUser, User};

pub use json::JsonStore;
pub use sqlite::SqliteStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Reading or writing the JSON data file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// User account persistence.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Get a user by (lowercased) email.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// Get a user by the account id a provider reported for them.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn find_user_by_oauth_id(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> Result<Option<User>, RepositoryError>;

    /// Whether any account already uses this username.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn username_taken(&self, username: &Username) -> Result<bool, RepositoryError>;

    /// All users, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn list_users(&self) -> Result<Vec<User>, RepositoryError>;

    /// Overwrite the mutable fields of an existing user and bump `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user has this ID, or
    /// `RepositoryError::Conflict` if the new email belongs to someone else.
    async fn update_user(&self, user: &User) -> Result<User, RepositoryError>;

    /// Delete a user. Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    async fn delete_user(&self, id: UserId) -> Result<bool, RepositoryError>;
}

/// Chat history persistence.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Append one message to a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    async fn append_message(&self, message: NewChatMessage)
    -> Result<ChatMessage, RepositoryError>;

    /// Messages of one of the user's sessions, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn session_messages(
        &self,
        user_id: UserId,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, RepositoryError>;

    /// Delete one of the user's sessions. Returns the number of messages removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    async fn delete_session(&self, user_id: UserId, session_id: &str)
    -> Result<u64, RepositoryError>;

    /// Delete every message a user owns.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    async fn delete_user_messages(&self, user_id: UserId) -> Result<u64, RepositoryError>;
}

/// Transaction persistence.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    async fn create_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, RepositoryError>;

    /// Get a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, RepositoryError>;

    /// Transactions newest first, optionally restricted to one buyer.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn list_transactions(
        &self,
        buyer_id: Option<UserId>,
    ) -> Result<Vec<Transaction>, RepositoryError>;

    /// Move a transaction from `expected` to `status` in one step.
    ///
    /// The write only happens if the stored status still equals `expected`.
    /// Transition rules are enforced by callers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no transaction has this ID, or
    /// `RepositoryError::Conflict` if its status is no longer `expected`.
    async fn set_transaction_status(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        status: TransactionStatus,
    ) -> Result<Transaction, RepositoryError>;
}

/// Everything the API needs from a storage backend.
#[async_trait]
pub trait Store: UserStore + ChatStore + TransactionStore {
    /// Backend name for logs.
    fn backend(&self) -> &'static str;

    /// Cheap reachability probe for readiness checks.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Open the configured backend.
///
/// The `SQLite` backend expects its schema to be migrated already.
///
/// # Errors
///
/// Returns an error if the data file is unreadable or the database cannot
/// be reached.
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn Store>, RepositoryError> {
    match config {
        StorageConfig::Json { path } => Ok(Arc::new(JsonStore::open(path).await?)),
        StorageConfig::Sqlite { database_url } => {
            Ok(Arc::new(SqliteStore::connect(database_url).await?))
        }
    }
}
