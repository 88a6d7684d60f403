//! Repository traits over the JSON mock ORM.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;

use wanderlance_core::{Email, OAuthProvider, TransactionId, TransactionStatus, UserId, Username};

use super::mock_orm::{Collection, MockOrm};
use super::{ChatStore, RepositoryError, Store, TransactionStore, UserStore};
use crate::models::{ChatMessage, NewChatMessage, NewTransaction, NewUser, Transaction, User};

/// File-backed store for development and tests.
#[derive(Debug)]
pub struct JsonStore {
    orm: MockOrm,
}

impl JsonStore {
    /// Open (or lazily create) the data file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is unreadable or invalid.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let orm = MockOrm::open(path.as_ref()).await?;
        tracing::debug!(path = %orm.path().display(), "Opened JSON store");
        Ok(Self { orm })
    }
}

fn duplicate_email(email: &Email) -> RepositoryError {
    RepositoryError::Conflict(format!("email already registered: {email}"))
}

#[async_trait]
impl UserStore for JsonStore {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        self.orm
            .write(|d| {
                if d.users.find_one(|u| u.email == user.email).is_some() {
                    return Err(duplicate_email(&user.email));
                }
                Ok(d.users.create(user.into_user(Utc::now())))
            })
            .await
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.orm.read(|d| d.users.find_by_id(id)).await)
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        Ok(self.orm.read(|d| d.users.find_one(|u| &u.email == email)).await)
    }

    async fn find_user_by_oauth_id(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .orm
            .read(|d| {
                d.users
                    .find_one(|u| u.oauth_id(provider) == Some(provider_id))
            })
            .await)
    }

    async fn username_taken(&self, username: &Username) -> Result<bool, RepositoryError> {
        Ok(self
            .orm
            .read(|d| d.users.find_one(|u| &u.username == username).is_some())
            .await)
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.orm.read(|d| d.users.find_all(|_| true)).await)
    }

    async fn update_user(&self, user: &User) -> Result<User, RepositoryError> {
        self.orm
            .write(|d| {
                if d.users
                    .find_one(|u| u.email == user.email && u.id != user.id)
                    .is_some()
                {
                    return Err(duplicate_email(&user.email));
                }
                d.users
                    .update(user.id, |existing| {
                        *existing = User {
                            id: existing.id,
                            created_at: existing.created_at,
                            updated_at: Utc::now(),
                            ..user.clone()
                        };
                    })
                    .ok_or(RepositoryError::NotFound)
            })
            .await
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, RepositoryError> {
        self.orm
            .write(|d| Ok(d.users.destroy(|u| u.id == id) > 0))
            .await
    }
}

#[async_trait]
impl ChatStore for JsonStore {
    async fn append_message(
        &self,
        message: NewChatMessage,
    ) -> Result<ChatMessage, RepositoryError> {
        self.orm
            .write(|d| Ok(d.chat_messages.create(message.into_message(Utc::now()))))
            .await
    }

    async fn session_messages(
        &self,
        user_id: UserId,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let mut messages = self
            .orm
            .read(|d| {
                d.chat_messages
                    .find_all(|m| m.user_id == user_id && m.session_id == session_id)
            })
            .await;
        // Stable: insertion order breaks timestamp ties.
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn delete_session(
        &self,
        user_id: UserId,
        session_id: &str,
    ) -> Result<u64, RepositoryError> {
        self.orm
            .write(|d| {
                let removed = d
                    .chat_messages
                    .destroy(|m| m.user_id == user_id && m.session_id == session_id);
                Ok(removed as u64)
            })
            .await
    }

    async fn delete_user_messages(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        self.orm
            .write(|d| Ok(d.chat_messages.destroy(|m| m.user_id == user_id) as u64))
            .await
    }
}

#[async_trait]
impl TransactionStore for JsonStore {
    async fn create_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, RepositoryError> {
        self.orm
            .write(|d| Ok(d.transactions.create(transaction.into_transaction(Utc::now()))))
            .await
    }

    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, RepositoryError> {
        Ok(self.orm.read(|d| d.transactions.find_by_id(id)).await)
    }

    async fn list_transactions(
        &self,
        buyer_id: Option<UserId>,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let mut transactions = self
            .orm
            .read(|d| {
                d.transactions
                    .find_all(|t| buyer_id.is_none_or(|buyer| t.buyer_id == buyer))
            })
            .await;
        transactions.reverse();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transactions)
    }

    async fn set_transaction_status(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        status: TransactionStatus,
    ) -> Result<Transaction, RepositoryError> {
        self.orm
            .write(|d| {
                let current = d
                    .transactions
                    .find_by_id(id)
                    .ok_or(RepositoryError::NotFound)?;
                if current.status != expected {
                    return Err(RepositoryError::Conflict(format!(
                        "transaction {id} is {}, expected {expected}",
                        current.status
                    )));
                }

                d.transactions
                    .update(id, |t| {
                        t.status = status;
                        t.updated_at = Utc::now();
                    })
                    .ok_or(RepositoryError::NotFound)
            })
            .await
    }
}

#[async_trait]
impl Store for JsonStore {
    fn backend(&self) -> &'static str {
        "json"
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
