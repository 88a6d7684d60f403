//! `SQLite` repositories.
//!
//! Queries are checked at runtime (`query_as` + `FromRow`); identifiers,
//! enums and decimals are stored as TEXT and parsed back through the core
//! types, so a bad value surfaces as `RepositoryError::DataCorruption`.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use wanderlance_core::{
    ChatMessageId, ChatRole, CurrencyCode, Email, OAuthProvider, TransactionId,
    TransactionStatus, UserId, UserRole, Username,
};

use super::{ChatStore, RepositoryError, Store, TransactionStore, UserStore};
use crate::models::{ChatMessage, NewChatMessage, NewTransaction, NewUser, Transaction, User};

/// Embedded schema migrations from `crates/api/migrations/`.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

// =============================================================================
// Internal Row Types
// =============================================================================

fn parse_column<T>(column: &str, value: &str) -> Result<T, RepositoryError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| RepositoryError::DataCorruption(format!("{column} {value:?}: {e}")))
}

const USER_COLUMNS: &str = "id, username, email, password_hash, google_id, github_id, \
     display_name, profile_picture, role, is_email_verified, last_login, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    password_hash: Option<String>,
    google_id: Option<String>,
    github_id: Option<String>,
    display_name: Option<String>,
    profile_picture: Option<String>,
    role: String,
    is_email_verified: bool,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_column::<UserId>("users.id", &row.id)?,
            username: parse_column::<Username>("users.username", &row.username)?,
            email: parse_column::<Email>("users.email", &row.email)?,
            password_hash: row.password_hash,
            google_id: row.google_id,
            github_id: row.github_id,
            display_name: row.display_name,
            profile_picture: row.profile_picture,
            role: parse_column::<UserRole>("users.role", &row.role)?,
            is_email_verified: row.is_email_verified,
            last_login: row.last_login,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChatMessageRow {
    id: String,
    session_id: String,
    user_id: String,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ChatMessageRow> for ChatMessage {
    type Error = RepositoryError;

    fn try_from(row: ChatMessageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_column::<ChatMessageId>("chat_messages.id", &row.id)?,
            session_id: row.session_id,
            user_id: parse_column::<UserId>("chat_messages.user_id", &row.user_id)?,
            role: parse_column::<ChatRole>("chat_messages.role", &row.role)?,
            content: row.content,
            created_at: row.created_at,
        })
    }
}

const TRANSACTION_COLUMNS: &str =
    "id, buyer_id, seller_name, description, amount, currency, status, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: String,
    buyer_id: String,
    seller_name: String,
    description: String,
    amount: String,
    currency: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = RepositoryError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let currency = CurrencyCode::parse(&row.currency).map_err(|e| {
            RepositoryError::DataCorruption(format!("transactions.currency: {e}"))
        })?;

        Ok(Self {
            id: parse_column::<TransactionId>("transactions.id", &row.id)?,
            buyer_id: parse_column::<UserId>("transactions.buyer_id", &row.buyer_id)?,
            seller_name: row.seller_name,
            description: row.description,
            amount: parse_column::<Decimal>("transactions.amount", &row.amount)?,
            currency,
            status: parse_column::<TransactionStatus>("transactions.status", &row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn map_unique_violation(err: sqlx::Error, email: &Email) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(format!("email already registered: {email}"))
        }
        _ => RepositoryError::Database(err),
    }
}

// =============================================================================
// Store
// =============================================================================

/// `SQLite`-backed store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `database_url`, creating the database file if needed.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` if the connection cannot be established.
    pub async fn connect(database_url: &SecretString) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url.expose_secret())?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails to apply.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.pool).await
    }

    /// Get the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_user(&self, clause: &str, value: &str) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause} = ?");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let user = user.into_user(Utc::now());

        sqlx::query(
            r"
            INSERT INTO users (id, username, email, password_hash, google_id, github_id,
                               display_name, profile_picture, role, is_email_verified,
                               last_login, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(user.id.to_string())
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(user.password_hash.as_deref())
        .bind(user.google_id.as_deref())
        .bind(user.github_id.as_deref())
        .bind(user.display_name.as_deref())
        .bind(user.profile_picture.as_deref())
        .bind(user.role.to_string())
        .bind(user.is_email_verified)
        .bind(user.last_login)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &user.email))?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        self.fetch_user("id", &id.to_string()).await
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        self.fetch_user("email", email.as_str()).await
    }

    async fn find_user_by_oauth_id(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let column = match provider {
            OAuthProvider::Google => "google_id",
            OAuthProvider::Github => "github_id",
        };
        self.fetch_user(column, provider_id).await
    }

    async fn username_taken(&self, username: &Username) -> Result<bool, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, rowid");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn update_user(&self, user: &User) -> Result<User, RepositoryError> {
        let updated_at = Utc::now();

        let result = sqlx::query(
            r"
            UPDATE users
            SET username = ?, email = ?, password_hash = ?, google_id = ?, github_id = ?,
                display_name = ?, profile_picture = ?, role = ?, is_email_verified = ?,
                last_login = ?, updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(user.password_hash.as_deref())
        .bind(user.google_id.as_deref())
        .bind(user.github_id.as_deref())
        .bind(user.display_name.as_deref())
        .bind(user.profile_picture.as_deref())
        .bind(user.role.to_string())
        .bind(user.is_email_verified)
        .bind(user.last_login)
        .bind(updated_at)
        .bind(user.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &user.email))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.find_user_by_id(user.id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
    async fn append_message(
        &self,
        message: NewChatMessage,
    ) -> Result<ChatMessage, RepositoryError> {
        let message = message.into_message(Utc::now());

        sqlx::query(
            r"
            INSERT INTO chat_messages (id, session_id, user_id, role, content, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(message.id.to_string())
        .bind(&message.session_id)
        .bind(message.user_id.to_string())
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        Ok(message)
    }

    async fn session_messages(
        &self,
        user_id: UserId,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query_as::<_, ChatMessageRow>(
            r"
            SELECT id, session_id, user_id, role, content, created_at
            FROM chat_messages
            WHERE user_id = ? AND session_id = ?
            ORDER BY created_at, rowid
            ",
        )
        .bind(user_id.to_string())
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ChatMessage::try_from).collect()
    }

    async fn delete_session(
        &self,
        user_id: UserId,
        session_id: &str,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE user_id = ? AND session_id = ?")
            .bind(user_id.to_string())
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_user_messages(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TransactionStore for SqliteStore {
    async fn create_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, RepositoryError> {
        let transaction = transaction.into_transaction(Utc::now());

        sqlx::query(
            r"
            INSERT INTO transactions (id, buyer_id, seller_name, description, amount,
                                      currency, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(transaction.id.to_string())
        .bind(transaction.buyer_id.to_string())
        .bind(&transaction.seller_name)
        .bind(&transaction.description)
        .bind(transaction.amount.to_string())
        .bind(transaction.currency.as_str())
        .bind(transaction.status.to_string())
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(transaction)
    }

    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, RepositoryError> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?");
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn list_transactions(
        &self,
        buyer_id: Option<UserId>,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE (?1 IS NULL OR buyer_id = ?1) \
             ORDER BY created_at DESC, rowid DESC"
        );
        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(buyer_id.map(|id| id.to_string()))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn set_transaction_status(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        status: TransactionStatus,
    ) -> Result<Transaction, RepositoryError> {
        let result = sqlx::query(
            "UPDATE transactions SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(status.to_string())
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(expected.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.find_transaction(id).await? {
                Some(current) => Err(RepositoryError::Conflict(format!(
                    "transaction {id} is {}, expected {expected}",
                    current.status
                ))),
                None => Err(RepositoryError::NotFound),
            };
        }

        self.find_transaction(id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wanderlance_core::Money;

    use super::*;

    async fn store() -> SqliteStore {
        // One connection so every query sees the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteStore::from_pool(pool);
        store.migrate().await.unwrap();
        store
    }

    fn new_user(email: &str) -> NewUser {
        NewUser::with_password(
            Username::parse("traveller").unwrap(),
            Email::parse(email).unwrap(),
            "$argon2id$placeholder".to_string(),
        )
    }

    #[tokio::test]
    async fn test_user_round_trip_and_unique_email() {
        let store = store().await;
        let created = store.create_user(new_user("ana@example.com")).await.unwrap();

        let found = store
            .find_user_by_email(&Email::parse("ana@example.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.role, UserRole::User);

        let err = store
            .create_user(new_user("ana@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_user_links_provider() {
        let store = store().await;
        let mut user = store.create_user(new_user("bo@example.com")).await.unwrap();

        user.google_id = Some("g-123".to_string());
        user.role = UserRole::Admin;
        store.update_user(&user).await.unwrap();

        let linked = store
            .find_user_by_oauth_id(OAuthProvider::Google, "g-123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(linked.id, user.id);
        assert!(linked.role.is_admin());
    }

    #[tokio::test]
    async fn test_delete_session_scoped_to_user_and_session() {
        let store = store().await;
        let ana = UserId::generate();
        let bo = UserId::generate();

        for (user, session) in [(ana, "s1"), (ana, "s1"), (ana, "s2"), (bo, "s1")] {
            store
                .append_message(NewChatMessage {
                    session_id: session.to_string(),
                    user_id: user,
                    role: ChatRole::User,
                    content: "hola".to_string(),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.delete_session(ana, "s1").await.unwrap(), 2);
        assert_eq!(store.session_messages(ana, "s2").await.unwrap().len(), 1);
        assert_eq!(store.session_messages(bo, "s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transactions_filter_and_status() {
        let store = store().await;
        let buyer = UserId::generate();
        let other = UserId::generate();

        let mut created = Vec::new();
        for id in [buyer, buyer, other] {
            created.push(
                store
                    .create_transaction(NewTransaction {
                        buyer_id: id,
                        seller_name: "Lena".to_string(),
                        description: "Logo design".to_string(),
                        price: Money::new(Decimal::new(12_050, 2), CurrencyCode::default())
                            .unwrap(),
                        status: TransactionStatus::Processing,
                    })
                    .await
                    .unwrap(),
            );
        }

        assert_eq!(store.list_transactions(Some(buyer)).await.unwrap().len(), 2);
        assert_eq!(store.list_transactions(None).await.unwrap().len(), 3);

        let paid = store
            .set_transaction_status(
                created[0].id,
                TransactionStatus::Processing,
                TransactionStatus::Paid,
            )
            .await
            .unwrap();
        assert_eq!(paid.status, TransactionStatus::Paid);
        assert_eq!(paid.amount, Decimal::new(12_050, 2));

        let stale = store
            .set_transaction_status(
                created[0].id,
                TransactionStatus::Processing,
                TransactionStatus::Cancelled,
            )
            .await
            .unwrap_err();
        assert!(matches!(stale, RepositoryError::Conflict(_)));
        let reloaded = store.find_transaction(created[0].id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, TransactionStatus::Paid);

        let err = store
            .set_transaction_status(
                TransactionId::generate(),
                TransactionStatus::Processing,
                TransactionStatus::Paid,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
