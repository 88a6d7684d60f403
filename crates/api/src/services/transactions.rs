//! Marketplace transactions: creation, visibility, and status changes.

use rust_decimal::Decimal;
use thiserror::Error;

use wanderlance_core::{
    CurrencyCode, Money, MoneyError, TransactionId, TransactionStatus, UserId,
};

use crate::db::{RepositoryError, Store};
use crate::models::{NewTransaction, Transaction, User};

/// Longest accepted seller name, in characters.
pub const MAX_SELLER_NAME_LENGTH: usize = 100;

/// Longest accepted description, in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// Errors from transaction operations.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// A text field is empty or too long.
    #[error("{0}")]
    Validation(String),

    /// Amount negative or currency malformed.
    #[error(transparent)]
    InvalidAmount(#[from] MoneyError),

    #[error("transaction not found")]
    NotFound,

    /// The transaction is refunded or cancelled.
    #[error("transaction is already {0}")]
    Closed(TransactionStatus),

    #[error("cannot change status from {from} to {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Fields a buyer submits to record a purchase.
#[derive(Debug, Clone)]
pub struct TransactionInput {
    pub seller_name: String,
    pub description: String,
    pub amount: Decimal,
    /// Defaults to USD.
    pub currency: Option<String>,
}

fn required_text(field: &str, value: &str, max: usize) -> Result<String, TransactionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TransactionError::Validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > max {
        return Err(TransactionError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Service for transaction operations.
pub struct TransactionService<'a> {
    store: &'a dyn Store,
}

impl<'a> TransactionService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Record a purchase by `buyer`. New transactions start as `processing`.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::Validation` or
    /// `TransactionError::InvalidAmount` for bad input.
    pub async fn create(
        &self,
        buyer: UserId,
        input: TransactionInput,
    ) -> Result<Transaction, TransactionError> {
        let seller_name = required_text("Seller name", &input.seller_name, MAX_SELLER_NAME_LENGTH)?;
        let description = required_text("Description", &input.description, MAX_DESCRIPTION_LENGTH)?;
        let currency = input
            .currency
            .as_deref()
            .map(CurrencyCode::parse)
            .transpose()?
            .unwrap_or_default();
        let price = Money::new(input.amount, currency)?;

        let transaction = self
            .store
            .create_transaction(NewTransaction {
                buyer_id: buyer,
                seller_name,
                description,
                price,
                status: TransactionStatus::Processing,
            })
            .await?;

        tracing::info!(
            transaction_id = %transaction.id,
            buyer_id = %buyer,
            total = %transaction.total(),
            "Transaction recorded"
        );
        Ok(transaction)
    }

    /// Transactions visible to `viewer`: their own, or all for admins.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::Repository` if the store cannot be read.
    pub async fn list(&self, viewer: &User) -> Result<Vec<Transaction>, TransactionError> {
        let buyer = (!viewer.role.is_admin()).then_some(viewer.id);
        Ok(self.store.list_transactions(buyer).await?)
    }

    /// One transaction, if `viewer` owns it or is an admin.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::NotFound` if it does not exist or belongs
    /// to someone else.
    pub async fn get(
        &self,
        viewer: &User,
        id: TransactionId,
    ) -> Result<Transaction, TransactionError> {
        let transaction = self
            .store
            .find_transaction(id)
            .await?
            .ok_or(TransactionError::NotFound)?;

        if transaction.buyer_id != viewer.id && !viewer.role.is_admin() {
            return Err(TransactionError::NotFound);
        }
        Ok(transaction)
    }

    /// Move a transaction to `status`. Setting the current status is a no-op.
    ///
    /// The check and the write happen against the same stored status, so of
    /// two racing moves out of one status only the first lands.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::NotFound`, `TransactionError::Closed` for
    /// refunded or cancelled transactions, or
    /// `TransactionError::InvalidTransition`.
    pub async fn update_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction, TransactionError> {
        let current = self
            .store
            .find_transaction(id)
            .await?
            .ok_or(TransactionError::NotFound)?;

        if current.status == status {
            return Ok(current);
        }
        if current.status.is_terminal() {
            return Err(TransactionError::Closed(current.status));
        }
        if !current.status.can_transition_to(status) {
            return Err(TransactionError::InvalidTransition {
                from: current.status,
                to: status,
            });
        }

        let updated = match self
            .store
            .set_transaction_status(id, current.status, status)
            .await
        {
            Ok(updated) => updated,
            Err(RepositoryError::NotFound) => return Err(TransactionError::NotFound),
            Err(RepositoryError::Conflict(_)) => return self.lost_race(id, status).await,
            Err(other) => return Err(other.into()),
        };

        tracing::info!(transaction_id = %id, from = %current.status, to = %status, "Transaction status changed");
        Ok(updated)
    }

    /// Another writer moved the transaction between our read and write.
    async fn lost_race(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction, TransactionError> {
        let latest = self
            .store
            .find_transaction(id)
            .await?
            .ok_or(TransactionError::NotFound)?;

        tracing::warn!(transaction_id = %id, now = %latest.status, wanted = %status, "Concurrent status change");
        if latest.status == status {
            return Ok(latest);
        }
        Err(TransactionError::InvalidTransition {
            from: latest.status,
            to: status,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use wanderlance_core::{Email, UserRole, Username};

    use super::*;
    use crate::db::JsonStore;
    use crate::models::NewUser;

    fn user(role: UserRole) -> User {
        let mut user = NewUser::with_password(
            Username::parse("buyer").unwrap(),
            Email::parse("buyer@example.com").unwrap(),
            "$argon2id$x".to_string(),
        )
        .into_user(Utc::now());
        user.role = role;
        user
    }

    fn input(amount: Decimal) -> TransactionInput {
        TransactionInput {
            seller_name: "Lena Fischer".to_string(),
            description: "City photo walk".to_string(),
            amount,
            currency: None,
        }
    }

    async fn store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("db.json")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let (_dir, store) = store().await;
        let service = TransactionService::new(&store);
        let buyer = user(UserRole::User);

        let created = service
            .create(buyer.id, input(Decimal::new(9900, 2)))
            .await
            .unwrap();
        assert_eq!(created.status, TransactionStatus::Processing);
        assert_eq!(created.currency.as_str(), "USD");
        assert_eq!(created.buyer_id, buyer.id);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (_dir, store) = store().await;
        let service = TransactionService::new(&store);
        let buyer = UserId::generate();

        assert!(matches!(
            service.create(buyer, input(Decimal::new(-1, 0))).await,
            Err(TransactionError::InvalidAmount(MoneyError::Negative))
        ));

        let mut bad_currency = input(Decimal::ONE);
        bad_currency.currency = Some("dollars".to_string());
        assert!(matches!(
            service.create(buyer, bad_currency).await,
            Err(TransactionError::InvalidAmount(_))
        ));

        let mut blank = input(Decimal::ONE);
        blank.seller_name = "   ".to_string();
        assert!(matches!(
            service.create(buyer, blank).await,
            Err(TransactionError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_visibility() {
        let (_dir, store) = store().await;
        let service = TransactionService::new(&store);
        let buyer = user(UserRole::User);
        let stranger = User {
            id: UserId::generate(),
            ..user(UserRole::User)
        };
        let admin = User {
            id: UserId::generate(),
            ..user(UserRole::Admin)
        };

        let created = service.create(buyer.id, input(Decimal::TEN)).await.unwrap();
        service.create(stranger.id, input(Decimal::TEN)).await.unwrap();

        assert_eq!(service.list(&buyer).await.unwrap().len(), 1);
        assert_eq!(service.list(&admin).await.unwrap().len(), 2);
        assert!(service.get(&buyer, created.id).await.is_ok());
        assert!(service.get(&admin, created.id).await.is_ok());
        assert!(matches!(
            service.get(&stranger, created.id).await,
            Err(TransactionError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let (_dir, store) = store().await;
        let service = TransactionService::new(&store);
        let created = service
            .create(UserId::generate(), input(Decimal::TEN))
            .await
            .unwrap();

        let same = service
            .update_status(created.id, TransactionStatus::Processing)
            .await
            .unwrap();
        assert_eq!(same.updated_at, created.updated_at);

        assert!(matches!(
            service
                .update_status(created.id, TransactionStatus::Refunded)
                .await,
            Err(TransactionError::InvalidTransition { .. })
        ));

        service
            .update_status(created.id, TransactionStatus::Paid)
            .await
            .unwrap();
        let refunded = service
            .update_status(created.id, TransactionStatus::Refunded)
            .await
            .unwrap();
        assert_eq!(refunded.status, TransactionStatus::Refunded);

        assert!(matches!(
            service
                .update_status(created.id, TransactionStatus::Paid)
                .await,
            Err(TransactionError::Closed(TransactionStatus::Refunded))
        ));
        assert!(matches!(
            service
                .update_status(TransactionId::generate(), TransactionStatus::Paid)
                .await,
            Err(TransactionError::NotFound)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_moves_out_of_processing_settle_on_one() {
        let (_dir, store) = store().await;
        let store = std::sync::Arc::new(store);

        for _ in 0..25 {
            let created = TransactionService::new(store.as_ref())
                .create(UserId::generate(), input(Decimal::TEN))
                .await
                .unwrap();
            let barrier = std::sync::Arc::new(tokio::sync::Barrier::new(2));

            let handles: Vec<_> = [TransactionStatus::Paid, TransactionStatus::Cancelled]
                .into_iter()
                .map(|target| {
                    let store = std::sync::Arc::clone(&store);
                    let barrier = std::sync::Arc::clone(&barrier);
                    tokio::spawn(async move {
                        barrier.wait().await;
                        TransactionService::new(store.as_ref())
                            .update_status(created.id, target)
                            .await
                            .map(|t| t.status)
                    })
                })
                .collect();

            let mut accepted = Vec::new();
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(status) => accepted.push(status),
                    Err(e) => assert!(
                        matches!(e, TransactionError::Closed(_) | TransactionError::InvalidTransition { .. }),
                        "unexpected error: {e}"
                    ),
                }
            }

            assert_eq!(accepted.len(), 1, "both moves accepted: {accepted:?}");
            let stored = TransactionService::new(store.as_ref())
                .update_status(created.id, accepted[0])
                .await
                .unwrap();
            assert_eq!(stored.status, accepted[0]);
        }
    }
}
