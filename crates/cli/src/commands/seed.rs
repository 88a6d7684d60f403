//! Seed the store with sample data for local development.
//!
//! # Usage
//!
//! ```bash
//! wl-cli seed transactions -e ana@example.com -n 5
//! ```

use rust_decimal::Decimal;

use wanderlance_api::db::Store;
use wanderlance_api::models::Transaction;
use wanderlance_api::services::TransactionService;
use wanderlance_api::services::transactions::TransactionInput;
use wanderlance_core::{Email, TransactionStatus};

/// Sample listings: seller, description, price in cents.
const SAMPLES: &[(&str, &str, i64)] = &[
    ("Lena Fischer", "Berlin street photography walk", 8_500),
    ("Kenji Watanabe", "Kyoto temple itinerary planning", 12_000),
    ("Amara Okafor", "Lagos food tour with local guide", 6_500),
    ("Mateo Alvarez", "Patagonia trek route consultation", 20_000),
    ("Sofia Rossi", "Amalfi coast travel video edit", 35_000),
    ("Noah Bennett", "Iceland ring road drone footage", 45_000),
];

/// Insert `count` sample transactions bought by the account with `email`.
///
/// Every third transaction is marked paid so listings show mixed statuses.
///
/// # Errors
///
/// Returns an error if the account does not exist or a write fails.
pub async fn transactions(
    store: &dyn Store,
    email: &str,
    count: usize,
) -> Result<Vec<Transaction>, Box<dyn std::error::Error>> {
    let email = Email::parse(email)?;
    let buyer = store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| format!("No user with email: {email}"))?;

    let service = TransactionService::new(store);
    let mut created = Vec::with_capacity(count);

    for (i, (seller, description, cents)) in SAMPLES.iter().cycle().take(count).enumerate() {
        let transaction = service
            .create(
                buyer.id,
                TransactionInput {
                    seller_name: (*seller).to_string(),
                    description: (*description).to_string(),
                    amount: Decimal::new(*cents, 2),
                    currency: None,
                },
            )
            .await?;

        let transaction = if i % 3 == 2 {
            service
                .update_status(transaction.id, TransactionStatus::Paid)
                .await?
        } else {
            transaction
        };
        created.push(transaction);
    }

    tracing::info!(buyer_id = %buyer.id, count = created.len(), "Sample transactions seeded");
    Ok(created)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wanderlance_api::db::{JsonStore, TransactionStore};

    use super::*;
    use crate::commands::user;

    #[tokio::test]
    async fn test_seed_transactions() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("db.json")).await.unwrap();
        let buyer = user::create(&store, "ana@example.com", "ana", "long enough pw", "user")
            .await
            .unwrap();

        let seeded = transactions(&store, "ana@example.com", 8).await.unwrap();
        assert_eq!(seeded.len(), 8);

        let stored = store.list_transactions(Some(buyer.id)).await.unwrap();
        assert_eq!(stored.len(), 8);
        let paid = stored
            .iter()
            .filter(|t| t.status == TransactionStatus::Paid)
            .count();
        assert_eq!(paid, 2);
    }

    #[tokio::test]
    async fn test_seed_unknown_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("db.json")).await.unwrap();

        assert!(transactions(&store, "ghost@example.com", 1).await.is_err());
    }
}
