//! Transaction (order) records backing the portfolio/checkout screens.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use wanderlance_core::{CurrencyCode, Money, TransactionId, TransactionStatus, UserId};

/// A purchase of a listing by a buyer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub buyer_id: UserId,
    pub seller_name: String,
    pub description: String,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Amount and currency as a single value.
    #[must_use]
    pub fn total(&self) -> Money {
        Money {
            amount: self.amount,
            currency: self.currency.clone(),
        }
    }
}

/// Fields needed to insert a transaction.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub buyer_id: UserId,
    pub seller_name: String,
    pub description: String,
    pub price: Money,
    pub status: TransactionStatus,
}

impl NewTransaction {
    /// Materialize the record with a fresh id and timestamps.
    #[must_use]
    pub fn into_transaction(self, now: DateTime<Utc>) -> Transaction {
        Transaction {
            id: TransactionId::generate(),
            buyer_id: self.buyer_id,
            seller_name: self.seller_name,
            description: self.description,
            amount: self.price.amount,
            currency: self.price.currency,
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}
