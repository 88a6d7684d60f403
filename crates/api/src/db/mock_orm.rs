//! A tiny ORM over a single JSON document.
//!
//! The document holds one array per collection. Reads run against an
//! in-memory copy; each write clones the document, applies the mutation,
//! persists it (temp file + rename in the same directory) and only then
//! swaps it in. The mutex is held across the whole read-modify-write so
//! concurrent writers cannot lose each other's updates.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use wanderlance_core::{ChatMessageId, TransactionId, UserId};

use super::RepositoryError;
use crate::models::{ChatMessage, Transaction, User};

/// On-disk layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub chat_messages: Vec<ChatMessage>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// A row with a primary key.
pub trait Record: Clone {
    type Id: PartialEq + Copy;

    fn id(&self) -> Self::Id;
}

impl Record for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

impl Record for ChatMessage {
    type Id = ChatMessageId;

    fn id(&self) -> ChatMessageId {
        self.id
    }
}

impl Record for Transaction {
    type Id = TransactionId;

    fn id(&self) -> TransactionId {
        self.id
    }
}

/// Query and mutation helpers for one collection.
pub trait Collection<T: Record> {
    /// Every record matching `predicate`, in insertion order.
    fn find_all(&self, predicate: impl Fn(&T) -> bool) -> Vec<T>;

    /// The first record matching `predicate`.
    fn find_one(&self, predicate: impl Fn(&T) -> bool) -> Option<T>;

    fn find_by_id(&self, id: T::Id) -> Option<T>;

    /// Append a record and return it.
    fn create(&mut self, record: T) -> T;

    /// Mutate a record in place. Returns the updated copy, or `None` if
    /// no record has this ID.
    fn update(&mut self, id: T::Id, mutate: impl FnOnce(&mut T)) -> Option<T>;

    /// Remove every record matching `predicate`; returns how many went.
    fn destroy(&mut self, predicate: impl Fn(&T) -> bool) -> usize;
}

impl<T: Record> Collection<T> for Vec<T> {
    fn find_all(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.iter().filter(|r| predicate(r)).cloned().collect()
    }

    fn find_one(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.iter().find(|r| predicate(r)).cloned()
    }

    fn find_by_id(&self, id: T::Id) -> Option<T> {
        self.find_one(|r| r.id() == id)
    }

    fn create(&mut self, record: T) -> T {
        self.push(record.clone());
        record
    }

    fn update(&mut self, id: T::Id, mutate: impl FnOnce(&mut T)) -> Option<T> {
        let record = self.iter_mut().find(|r| r.id() == id)?;
        mutate(record);
        Some(record.clone())
    }

    fn destroy(&mut self, predicate: impl Fn(&T) -> bool) -> usize {
        let before = self.len();
        self.retain(|r| !predicate(r));
        before - self.len()
    }
}

/// The JSON document plus the file it lives in.
#[derive(Debug)]
pub struct MockOrm {
    path: PathBuf,
    document: Mutex<Document>,
}

impl MockOrm {
    /// Load the document at `path`. A missing or empty file is an empty
    /// document; nothing is written until the first mutation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Io` if the file exists but cannot be read,
    /// or `RepositoryError::DataCorruption` if it is not a valid document.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();

        let document = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Document::default(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                RepositoryError::DataCorruption(format!("{}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a read-only query against the current document.
    pub async fn read<R>(&self, query: impl FnOnce(&Document) -> R) -> R {
        let document = self.document.lock().await;
        query(&document)
    }

    /// Apply a mutation and persist it.
    ///
    /// If `mutate` fails or the file cannot be written, the in-memory
    /// document is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the error from `mutate`, or `RepositoryError::Io` if the
    /// document could not be written.
    pub async fn write<R>(
        &self,
        mutate: impl FnOnce(&mut Document) -> Result<R, RepositoryError>,
    ) -> Result<R, RepositoryError> {
        let mut document = self.document.lock().await;

        let mut next = document.clone();
        let result = mutate(&mut next)?;
        persist(&self.path, &next).await?;
        *document = next;

        Ok(result)
    }
}

async fn persist(path: &Path, document: &Document) -> Result<(), RepositoryError> {
    let bytes = serde_json::to_vec_pretty(document)
        .map_err(|e| RepositoryError::DataCorruption(format!("serialize document: {e}")))?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;
    use wanderlance_core::{CurrencyCode, Money, TransactionStatus};

    use super::*;
    use crate::models::NewTransaction;

    fn transaction(seller: &str) -> Transaction {
        NewTransaction {
            buyer_id: UserId::generate(),
            seller_name: seller.to_string(),
            description: "Walking tour".to_string(),
            price: Money::new(Decimal::new(4500, 2), CurrencyCode::default()).unwrap(),
            status: TransactionStatus::Processing,
        }
        .into_transaction(Utc::now())
    }

    #[test]
    fn test_collection_operations() {
        let mut rows: Vec<Transaction> = Vec::new();
        let a = rows.create(transaction("Ana"));
        let b = rows.create(transaction("Bo"));
        rows.create(transaction("Ana"));

        assert_eq!(rows.find_all(|t| t.seller_name == "Ana").len(), 2);
        assert_eq!(rows.find_by_id(b.id).unwrap().seller_name, "Bo");
        assert!(rows.find_one(|t| t.seller_name == "Cy").is_none());

        let updated = rows
            .update(a.id, |t| t.status = TransactionStatus::Paid)
            .unwrap();
        assert_eq!(updated.status, TransactionStatus::Paid);
        assert!(rows.update(TransactionId::generate(), |_| {}).is_none());

        assert_eq!(rows.destroy(|t| t.seller_name == "Ana"), 2);
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_and_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("db.json");

        let orm = MockOrm::open(&path).await.unwrap();
        assert!(orm.read(|d| d.users.is_empty()).await);
        assert!(!path.exists());

        orm.write(|d| Ok(d.transactions.create(transaction("Ana"))))
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_document_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");

        let created = {
            let orm = MockOrm::open(&path).await.unwrap();
            orm.write(|d| Ok(d.transactions.create(transaction("Ana"))))
                .await
                .unwrap()
        };

        let reopened = MockOrm::open(&path).await.unwrap();
        let found = reopened
            .read(|d| d.transactions.find_by_id(created.id))
            .await;
        assert_eq!(found, Some(created));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"chatMessages\""));
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_document_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let orm = MockOrm::open(dir.path().join("db.json")).await.unwrap();

        let result: Result<(), _> = orm
            .write(|d| {
                d.transactions.create(transaction("Ana"));
                Err(RepositoryError::Conflict("nope".to_string()))
            })
            .await;

        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
        assert_eq!(orm.read(|d| d.transactions.len()).await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_creates_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let orm = Arc::new(MockOrm::open(&path).await.unwrap());

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let orm = Arc::clone(&orm);
                tokio::spawn(async move {
                    orm.write(|d| Ok(d.transactions.create(transaction(&format!("s{i}")))))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(orm.read(|d| d.transactions.len()).await, 20);
        let reopened = MockOrm::open(&path).await.unwrap();
        assert_eq!(reopened.read(|d| d.transactions.len()).await, 20);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = MockOrm::open(&path).await.unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(_)));
    }
}
