//! Persistence contracts for renewal-credential records and the per-user
//! generation counter.
//!
//! The only synchronization primitive the rotation flow relies on is
//! [`CredentialStore::try_consume`]: a single conditional `active -> used`
//! write. Implementations must make that flip atomic with respect to
//! concurrent callers presenting the same `jti`.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use mongodb::{bson::oid::ObjectId, error::ErrorKind};
use thiserror::Error;

use crate::models::{refresh_token::RefreshTokenDoc, user::UserDoc};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("record not found")]
    NotFound,

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("store call timed out")]
    Timeout,
}

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        if let ErrorKind::Write(mongodb::error::WriteFailure::WriteError(we)) = e.kind.as_ref() {
            if we.code == DUPLICATE_KEY {
                return StoreError::Duplicate(we.message.clone());
            }
        }
        StoreError::Backend(e.to_string())
    }
}

/// Result of the conditional `active -> used` flip.
#[derive(Debug, Clone)]
pub enum ConsumeOutcome {
    /// The flip succeeded; carries the record as it was before the flip.
    Consumed(RefreshTokenDoc),
    /// The record exists but was already `used` or `revoked`.
    AlreadySpent(RefreshTokenDoc),
    /// No record carries this id.
    Unknown,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn try_consume(&self, jti: &str) -> Result<ConsumeOutcome, StoreError>;

    async fn insert_active(&self, record: RefreshTokenDoc) -> Result<(), StoreError>;

    async fn find(&self, jti: &str) -> Result<Option<RefreshTokenDoc>, StoreError>;

    /// Marks every `active` record of the family `revoked`; `used` rows are
    /// left alone. Returns the number of records revoked.
    async fn revoke_family(&self, family_id: &str) -> Result<u64, StoreError>;

    /// Marks every `active` record owned by the subject `revoked`.
    async fn revoke_subject(&self, subject_id: &str) -> Result<u64, StoreError>;

    /// Atomically increments the subject's generation by exactly 1 and
    /// returns the new value.
    async fn bump_generation(&self, subject_id: &str) -> Result<i64, StoreError>;

    /// `None` when the subject does not exist.
    async fn get_generation(&self, subject_id: &str) -> Result<Option<i64>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: UserDoc) -> Result<(), StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserDoc>, StoreError>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<UserDoc>, StoreError>;
}

/// Runs one store round-trip under `limit`; elapsed becomes
/// [`StoreError::Timeout`].
pub async fn bounded<T, F>(limit: std::time::Duration, call: F) -> Result<T, StoreError>
where
    F: std::future::Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout)?
}
