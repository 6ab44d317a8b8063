//! Transient key-value cache used for the access-token blacklist and for
//! cached user profiles.
//!
//! Callers decide how to react when the cache cannot be reached: blacklist
//! writes and lookups fail open, profile eviction is best-effort.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait KvCache: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

pub fn profile_key(subject_id: &str) -> String {
    format!("profile:{subject_id}")
}
