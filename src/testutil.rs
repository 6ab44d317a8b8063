//! Fixtures and failure-injecting doubles for unit tests.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};

use crate::{
    auth::jwt::TokenSigner,
    cache::{CacheError, KvCache, MemoryCache},
    config::{Config, JwtSettings, StoreBackend},
    models::{
        refresh_token::{RefreshStatus, RefreshTokenDoc},
        user::{UserDoc, INITIAL_GENERATION},
    },
    services::session::SessionService,
    state::AppState,
    store::{ConsumeOutcome, CredentialStore, MemoryStore, StoreError, UserStore},
};

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        access_secret: "access-secret-for-tests-0123456789".into(),
        refresh_secret: "refresh-secret-for-tests-9876543210".into(),
        issuer: "session-auth-test".into(),
        audience: "session-auth-test-clients".into(),
        access_ttl_seconds: 15 * 60,
        refresh_ttl_seconds: 7 * 24 * 60 * 60,
    }
}

pub fn signer() -> Arc<TokenSigner> {
    Arc::new(TokenSigner::new(&jwt_settings()))
}

pub fn user(email: &str) -> UserDoc {
    UserDoc {
        id: ObjectId::new(),
        email: email.to_string(),
        name: "Test User".into(),
        password_hash: String::new(),
        created_at: BsonDateTime::now(),
        token_generation: INITIAL_GENERATION,
    }
}

pub fn record(jti: &str, user_id: &str, family_id: &str) -> RefreshTokenDoc {
    RefreshTokenDoc {
        jti: jti.to_string(),
        user_id: user_id.to_string(),
        family_id: family_id.to_string(),
        parent_jti: None,
        status: RefreshStatus::Active,
        token_hash: format!("hash-{jti}"),
        created_at: BsonDateTime::now(),
        expires_at: BsonDateTime::from_millis(
            (Utc::now() + chrono::Duration::days(7)).timestamp_millis(),
        ),
        used_at: None,
        revoked_at: None,
    }
}

/// Memory store seeded with one user; returns the store and the subject id.
pub async fn store_with_user() -> (Arc<MemoryStore>, String) {
    let store = Arc::new(MemoryStore::new());
    let u = user("u1@example.com");
    let subject = u.subject_id();
    store.create(u).await.unwrap();
    (store, subject)
}

pub fn session_over(
    store: Arc<dyn CredentialStore>,
    cache: Arc<dyn KvCache>,
) -> SessionService {
    SessionService::new(signer(), store, cache, Duration::from_millis(500))
}

pub async fn session_with_user() -> (SessionService, Arc<MemoryStore>, Arc<MemoryCache>, String) {
    let (store, subject) = store_with_user().await;
    let cache = Arc::new(MemoryCache::new(1_000));
    let session = session_over(store.clone(), cache.clone());
    (session, store, cache, subject)
}

pub fn test_config() -> Config {
    Config {
        store: StoreBackend::Memory,
        jwt: jwt_settings(),
        store_timeout: Duration::from_millis(500),
        profile_cache_ttl: Duration::from_secs(60),
        cache_max_entries: 1_000,
        bind_addr: "127.0.0.1:0".into(),
    }
}

pub fn test_state() -> AppState {
    let store = Arc::new(MemoryStore::new());
    AppState::from_parts(
        &test_config(),
        store.clone(),
        store,
        Arc::new(MemoryCache::new(1_000)),
    )
}

/// Cache whose every call fails, standing in for an unreachable server.
pub struct DownCache;

#[async_trait]
impl KvCache for DownCache {
    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

/// Wraps a store and delays or fails selected calls.
pub struct FaultyStore {
    pub inner: Arc<MemoryStore>,
    pub consume_delay: Option<Duration>,
    pub fail_insert: bool,
    pub fail_revoke_family: bool,
}

impl FaultyStore {
    pub fn slow(inner: Arc<MemoryStore>, delay: Duration) -> Self {
        Self {
            inner,
            consume_delay: Some(delay),
            fail_insert: false,
            fail_revoke_family: false,
        }
    }

    pub fn failing_insert(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            consume_delay: None,
            fail_insert: true,
            fail_revoke_family: false,
        }
    }

    pub fn failing_family_revoke(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            consume_delay: None,
            fail_insert: false,
            fail_revoke_family: true,
        }
    }
}

#[async_trait]
impl CredentialStore for FaultyStore {
    async fn try_consume(&self, jti: &str) -> Result<ConsumeOutcome, StoreError> {
        if let Some(delay) = self.consume_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.try_consume(jti).await
    }

    async fn insert_active(&self, record: RefreshTokenDoc) -> Result<(), StoreError> {
        // login goes through here too; only rotations carry a parent
        if self.fail_insert && record.parent_jti.is_some() {
            return Err(StoreError::Backend("connection reset".into()));
        }
        self.inner.insert_active(record).await
    }

    async fn find(&self, jti: &str) -> Result<Option<RefreshTokenDoc>, StoreError> {
        self.inner.find(jti).await
    }

    async fn revoke_family(&self, family_id: &str) -> Result<u64, StoreError> {
        if self.fail_revoke_family {
            return Err(StoreError::Backend("write concern timeout".into()));
        }
        self.inner.revoke_family(family_id).await
    }

    async fn revoke_subject(&self, subject_id: &str) -> Result<u64, StoreError> {
        self.inner.revoke_subject(subject_id).await
    }

    async fn bump_generation(&self, subject_id: &str) -> Result<i64, StoreError> {
        self.inner.bump_generation(subject_id).await
    }

    async fn get_generation(&self, subject_id: &str) -> Result<Option<i64>, StoreError> {
        self.inner.get_generation(subject_id).await
    }
}
