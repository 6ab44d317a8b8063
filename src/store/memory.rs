use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use parking_lot::Mutex;

use super::{ConsumeOutcome, CredentialStore, StoreError, UserStore};
use crate::models::{
    refresh_token::{RefreshStatus, RefreshTokenDoc},
    user::UserDoc,
};

#[derive(Default)]
struct Inner {
    users: HashMap<ObjectId, UserDoc>,
    refresh_tokens: HashMap<String, RefreshTokenDoc>,
}

/// In-process store. Every operation runs under one lock, which makes the
/// conditional flip in `try_consume` atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records_in_family(&self, family_id: &str) -> Vec<RefreshTokenDoc> {
        self.inner
            .lock()
            .refresh_tokens
            .values()
            .filter(|r| r.family_id == family_id)
            .cloned()
            .collect()
    }
}

fn parse_subject(subject_id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(subject_id).ok()
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn try_consume(&self, jti: &str) -> Result<ConsumeOutcome, StoreError> {
        let mut inner = self.inner.lock();
        let Some(record) = inner.refresh_tokens.get_mut(jti) else {
            return Ok(ConsumeOutcome::Unknown);
        };
        if record.status != RefreshStatus::Active {
            return Ok(ConsumeOutcome::AlreadySpent(record.clone()));
        }
        let previous = record.clone();
        record.status = RefreshStatus::Used;
        record.used_at = Some(BsonDateTime::now());
        Ok(ConsumeOutcome::Consumed(previous))
    }

    async fn insert_active(&self, record: RefreshTokenDoc) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.refresh_tokens.contains_key(&record.jti) {
            return Err(StoreError::Duplicate(format!("jti {}", record.jti)));
        }
        inner.refresh_tokens.insert(
            record.jti.clone(),
            RefreshTokenDoc {
                status: RefreshStatus::Active,
                ..record
            },
        );
        Ok(())
    }

    async fn find(&self, jti: &str) -> Result<Option<RefreshTokenDoc>, StoreError> {
        Ok(self.inner.lock().refresh_tokens.get(jti).cloned())
    }

    async fn revoke_family(&self, family_id: &str) -> Result<u64, StoreError> {
        let now = BsonDateTime::now();
        let mut revoked = 0;
        for record in self
            .inner
            .lock()
            .refresh_tokens
            .values_mut()
            .filter(|r| r.family_id == family_id && r.status == RefreshStatus::Active)
        {
            record.status = RefreshStatus::Revoked;
            record.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn revoke_subject(&self, subject_id: &str) -> Result<u64, StoreError> {
        let now = BsonDateTime::now();
        let mut revoked = 0;
        for record in self
            .inner
            .lock()
            .refresh_tokens
            .values_mut()
            .filter(|r| r.user_id == subject_id && r.status == RefreshStatus::Active)
        {
            record.status = RefreshStatus::Revoked;
            record.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn bump_generation(&self, subject_id: &str) -> Result<i64, StoreError> {
        let id = parse_subject(subject_id).ok_or(StoreError::NotFound)?;
        let mut inner = self.inner.lock();
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.token_generation += 1;
        Ok(user.token_generation)
    }

    async fn get_generation(&self, subject_id: &str) -> Result<Option<i64>, StoreError> {
        let Some(id) = parse_subject(subject_id) else {
            return Ok(None);
        };
        Ok(self
            .inner
            .lock()
            .users
            .get(&id)
            .map(|u| u.token_generation))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: UserDoc) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("user already exists".into()));
        }
        inner.users.insert(user.id, user);
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserDoc>, StoreError> {
        Ok(self
            .inner
            .lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<UserDoc>, StoreError> {
        Ok(self.inner.lock().users.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{record, user};

    #[tokio::test]
    async fn consume_flips_once() {
        let store = MemoryStore::new();
        store.insert_active(record("j1", "u", "f1")).await.unwrap();

        match store.try_consume("j1").await.unwrap() {
            ConsumeOutcome::Consumed(prev) => assert_eq!(prev.status, RefreshStatus::Active),
            other => panic!("expected Consumed, got {other:?}"),
        }
        match store.try_consume("j1").await.unwrap() {
            ConsumeOutcome::AlreadySpent(rec) => {
                assert_eq!(rec.status, RefreshStatus::Used);
                assert!(rec.used_at.is_some());
            }
            other => panic!("expected AlreadySpent, got {other:?}"),
        }
        assert!(matches!(
            store.try_consume("missing").await.unwrap(),
            ConsumeOutcome::Unknown
        ));
    }

    #[tokio::test]
    async fn revoke_family_leaves_used_rows() {
        let store = MemoryStore::new();
        store.insert_active(record("j1", "u", "f1")).await.unwrap();
        store.insert_active(record("j2", "u", "f1")).await.unwrap();
        store.insert_active(record("j3", "u", "f2")).await.unwrap();
        store.try_consume("j1").await.unwrap();

        assert_eq!(store.revoke_family("f1").await.unwrap(), 1);

        let j1 = store.find("j1").await.unwrap().unwrap();
        let j2 = store.find("j2").await.unwrap().unwrap();
        let j3 = store.find("j3").await.unwrap().unwrap();
        assert_eq!(j1.status, RefreshStatus::Used);
        assert_eq!(j2.status, RefreshStatus::Revoked);
        assert_eq!(j3.status, RefreshStatus::Active);
    }

    #[tokio::test]
    async fn generation_bumps_by_one() {
        let store = MemoryStore::new();
        let u = user("a@example.com");
        let sub = u.subject_id();
        store.create(u).await.unwrap();

        assert_eq!(store.get_generation(&sub).await.unwrap(), Some(1));
        assert_eq!(store.bump_generation(&sub).await.unwrap(), 2);
        assert_eq!(store.bump_generation(&sub).await.unwrap(), 3);
        assert_eq!(store.get_generation(&sub).await.unwrap(), Some(3));

        assert_eq!(store.get_generation("nobody").await.unwrap(), None);
        assert!(matches!(
            store.bump_generation(&ObjectId::new().to_hex()).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let store = MemoryStore::new();
        store.create(user("a@example.com")).await.unwrap();
        assert!(matches!(
            store.create(user("a@example.com")).await,
            Err(StoreError::Duplicate(_))
        ));
    }
}
