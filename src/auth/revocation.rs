use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    cache::{profile_key, KvCache},
    store::{bounded, CredentialStore, StoreError},
};

/// Outcome of a reuse-triggered revocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revocation {
    pub family_revoked: u64,
    pub generation: i64,
}

/// Revokes credential families and bumps per-subject generations.
pub struct RevocationCoordinator {
    store: Arc<dyn CredentialStore>,
    cache: Arc<dyn KvCache>,
    timeout: Duration,
}

impl RevocationCoordinator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn KvCache>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            timeout,
        }
    }

    pub async fn revoke_family(&self, family_id: &str) -> Result<u64, StoreError> {
        bounded(self.timeout, self.store.revoke_family(family_id)).await
    }

    /// Bumps the subject's generation by exactly 1, invalidating every
    /// credential minted before.
    pub async fn revoke_user(&self, subject_id: &str) -> Result<i64, StoreError> {
        bounded(self.timeout, self.store.bump_generation(subject_id)).await
    }

    /// Family revocation plus generation bump, then profile eviction so the
    /// next verification reads the new generation.
    ///
    /// Both store steps are always attempted; if either fails the first error
    /// is returned.
    pub async fn reuse_detected(
        &self,
        family_id: &str,
        subject_id: &str,
    ) -> Result<Revocation, StoreError> {
        let family = self.revoke_family(family_id).await;
        let bump = self.revoke_user(subject_id).await;
        self.evict_profile(subject_id).await;

        let (family_revoked, generation) = match (family, bump) {
            (Ok(revoked), Ok(generation)) => (revoked, generation),
            (Err(e), _) | (Ok(_), Err(e)) => return Err(e),
        };

        warn!(
            subject = subject_id,
            family = family_id,
            family_revoked,
            generation,
            "refresh token reuse: family revoked, generation bumped"
        );
        Ok(Revocation {
            family_revoked,
            generation,
        })
    }

    /// "Log out everywhere": bump the generation and retire every still-active
    /// refresh record the subject owns.
    pub async fn revoke_everywhere(&self, subject_id: &str) -> Result<i64, StoreError> {
        let generation = self.revoke_user(subject_id).await?;
        let revoked = bounded(self.timeout, self.store.revoke_subject(subject_id)).await?;
        self.evict_profile(subject_id).await;

        info!(subject = subject_id, generation, revoked, "all sessions revoked");
        Ok(generation)
    }

    pub async fn evict_profile(&self, subject_id: &str) {
        if let Err(e) = self.cache.delete(&profile_key(subject_id)).await {
            warn!(subject = subject_id, error = %e, "profile eviction failed");
        }
    }
}
