//! Public session operations: `login`, `refresh`, `logout`, `verify`.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    auth::{
        blacklist::Blacklist,
        jwt::{TokenError, TokenKind, TokenSigner},
        revocation::RevocationCoordinator,
        rotation::RotationEngine,
        tokens::{mint_pair, IssuedTokens},
    },
    cache::KvCache,
    errors::AppError,
    store::{bounded, CredentialStore},
};

/// Identity established by a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub subject_id: String,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionService {
    signer: Arc<TokenSigner>,
    store: Arc<dyn CredentialStore>,
    blacklist: Blacklist,
    revocation: Arc<RevocationCoordinator>,
    rotation: RotationEngine,
    timeout: Duration,
}

impl SessionService {
    pub fn new(
        signer: Arc<TokenSigner>,
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn KvCache>,
        store_timeout: Duration,
    ) -> Self {
        let revocation = Arc::new(RevocationCoordinator::new(
            store.clone(),
            cache.clone(),
            store_timeout,
        ));
        let rotation = RotationEngine::new(
            signer.clone(),
            store.clone(),
            revocation.clone(),
            store_timeout,
        );
        Self {
            signer,
            store,
            blacklist: Blacklist::new(cache),
            revocation,
            rotation,
            timeout: store_timeout,
        }
    }

    /// Starts a new credential family for an already-authenticated subject.
    pub async fn login(&self, subject_id: &str) -> Result<IssuedTokens, AppError> {
        let generation = bounded(self.timeout, self.store.get_generation(subject_id))
            .await?
            .ok_or(AppError::Unauthorized)?;

        let minted = mint_pair(&self.signer, subject_id, generation, None, None)?;
        let family = minted.record.family_id.clone();
        bounded(self.timeout, self.store.insert_active(minted.record)).await?;

        info!(subject = subject_id, family = %family, generation, "session started");
        Ok(minted.tokens)
    }

    /// Rotates a refresh token. `ReuseDetected` means every session of the
    /// subject is gone and the client must log in again.
    pub async fn refresh(&self, raw_refresh_token: &str) -> Result<IssuedTokens, AppError> {
        self.rotation.rotate(raw_refresh_token).await
    }

    /// Blacklists the access token for the rest of its lifetime. Refresh
    /// tokens of the session stay valid.
    pub async fn logout(&self, raw_access_token: &str) -> Result<(), AppError> {
        let claims = match self.signer.verify(raw_access_token, TokenKind::Access) {
            Ok(claims) => claims,
            // nothing left to revoke
            Err(TokenError::Expired) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let recorded = self
            .blacklist
            .blacklist(raw_access_token, claims.expires_at())
            .await;
        self.revocation.evict_profile(&claims.sub).await;

        info!(subject = %claims.sub, recorded, "access token logged out");
        Ok(())
    }

    /// Invalidates every credential the subject holds. Returns the new
    /// generation.
    pub async fn logout_all(&self, subject_id: &str) -> Result<i64, AppError> {
        Ok(self.revocation.revoke_everywhere(subject_id).await?)
    }

    pub async fn verify(&self, raw_access_token: &str) -> Result<AuthenticatedUser, AppError> {
        let claims = self.signer.verify(raw_access_token, TokenKind::Access)?;

        if self.blacklist.is_blacklisted(raw_access_token).await {
            debug!(subject = %claims.sub, "blacklisted access token presented");
            return Err(AppError::InvalidToken);
        }

        let current = bounded(self.timeout, self.store.get_generation(&claims.sub))
            .await?
            .ok_or(AppError::InvalidToken)?;
        if current != claims.generation {
            return Err(AppError::StaleGeneration);
        }

        Ok(AuthenticatedUser {
            expires_at: claims.expires_at(),
            subject_id: claims.sub,
        })
    }
}
