//! Refresh token rotation.
//!
//! A refresh record moves `active -> used` exactly once, through the store's
//! conditional flip. Presenting a record that is no longer `active` is a
//! reuse event: the whole family is revoked and the subject's generation is
//! bumped before the caller sees [`AppError::ReuseDetected`].
//!
//! Store failures here fail closed as [`AppError::RotationUnavailable`]; no
//! credentials are ever handed out after a failed or timed-out round-trip.

use std::{sync::Arc, time::Duration};

use tracing::{debug, error, warn};

use crate::{
    auth::{
        jwt::{TokenKind, TokenSigner},
        revocation::RevocationCoordinator,
        tokens::{mint_pair, IssuedTokens},
    },
    errors::AppError,
    store::{bounded, ConsumeOutcome, CredentialStore, StoreError},
};

fn unavailable(e: StoreError) -> AppError {
    AppError::RotationUnavailable(e.to_string())
}

pub struct RotationEngine {
    signer: Arc<TokenSigner>,
    store: Arc<dyn CredentialStore>,
    revocation: Arc<RevocationCoordinator>,
    timeout: Duration,
}

impl RotationEngine {
    pub fn new(
        signer: Arc<TokenSigner>,
        store: Arc<dyn CredentialStore>,
        revocation: Arc<RevocationCoordinator>,
        timeout: Duration,
    ) -> Self {
        Self {
            signer,
            store,
            revocation,
            timeout,
        }
    }

    pub async fn rotate(&self, raw_refresh_token: &str) -> Result<IssuedTokens, AppError> {
        // nothing touches the store until the token checks out
        let claims = self
            .signer
            .verify(raw_refresh_token, TokenKind::Refresh)
            .map_err(|e| {
                debug!(error = %e, "refresh token rejected");
                AppError::from(e)
            })?;

        let previous = match bounded(self.timeout, self.store.try_consume(&claims.jti))
            .await
            .map_err(unavailable)?
        {
            ConsumeOutcome::Consumed(previous) => previous,
            ConsumeOutcome::Unknown => return Err(AppError::InvalidToken),
            ConsumeOutcome::AlreadySpent(record) => {
                warn!(
                    subject = %record.user_id,
                    family = %record.family_id,
                    jti = %record.jti,
                    status = record.status.as_str(),
                    "spent refresh token presented again"
                );
                if let Err(e) = self
                    .revocation
                    .reuse_detected(&record.family_id, &record.user_id)
                    .await
                {
                    error!(error = %e, family = %record.family_id, "revocation after reuse failed");
                }
                return Err(AppError::ReuseDetected);
            }
        };

        if previous.user_id != claims.sub {
            warn!(
                subject = %claims.sub,
                owner = %previous.user_id,
                family = %previous.family_id,
                jti = %previous.jti,
                "refresh token subject does not own its record"
            );
            return Err(AppError::InvalidToken);
        }

        let current = bounded(self.timeout, self.store.get_generation(&claims.sub))
            .await
            .map_err(unavailable)?
            .ok_or(AppError::InvalidToken)?;
        if current != claims.generation {
            debug!(
                subject = %claims.sub,
                token_generation = claims.generation,
                current,
                "refresh token predates generation bump"
            );
            return Err(AppError::StaleGeneration);
        }

        let minted = mint_pair(
            &self.signer,
            &claims.sub,
            current,
            Some(&previous.family_id),
            Some(previous.jti.clone()),
        )?;
        bounded(self.timeout, self.store.insert_active(minted.record))
            .await
            .map_err(unavailable)?;

        debug!(subject = %claims.sub, family = %previous.family_id, "refresh token rotated");
        Ok(minted.tokens)
    }
}
