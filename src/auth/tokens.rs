use chrono::Utc;
use mongodb::bson::DateTime as BsonDateTime;
use serde::Serialize;

use crate::{
    auth::jwt::{sha256_hex, TokenError, TokenSigner},
    models::refresh_token::{RefreshStatus, RefreshTokenDoc},
};

/// What callers get back from `login` and `refresh`. Record ids stay inside.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct MintedPair {
    pub tokens: IssuedTokens,
    /// Record backing the refresh half; not yet persisted.
    pub record: RefreshTokenDoc,
}

/// Signs an access/refresh pair stamped with `generation`. A `family_id` of
/// `None` starts a new family.
pub fn mint_pair(
    signer: &TokenSigner,
    subject_id: &str,
    generation: i64,
    family_id: Option<&str>,
    parent_jti: Option<String>,
) -> Result<MintedPair, TokenError> {
    let access = signer.issue_access(subject_id, generation)?;
    let refresh = signer.issue_refresh(subject_id, generation, family_id)?;

    let record = RefreshTokenDoc {
        jti: refresh.jti,
        user_id: subject_id.to_string(),
        family_id: refresh.family_id,
        parent_jti,
        status: RefreshStatus::Active,
        token_hash: sha256_hex(&refresh.token),
        created_at: BsonDateTime::now(),
        expires_at: BsonDateTime::from_millis(refresh.expires_at.timestamp_millis()),
        used_at: None,
        revoked_at: None,
    };

    let expires_in = (access.expires_at - Utc::now()).num_seconds().max(0);
    Ok(MintedPair {
        tokens: IssuedTokens {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer".to_string(),
            expires_in,
        },
        record,
    })
}
