use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtSettings;

/// The only algorithm tokens are signed with or accepted under.
const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("issuer mismatch")]
    IssuerMismatch,

    #[error("audience mismatch")]
    AudienceMismatch,

    #[error("unexpected token type")]
    WrongType,

    #[error("malformed token")]
    Malformed,

    #[error("signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(rename = "gen")]
    pub generation: i64,
    pub jti: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fam: Option<String>, // refresh only
    pub typ: TokenKind,

    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SignedRefresh {
    pub token: String,
    pub jti: String,
    pub family_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

pub fn sha256_hex(s: &str) -> String {
    let mut h = Sha256::new();
    h.update(s.as_bytes());
    hex::encode(h.finalize())
}

/// Stateless signer/verifier for both token kinds. Access and refresh tokens
/// use separate keys.
#[derive(Clone)]
pub struct TokenSigner {
    access: Keys,
    refresh: Keys,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenSigner {
    pub fn new(settings: &JwtSettings) -> Self {
        Self {
            access: Keys::from_secret(&settings.access_secret),
            refresh: Keys::from_secret(&settings.refresh_secret),
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            access_ttl: Duration::seconds(settings.access_ttl_seconds),
            refresh_ttl: Duration::seconds(settings.refresh_ttl_seconds),
        }
    }

    fn keys(&self, kind: TokenKind) -> &Keys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn claims(
        &self,
        kind: TokenKind,
        subject_id: &str,
        generation: i64,
        family_id: Option<String>,
    ) -> Claims {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        Claims {
            sub: subject_id.to_string(),
            generation,
            jti: Uuid::new_v4().to_string(),
            fam: family_id,
            typ: kind,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    /// Signs claims with the key belonging to `claims.typ`.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(
            &Header::new(ALGORITHM),
            claims,
            &self.keys(claims.typ).encoding,
        )
        .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn issue_access(
        &self,
        subject_id: &str,
        generation: i64,
    ) -> Result<SignedToken, TokenError> {
        let claims = self.claims(TokenKind::Access, subject_id, generation, None);
        let token = self.sign(&claims)?;
        Ok(SignedToken {
            token,
            expires_at: claims.expires_at(),
            jti: claims.jti,
        })
    }

    /// Without a `family_id` a new family is started (a fresh login).
    pub fn issue_refresh(
        &self,
        subject_id: &str,
        generation: i64,
        family_id: Option<&str>,
    ) -> Result<SignedRefresh, TokenError> {
        let family_id = family_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let claims = self.claims(
            TokenKind::Refresh,
            subject_id,
            generation,
            Some(family_id.clone()),
        );
        let token = self.sign(&claims)?;
        Ok(SignedRefresh {
            token,
            expires_at: claims.expires_at(),
            jti: claims.jti,
            family_id,
        })
    }

    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let data = decode::<Claims>(token, &self.keys(expected).decoding, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidIssuer => TokenError::IssuerMismatch,
                ErrorKind::InvalidAudience => TokenError::AudienceMismatch,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            },
        )?;
        let claims = data.claims;

        if claims.typ != expected {
            return Err(TokenError::WrongType);
        }
        if expected == TokenKind::Refresh && claims.fam.is_none() {
            return Err(TokenError::Malformed);
        }
        Ok(claims)
    }
}
