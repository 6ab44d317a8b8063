//! Access tokens rejected before their natural expiry (explicit logout).
//!
//! Entries are keyed by the SHA-256 of the bearer string and live exactly as
//! long as the token could still pass signature and expiry checks. If the
//! cache cannot be reached both directions fail open: a logout is recorded on
//! a best-effort basis and the token stays usable until it expires.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{auth::jwt::sha256_hex, cache::KvCache};

const KEY_PREFIX: &str = "blacklist:";
const MIN_TTL: Duration = Duration::from_secs(1);

pub fn blacklist_key(token: &str) -> String {
    format!("{KEY_PREFIX}{}", sha256_hex(token))
}

/// Time until the verifier stops accepting the token, at least one second;
/// `None` once it is rejected by expiry.
///
/// `exp` is whole seconds and a token stays valid through the second it
/// names, so the deadline is the end of that second.
pub fn remaining_ttl(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    if expires_at.timestamp() < now.timestamp() {
        return None;
    }
    let accepted_until = DateTime::<Utc>::from_timestamp(expires_at.timestamp() + 1, 0)?;
    let left = (accepted_until - now).to_std().unwrap_or(Duration::ZERO);
    Some(left.max(MIN_TTL))
}

#[derive(Clone)]
pub struct Blacklist {
    cache: Arc<dyn KvCache>,
}

impl Blacklist {
    pub fn new(cache: Arc<dyn KvCache>) -> Self {
        Self { cache }
    }

    /// Returns whether the marker was stored.
    pub async fn blacklist(&self, token: &str, expires_at: DateTime<Utc>) -> bool {
        let Some(ttl) = remaining_ttl(expires_at, Utc::now()) else {
            return false;
        };
        match self.cache.set(&blacklist_key(token), "1", ttl).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "blacklist write failed; logout is best-effort until expiry");
                false
            }
        }
    }

    pub async fn is_blacklisted(&self, token: &str) -> bool {
        match self.cache.get(&blacklist_key(token)).await {
            Ok(hit) => hit.is_some(),
            Err(e) => {
                warn!(error = %e, "blacklist lookup failed; treating token as not blacklisted");
                false
            }
        }
    }
}
