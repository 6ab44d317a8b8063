use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{0} is invalid: {1}")]
    Invalid(&'static str, String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo { uri: String, db_name: String },
    Memory,
}

/// Signing material and lifetimes shared by the signer and verifier.
#[derive(Clone, Debug)]
pub struct JwtSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub store: StoreBackend,
    pub jwt: JwtSettings,

    pub store_timeout: Duration,
    pub profile_cache_ttl: Duration,
    pub cache_max_entries: u64,
    pub bind_addr: String,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parsed_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, v.clone())),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let store = match std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "mongo".to_string())
            .to_lowercase()
            .as_str()
        {
            "mongo" => StoreBackend::Mongo {
                uri: required("MONGODB_URI")?,
                db_name: std::env::var("DB_NAME").unwrap_or_else(|_| "auth_db".to_string()),
            },
            "memory" => StoreBackend::Memory,
            other => return Err(ConfigError::Invalid("STORE_BACKEND", other.to_string())),
        };

        let jwt = JwtSettings {
            access_secret: required("JWT_ACCESS_SECRET")?,
            refresh_secret: required("JWT_REFRESH_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "session-auth".to_string()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "session-auth-clients".to_string()),
            access_ttl_seconds: parsed_or("JWT_ACCESS_TTL_SECONDS", 15 * 60)?,
            refresh_ttl_seconds: parsed_or("JWT_REFRESH_TTL_SECONDS", 30 * 24 * 60 * 60)?,
        };
        jwt.validate()?;

        let store_timeout_ms: u64 = parsed_or("STORE_TIMEOUT_MS", 2_000)?;
        let profile_ttl_seconds: u64 = parsed_or("PROFILE_CACHE_TTL_SECONDS", 300)?;

        Ok(Self {
            store,
            jwt,
            store_timeout: Duration::from_millis(store_timeout_ms),
            profile_cache_ttl: Duration::from_secs(profile_ttl_seconds),
            cache_max_entries: parsed_or("CACHE_MAX_ENTRIES", 100_000)?,
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into()),
        })
    }
}

impl JwtSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // a leaked refresh secret must not be able to forge access tokens
        if self.access_secret == self.refresh_secret {
            return Err(ConfigError::Invalid(
                "JWT_REFRESH_SECRET",
                "must differ from JWT_ACCESS_SECRET".into(),
            ));
        }
        if self.access_ttl_seconds <= 0 {
            return Err(ConfigError::Invalid(
                "JWT_ACCESS_TTL_SECONDS",
                self.access_ttl_seconds.to_string(),
            ));
        }
        if self.refresh_ttl_seconds <= self.access_ttl_seconds {
            return Err(ConfigError::Invalid(
                "JWT_REFRESH_TTL_SECONDS",
                "must exceed the access token lifetime".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> JwtSettings {
        JwtSettings {
            access_secret: "a".repeat(32),
            refresh_secret: "r".repeat(32),
            issuer: "iss".into(),
            audience: "aud".into(),
            access_ttl_seconds: 900,
            refresh_ttl_seconds: 86_400,
        }
    }

    #[test]
    fn accepts_distinct_secrets() {
        assert!(settings().validate().is_ok());
    }

    #[test]
    fn rejects_shared_secret() {
        let mut s = settings();
        s.refresh_secret = s.access_secret.clone();
        assert!(matches!(
            s.validate(),
            Err(ConfigError::Invalid("JWT_REFRESH_SECRET", _))
        ));
    }

    #[test]
    fn rejects_refresh_shorter_than_access() {
        let mut s = settings();
        s.refresh_ttl_seconds = 60;
        assert!(s.validate().is_err());
    }
}
