use std::sync::Arc;

use crate::{
    auth::jwt::TokenSigner,
    cache::{KvCache, MemoryCache},
    config::{Config, StoreBackend},
    services::session::SessionService,
    store::{CredentialStore, MemoryStore, MongoStore, StoreError, UserStore},
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<SessionService>,
    pub cache: Arc<dyn KvCache>,
    pub cfg: Arc<Config>,
}

impl AppState {
    pub async fn new(cfg: &Config) -> Result<Self, StoreError> {
        let cache: Arc<dyn KvCache> = Arc::new(MemoryCache::new(cfg.cache_max_entries));

        let state = match &cfg.store {
            StoreBackend::Mongo { uri, db_name } => {
                let store = Arc::new(MongoStore::connect(uri, db_name).await?);
                Self::from_parts(cfg, store.clone(), store, cache)
            }
            StoreBackend::Memory => {
                let store = Arc::new(MemoryStore::new());
                Self::from_parts(cfg, store.clone(), store, cache)
            }
        };
        Ok(state)
    }

    /// Wires the session layer over explicit store and cache handles.
    pub fn from_parts(
        cfg: &Config,
        users: Arc<dyn UserStore>,
        credentials: Arc<dyn CredentialStore>,
        cache: Arc<dyn KvCache>,
    ) -> Self {
        let signer = Arc::new(TokenSigner::new(&cfg.jwt));
        let sessions = Arc::new(SessionService::new(
            signer,
            credentials,
            cache.clone(),
            cfg.store_timeout,
        ));
        Self {
            users,
            sessions,
            cache,
            cfg: Arc::new(cfg.clone()),
        }
    }
}
