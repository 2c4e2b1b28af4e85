//! Shared application state

use crate::auth::AuthCache;
use crate::config::Config;
use crate::matching::Engine;
use crate::rate_limit::RateLimiter;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub engine: Arc<Engine>,
    pub auth: Arc<AuthCache>,
    pub rate_limiter: Arc<RateLimiter>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<Store>, config: Config) -> Self {
        let engine = Arc::new(Engine::new(store.clone()));
        Self {
            store,
            engine,
            auth: Arc::new(AuthCache::new()),
            rate_limiter: Arc::new(RateLimiter::new()),
            config: Arc::new(config),
        }
    }
}
