use std::sync::Arc;

use crate::auth::{jwt::TokenService, repo::UserStore};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::contacts::repo::ContactStore;
use crate::db::PgStore;
use crate::ratelimit::RateLimits;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub contacts: Arc<dyn ContactStore>,
    pub tokens: Arc<TokenService>,
    pub limits: Arc<RateLimits>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let store = Arc::new(PgStore::connect(&config).await?);
        store.migrate().await?;

        Ok(Self::from_parts(
            config,
            store.clone(),
            store,
            Arc::new(SystemClock),
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        contacts: Arc<dyn ContactStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(&config.jwt, clock.clone()));
        let limits = Arc::new(RateLimits::new(&config.rate_limits, clock.clone()));
        Self {
            config,
            users,
            contacts,
            tokens,
            limits,
            clock,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with_clock(Arc::new(SystemClock))
    }

    #[cfg(test)]
    pub fn fake_with_clock(clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(crate::memory::MemoryStore::default());
        Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            store.clone(),
            store,
            clock,
        )
    }
}
