use std::sync::Arc;

use axum::extract::FromRef;
use chatgate_core::{MemoryUserStore, RateLimiter, TokenAuthority, UserRecord, UserStore};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub limiter: Arc<RateLimiter>,
    pub tokens: Arc<TokenAuthority>,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    /// Builds the limiter, token authority and an in-memory user store seeded
    /// with the users listed in the config. Fails if no signing secret is set.
    pub async fn from_config(config: ServerConfig) -> anyhow::Result<Self> {
        let secret = config.auth.signing_secret()?;
        let tokens = TokenAuthority::new(&secret, config.auth.token_ttl());
        let limiter = RateLimiter::new(config.rate_limit.policy());

        let store = MemoryUserStore::new();
        for user in &config.users {
            store
                .create_user(UserRecord::new(
                    user.username.clone(),
                    user.email.clone(),
                    user.password_hash.clone(),
                ))
                .await?;
        }
        if !store.is_empty() {
            tracing::info!("Seeded {} user(s) from config", store.len());
        }

        Ok(Self {
            config: Arc::new(config),
            limiter: Arc::new(limiter),
            tokens: Arc::new(tokens),
            users: Arc::new(store),
        })
    }
}

impl FromRef<AppState> for Arc<TokenAuthority> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}
