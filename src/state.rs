use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::auth::{
    jwt::JwtKeys,
    password::Argon2Hasher,
    repo::{MemoryUserStore, PgUserStore, UserStore},
    services::AuthService,
};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: Option<PgPool>,
    pub config: Arc<AppConfig>,
    pub auth: AuthService,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let Some(url) = config.database_url.as_deref() else {
            tracing::warn!("DATABASE_URL not set; users are kept in memory");
            return Self::in_memory(config);
        };

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .context("connect to database")?;

        let store = Arc::new(PgUserStore::new(db.clone())) as Arc<dyn UserStore>;
        let mut state = Self::from_parts(config, store)?;
        state.db = Some(db);
        Ok(state)
    }

    pub fn in_memory(config: Arc<AppConfig>) -> anyhow::Result<Self> {
        Self::from_parts(config, Arc::new(MemoryUserStore::new()))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        let hasher = Argon2Hasher::new(config.password).context("argon2 parameters")?;
        let keys = JwtKeys::new(&config.jwt);
        let auth = AuthService::new(store, Arc::new(hasher), Arc::new(keys));
        Ok(Self {
            db: None,
            config,
            auth,
        })
    }
}
