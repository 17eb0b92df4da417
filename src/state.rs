use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use crate::auth::{jwt::TokenIssuer, password::CredentialHasher, repo::PgUserStore, AuthService};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Fails when the signing secret is missing or the hash work factor is invalid.
    pub fn init(config: &AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let tokens = TokenIssuer::new(&config.jwt).context("token issuer")?;
        let hasher = CredentialHasher::new(config.hash).context("credential hasher")?;
        let store = Arc::new(PgUserStore::new(db));
        let auth = Arc::new(AuthService::new(store, hasher, tokens));
        Ok(Self::from_parts(auth))
    }

    pub fn from_parts(auth: Arc<AuthService>) -> Self {
        Self { auth }
    }
}
