pub mod charge_service;
pub mod qr;
pub mod reconciliation;
pub mod token_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::config::PixConfig;
use crate::error::Result;
use crate::pix::{build_http_client, PixClient};
use crate::repository::*;
use charge_service::ChargeService;
use token_service::TokenService;

pub use charge_service::DueDateChargeUpdate;

pub struct ServiceContext {
    pub charge_repo: Arc<dyn ChargeRepository>,
    pub token_repo: Arc<dyn TokenRepository>,
    pub token_service: Arc<TokenService>,
    pub pix_client: Arc<PixClient>,
    pub charge_service: Arc<ChargeService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        charge_repo: Arc<dyn ChargeRepository>,
        token_repo: Arc<dyn TokenRepository>,
        pix_config: PixConfig,
        db_pool: SqlitePool,
    ) -> Result<Self> {
        // One outbound client shared by the token endpoint and the charge resources
        let http = build_http_client(&pix_config)?;

        let token_service = Arc::new(TokenService::new(
            token_repo.clone(),
            http.clone(),
            pix_config.clone(),
        ));
        let pix_client = Arc::new(PixClient::new(http, pix_config, token_service.clone()));
        let charge_service = Arc::new(ChargeService::new(charge_repo.clone(), pix_client.clone()));

        Ok(Self {
            charge_repo,
            token_repo,
            token_service,
            pix_client,
            charge_service,
            db_pool,
        })
    }

    /// Wires the SQLite repositories over `db_pool`.
    pub fn from_pool(db_pool: SqlitePool, pix_config: PixConfig) -> Result<Self> {
        let charge_repo = Arc::new(SqliteChargeRepository::new(db_pool.clone()));
        let token_repo = Arc::new(SqliteTokenRepository::new(db_pool.clone()));
        Self::new(charge_repo, token_repo, pix_config, db_pool)
    }
}
