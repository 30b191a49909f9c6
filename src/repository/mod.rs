use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod charge_repository;
pub mod token_repository;

pub use charge_repository::SqliteChargeRepository;
pub use token_repository::SqliteTokenRepository;

#[async_trait]
pub trait ChargeRepository: Send + Sync {
    async fn find_by_txid(&self, txid: &str) -> Result<Option<Charge>>;
    /// Insert or update keyed by `txid`; child rows are rewritten.
    async fn upsert(&self, charge: Charge) -> Result<Charge>;
    async fn list_recent(&self, charge_type: Option<ChargeType>, limit: i64) -> Result<Vec<Charge>>;
    async fn list_due_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Charge>>;
    async fn list_overdue(&self, reference: NaiveDate) -> Result<Vec<Charge>>;
    async fn count(&self) -> Result<i64>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Most recently created token expiring after `threshold`.
    async fn find_valid(&self, threshold: DateTime<Utc>) -> Result<Option<AccessToken>>;
    async fn find_most_recent(&self) -> Result<Option<AccessToken>>;
    async fn save(&self, token: AccessToken) -> Result<AccessToken>;
    async fn delete_all_except(&self, id: Uuid) -> Result<u64>;
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}
