use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::AccessToken,
    error::{AppError, Result},
    repository::TokenRepository,
};

#[derive(FromRow)]
struct TokenRow {
    id: String,
    access_token: String,
    created_at: NaiveDateTime,
    expires_at: NaiveDateTime,
}

pub struct SqliteTokenRepository {
    pool: SqlitePool,
}

impl SqliteTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_token(row: TokenRow) -> Result<AccessToken> {
        Ok(AccessToken {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            value: row.access_token,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            expires_at: DateTime::from_naive_utc_and_offset(row.expires_at, Utc),
        })
    }
}

#[async_trait]
impl TokenRepository for SqliteTokenRepository {
    async fn find_valid(&self, threshold: DateTime<Utc>) -> Result<Option<AccessToken>> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT id, access_token, created_at, expires_at
            FROM access_tokens
            WHERE expires_at > ?
            ORDER BY created_at DESC
            LIMIT 1
            "#
        )
        .bind(threshold.naive_utc())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_token).transpose()
    }

    async fn find_most_recent(&self) -> Result<Option<AccessToken>> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT id, access_token, created_at, expires_at
            FROM access_tokens
            ORDER BY created_at DESC
            LIMIT 1
            "#
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_token).transpose()
    }

    async fn save(&self, token: AccessToken) -> Result<AccessToken> {
        sqlx::query(
            r#"
            INSERT INTO access_tokens (id, access_token, created_at, expires_at)
            VALUES (?, ?, ?, ?)
            "#
        )
        .bind(token.id.to_string())
        .bind(&token.value)
        .bind(token.created_at.naive_utc())
        .bind(token.expires_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(token)
    }

    async fn delete_all_except(&self, id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE id != ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE expires_at <= ?")
            .bind(now.naive_utc())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
