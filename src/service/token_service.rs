use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    config::PixConfig,
    domain::{AccessToken, SAFETY_MARGIN_MINUTES},
    error::{AppError, Result},
    repository::TokenRepository,
};

const DEFAULT_EXPIRES_IN: i64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Caches the PSP bearer token in the `access_tokens` table.
///
/// Two requests missing the cache at the same time both fetch and both save a
/// token. Each then deletes every row but its own, so for a moment the table
/// may hold zero or two rows; reads always take the most recent, and the next
/// fetch cleans up again. No lock is taken across the fetch.
pub struct TokenService {
    token_repo: Arc<dyn TokenRepository>,
    http: Client,
    config: PixConfig,
}

impl TokenService {
    pub fn new(token_repo: Arc<dyn TokenRepository>, http: Client, config: PixConfig) -> Self {
        Self {
            token_repo,
            http,
            config,
        }
    }

    /// Returns a token valid for at least the safety margin, fetching one if needed.
    pub async fn get_access_token(&self) -> Result<String> {
        self.valid_token().await.map(|token| token.value)
    }

    pub async fn valid_token(&self) -> Result<AccessToken> {
        let threshold = Utc::now() + Duration::minutes(SAFETY_MARGIN_MINUTES);

        if let Some(token) = self.token_repo.find_valid(threshold).await? {
            tracing::debug!("Reusing cached access token valid until {}", token.expires_at);
            return Ok(token);
        }

        tracing::info!("No valid access token cached, requesting a new one");
        self.fetch_new().await
    }

    /// Fetches a new token regardless of what is cached.
    pub async fn renew(&self) -> Result<AccessToken> {
        tracing::info!("Forcing access token renewal");
        self.fetch_new().await
    }

    pub async fn current(&self) -> Result<Option<AccessToken>> {
        self.token_repo.find_most_recent().await
    }

    pub fn is_expired(&self, token: &AccessToken) -> bool {
        token.needs_renewal()
    }

    /// Drops tokens already past their expiry. Best-effort; returns rows removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let removed = self.token_repo.delete_expired(Utc::now()).await?;
        if removed > 0 {
            tracing::info!("Purged {} expired access tokens", removed);
        }
        Ok(removed)
    }

    async fn fetch_new(&self) -> Result<AccessToken> {
        let response = self
            .http
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AppError::Authentication(format!("Token endpoint unreachable: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Authentication(format!("Failed to read token response: {}", e)))?;

        if !status.is_success() {
            tracing::error!("Token request failed with {}: {}", status.as_u16(), body);
            return Err(AppError::Authentication(format!(
                "Falha na autenticação. Código: {}, Resposta: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::Authentication(format!("Malformed token response: {}", e)))?;
        let expires_in = parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);

        let token = self
            .token_repo
            .save(AccessToken::issued_now(parsed.access_token, expires_in))
            .await?;

        tracing::info!("Access token obtained, valid for {} seconds", expires_in);

        match self.token_repo.delete_all_except(token.id).await {
            Ok(removed) if removed > 0 => {
                tracing::debug!("Removed {} superseded access tokens", removed)
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Failed to remove superseded access tokens: {}", e),
        }

        Ok(token)
    }
}
