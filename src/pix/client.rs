use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::PixConfig,
    domain::{Charge, ChargeKind, ChargeType},
    error::{AppError, Result},
    service::token_service::TokenService,
};
use super::{
    payload::{apply_remote_fields, cancel_body, charge_body},
    response::RemoteCharge,
};

/// Shared outbound client with the configured connect and total timeouts.
pub fn build_http_client(config: &PixConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))
}

/// Gateway to the PSP's `cob` and `cobv` resources.
pub struct PixClient {
    http: Client,
    config: PixConfig,
    tokens: Arc<TokenService>,
}

impl PixClient {
    pub fn new(http: Client, config: PixConfig, tokens: Arc<TokenService>) -> Self {
        Self { http, config, tokens }
    }

    /// `PUT cob/{txid}`. On success the PSP-assigned fields are copied onto `charge`.
    pub async fn create_immediate(&self, charge: &mut Charge) -> Result<Value> {
        if !matches!(charge.kind, ChargeKind::Immediate { .. }) {
            return Err(AppError::Internal(format!(
                "Charge {} is not an immediate charge",
                charge.txid
            )));
        }
        self.put_charge(charge).await
    }

    /// `PUT cobv/{txid}`. On success the PSP-assigned fields are copied onto `charge`.
    pub async fn create_with_due_date(&self, charge: &mut Charge) -> Result<Value> {
        if !matches!(charge.kind, ChargeKind::WithDueDate(_)) {
            return Err(AppError::Internal(format!(
                "Charge {} is not a due-date charge",
                charge.txid
            )));
        }
        self.put_charge(charge).await
    }

    pub async fn create(&self, charge: &mut Charge) -> Result<Value> {
        match charge.charge_type() {
            ChargeType::Cob => self.create_immediate(charge).await,
            ChargeType::Cobv => self.create_with_due_date(charge).await,
        }
    }

    /// `GET {cob|cobv}/{txid}`. PSP errors come back untranslated as `RemoteApi`.
    pub async fn query(&self, charge_type: ChargeType, txid: &str) -> Result<Value> {
        tracing::debug!("Querying {} {} at the PSP", charge_type.as_str(), txid);
        self.send(Method::GET, charge_type, txid, None).await
    }

    /// `PATCH {cob|cobv}/{txid}` with either the cancel body or the full charge body.
    ///
    /// A paid charge is rejected before anything goes over the wire.
    pub async fn update(&self, charge: &mut Charge, cancel: bool) -> Result<Value> {
        if charge.is_paid() {
            return Err(AppError::Conflict(format!(
                "Cobrança {} já foi paga",
                charge.txid
            )));
        }

        let body = if cancel { cancel_body() } else { charge_body(charge) };
        let value = self
            .send(Method::PATCH, charge.charge_type(), &charge.txid, Some(&body))
            .await?;

        if !cancel {
            apply_remote_fields(charge, &parse_remote_charge(&value)?);
        }
        Ok(value)
    }

    async fn put_charge(&self, charge: &mut Charge) -> Result<Value> {
        let body = charge_body(charge);
        tracing::debug!("Charge body for {}: {}", charge.txid, body);

        let value = self
            .send(Method::PUT, charge.charge_type(), &charge.txid, Some(&body))
            .await?;

        apply_remote_fields(charge, &parse_remote_charge(&value)?);
        tracing::info!("PSP accepted {} charge {}", charge.charge_type().as_str(), charge.txid);
        Ok(value)
    }

    fn resource_url(&self, charge_type: ChargeType, txid: &str) -> String {
        let base = match charge_type {
            ChargeType::Cob => &self.config.cob_url,
            ChargeType::Cobv => &self.config.cobv_url,
        };
        format!("{}{}", base, txid)
    }

    async fn send(
        &self,
        method: Method,
        charge_type: ChargeType,
        txid: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let token = self.tokens.get_access_token().await?;
        let url = self.resource_url(charge_type, txid);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[(self.config.app_key_param.as_str(), self.config.app_key.as_str())]);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!("{} {} answered {}: {}", method, url, status.as_u16(), text);
            return Err(AppError::RemoteApi {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| AppError::External(format!("Malformed PSP response: {}", e)))
    }
}

/// Reads the reconcilable fields out of a raw PSP document.
pub fn parse_remote_charge(value: &Value) -> Result<RemoteCharge> {
    if value.is_null() {
        return Ok(RemoteCharge::default());
    }
    serde_json::from_value(value.clone())
        .map_err(|e| AppError::External(format!("Malformed PSP charge document: {}", e)))
}
