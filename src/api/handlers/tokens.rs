use axum::{extract::State, Json};
use serde::Serialize;

use crate::{api::state::AppState, domain::AccessToken, error::Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: String,
    pub expires_in_minutes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renovado: Option<bool>,
}

impl From<AccessToken> for TokenResponse {
    fn from(token: AccessToken) -> Self {
        Self {
            expires_at: token.expires_at.to_rfc3339(),
            expires_in_minutes: token.minutes_remaining(),
            token: token.value,
            renovado: None,
        }
    }
}

pub async fn get_token(State(state): State<AppState>) -> Result<Json<TokenResponse>> {
    let token = state.service_context.token_service.valid_token().await?;
    Ok(Json(token.into()))
}

pub async fn renew(State(state): State<AppState>) -> Result<Json<TokenResponse>> {
    let token = state.service_context.token_service.renew().await?;
    let mut response = TokenResponse::from(token);
    response.renovado = Some(true);
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    pub status: &'static str,
    pub mensagem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criado_em: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expira_em: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutos_restantes: Option<i64>,
    pub precisa_renovar: bool,
}

/// Describes the cached token without ever fetching one.
pub fn token_status(token: Option<AccessToken>) -> TokenStatus {
    let Some(token) = token else {
        return TokenStatus {
            status: "AUSENTE",
            mensagem: "Nenhum token armazenado".to_string(),
            token: None,
            criado_em: None,
            expira_em: None,
            minutos_restantes: None,
            precisa_renovar: true,
        };
    };

    let (status, mensagem) = if token.is_valid() {
        ("VALIDO", "Token válido")
    } else {
        ("EXPIRADO", "Token expirado")
    };

    TokenStatus {
        status,
        mensagem: mensagem.to_string(),
        criado_em: Some(token.created_at.to_rfc3339()),
        expira_em: Some(token.expires_at.to_rfc3339()),
        minutos_restantes: Some(token.minutes_remaining()),
        precisa_renovar: token.needs_renewal(),
        token: Some(token.value),
    }
}

pub async fn status(State(state): State<AppState>) -> Result<Json<TokenStatus>> {
    let token = state.service_context.token_service.current().await?;
    Ok(Json(token_status(token)))
}
