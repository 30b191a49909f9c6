use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Non-2xx answer from the PSP. The raw body is kept for diagnostics.
    #[error("Remote API error ({status}): {body}")]
    RemoteApi { status: u16, body: String },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("External service error: {0}")]
    External(String),

    #[error("QR code error: {0}")]
    QrCode(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code the PSP answered with, when this error came from it.
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            AppError::RemoteApi { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Database(ref msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Erro de banco de dados".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::RemoteApi { status, body } => {
                tracing::error!("PSP answered {}: {}", status, body);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Erro na API Pix. Código: {}, Resposta: {}", status, body),
                )
            }
            AppError::Authentication(msg) => {
                tracing::error!("Token acquisition failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Falha ao obter token de acesso: {}", msg),
                )
            }
            AppError::External(msg) => {
                tracing::error!("External service error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::QrCode(msg) => {
                tracing::error!("QR code error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Erro ao gerar QR Code: {}", msg),
                )
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Erro interno do servidor".to_string())
            }
        };

        let body = Json(json!({
            "erro": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Corpo da requisição inválido: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(format!("Parâmetros inválidos: {}", rejection.body_text()))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::External(format!("Tempo limite excedido na chamada ao PSP: {}", err))
        } else {
            AppError::External(format!("Falha de comunicação com o PSP: {}", err))
        }
    }
}
