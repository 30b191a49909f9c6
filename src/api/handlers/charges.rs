use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::{
    api::{
        extract::{JsonBody, QueryParams},
        state::AppState,
    },
    domain::{
        generate_txid, AdditionalInfo, Charge, ChargeKind, ChargeType, Debtor,
        DueDateTerms, ValueTerm, DEFAULT_EXPIRY_SECONDS, DEFAULT_GRACE_DAYS,
    },
    error::{AppError, Result},
    pix::{RemoteCharge, RemoteProblem},
    service::DueDateChargeUpdate,
};

#[derive(Debug, Deserialize, Serialize)]
pub struct AdditionalInfoDto {
    pub nome: String,
    pub valor: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateChargeRequest {
    pub chave: Option<String>,
    /// `"10.00"` or `10.00`
    pub valor: Option<Decimal>,
    pub nome: Option<String>,
    pub cpf: Option<String>,
    pub cnpj: Option<String>,
    pub expiracao: Option<i64>,
    pub data_vencimento: Option<NaiveDate>,
    pub validade_apos_vencimento: Option<i32>,
    pub banco: Option<String>,
    pub tipo_cob: Option<String>,
    #[validate(length(max = 140, message = "solicitacaoPagador deve ter no máximo 140 caracteres"))]
    pub solicitacao_pagador: Option<String>,
    pub logradouro: Option<String>,
    pub cidade: Option<String>,
    pub uf: Option<String>,
    pub cep: Option<String>,
    #[validate(email(message = "email inválido"))]
    pub email: Option<String>,
    pub multa: Option<ValueTerm>,
    pub juros: Option<ValueTerm>,
    pub desconto: Option<ValueTerm>,
    pub abatimento: Option<ValueTerm>,
    #[serde(default)]
    pub info_adicionais: Vec<AdditionalInfoDto>,
}

impl CreateChargeRequest {
    /// Validates the request and builds the charge to send to the PSP.
    pub fn into_charge(self) -> Result<Charge> {
        self.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let amount = self.valor.filter(|v| *v > Decimal::ZERO);

        let (payee_key, amount, name) = match (non_blank(self.chave), amount, non_blank(self.nome)) {
            (Some(key), Some(amount), Some(name)) => (key, amount, name),
            _ => {
                tracing::warn!("Rejected charge request: required fields missing");
                return Err(AppError::Validation(
                    "Chave Pix, valor e nome são obrigatórios".to_string(),
                ));
            }
        };

        let charge_type = self
            .tipo_cob
            .as_deref()
            .and_then(ChargeType::parse)
            .ok_or_else(|| {
                tracing::warn!("Rejected charge request: invalid tipoCob {:?}", self.tipo_cob);
                AppError::Validation("Tipo de cobrança inválido".to_string())
            })?;

        let kind = match charge_type {
            ChargeType::Cob => {
                let expiry_seconds = self.expiracao.unwrap_or(DEFAULT_EXPIRY_SECONDS);
                if expiry_seconds <= 0 {
                    return Err(AppError::Validation(
                        "expiracao deve ser maior que zero".to_string(),
                    ));
                }
                ChargeKind::Immediate { expiry_seconds }
            }
            ChargeType::Cobv => {
                let due_date = self.data_vencimento.ok_or_else(|| {
                    AppError::Validation(
                        "dataVencimento é obrigatória para cobranças com vencimento".to_string(),
                    )
                })?;
                ChargeKind::WithDueDate(DueDateTerms {
                    due_date,
                    grace_days_after_due: self
                        .validade_apos_vencimento
                        .unwrap_or(DEFAULT_GRACE_DAYS),
                    fine: self.multa,
                    interest: self.juros,
                    discount: self.desconto,
                    rebate: self.abatimento,
                })
            }
        };

        let bank_code = non_blank(self.banco);
        let txid = generate_txid(Some(charge_type), bank_code.as_deref().unwrap_or(""));

        let debtor = Debtor {
            name,
            cpf: non_blank(self.cpf),
            cnpj: non_blank(self.cnpj),
            street: non_blank(self.logradouro),
            city: non_blank(self.cidade),
            state: non_blank(self.uf),
            postal_code: non_blank(self.cep),
            email: non_blank(self.email),
        };

        let mut charge = Charge::new(txid, payee_key, amount, debtor, kind);
        charge.bank_code = bank_code;
        charge.payer_request = non_blank(self.solicitacao_pagador);
        charge.additional_info = self
            .info_adicionais
            .into_iter()
            .map(|i| AdditionalInfo { name: i.nome, value: i.valor })
            .collect();
        Ok(charge)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChargeResponse {
    pub txid: String,
    pub status: String,
    pub pix_copia_e_cola: Option<String>,
    pub qr_code: Option<String>,
    pub location: Option<String>,
    pub criacao: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiracao: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_vencimento: Option<String>,
}

/// Local view of a charge, shared by lookups and listings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeView {
    pub txid: String,
    pub status: String,
    pub tipo_cob: ChargeType,
    pub chave: String,
    pub valor: String,
    pub nome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,
    pub criacao: String,
    pub revisao: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiracao: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_vencimento: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validade_apos_vencimento: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multa: Option<ValueTerm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub juros: Option<ValueTerm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abatimento: Option<ValueTerm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desconto: Option<ValueTerm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logradouro: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cep: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pix_copia_e_cola: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solicitacao_pagador: Option<String>,
    pub pago: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_to_end_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valor_pago: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horario_pagamento: Option<String>,
}

impl From<Charge> for ChargeView {
    fn from(charge: Charge) -> Self {
        let tipo_cob = charge.charge_type();
        let pago = charge.is_paid();
        let (expiracao, terms) = match charge.kind {
            ChargeKind::Immediate { expiry_seconds } => (Some(expiry_seconds), None),
            ChargeKind::WithDueDate(terms) => (None, Some(terms)),
        };
        let payment = charge.payment;

        Self {
            txid: charge.txid,
            status: charge.status.as_str().to_string(),
            tipo_cob,
            chave: charge.payee_key,
            valor: charge.original_amount.to_string(),
            nome: charge.debtor.name,
            cpf: charge.debtor.cpf,
            cnpj: charge.debtor.cnpj,
            criacao: charge.created_at.to_rfc3339(),
            revisao: charge.revision,
            expiracao,
            data_vencimento: terms.as_ref().map(|t| t.due_date.to_string()),
            validade_apos_vencimento: terms.as_ref().map(|t| t.grace_days_after_due),
            multa: terms.as_ref().and_then(|t| t.fine),
            juros: terms.as_ref().and_then(|t| t.interest),
            abatimento: terms.as_ref().and_then(|t| t.rebate),
            desconto: terms.as_ref().and_then(|t| t.discount),
            logradouro: charge.debtor.street,
            cidade: charge.debtor.city,
            uf: charge.debtor.state,
            cep: charge.debtor.postal_code,
            email: charge.debtor.email,
            pix_copia_e_cola: charge.copy_paste,
            location: charge.location,
            solicitacao_pagador: charge.payer_request,
            pago,
            end_to_end_id: payment.as_ref().map(|p| p.settlement_id.clone()),
            valor_pago: payment.as_ref().map(|p| p.amount_paid.to_string()),
            horario_pagamento: payment.as_ref().map(|p| p.paid_at.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    quantidade: usize,
    cobrancas: Vec<ChargeView>,
}

impl From<Vec<Charge>> for ListResponse {
    fn from(charges: Vec<Charge>) -> Self {
        let cobrancas: Vec<ChargeView> = charges.into_iter().map(Into::into).collect();
        Self {
            quantidade: cobrancas.len(),
            cobrancas,
        }
    }
}

pub async fn create(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateChargeRequest>,
) -> Result<(StatusCode, Json<CreateChargeResponse>)> {
    let charge = request.into_charge()?;

    let (charge, response) = state.service_context.charge_service
        .create(charge)
        .await?;

    let (expiracao, data_vencimento) = match &charge.kind {
        ChargeKind::Immediate { expiry_seconds } => (Some(*expiry_seconds), None),
        ChargeKind::WithDueDate(terms) => (None, Some(terms.due_date.to_string())),
    };

    Ok((StatusCode::CREATED, Json(CreateChargeResponse {
        qr_code: response
            .get("pixCopiaECola")
            .and_then(Value::as_str)
            .map(str::to_string),
        txid: charge.txid,
        status: charge.status.as_str().to_string(),
        pix_copia_e_cola: charge.copy_paste,
        location: charge.location,
        criacao: charge.created_at.to_rfc3339(),
        expiracao,
        data_vencimento,
    })))
}

pub async fn get(
    State(state): State<AppState>,
    Path(txid): Path<String>,
) -> Result<Json<ChargeView>> {
    let charge = state.service_context.charge_service.find(&txid).await?;
    Ok(Json(charge.into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    txid: String,
    status: String,
    mensagem: String,
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(txid): Path<String>,
) -> Result<Json<CancelResponse>> {
    let charge = state.service_context.charge_service.cancel(&txid).await?;

    Ok(Json(CancelResponse {
        txid: charge.txid,
        status: charge.status.as_str().to_string(),
        mensagem: "Cobrança cancelada com sucesso".to_string(),
    }))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChargeRequest {
    pub valor: Option<Decimal>,
    pub data_vencimento: Option<NaiveDate>,
    pub validade_apos_vencimento: Option<i32>,
    #[validate(length(max = 140, message = "solicitacaoPagador deve ter no máximo 140 caracteres"))]
    pub solicitacao_pagador: Option<String>,
    pub nome: Option<String>,
    #[validate(email(message = "email inválido"))]
    pub email: Option<String>,
    pub multa: Option<ValueTerm>,
    pub juros: Option<ValueTerm>,
    pub desconto: Option<ValueTerm>,
    pub abatimento: Option<ValueTerm>,
}

impl TryFrom<UpdateChargeRequest> for DueDateChargeUpdate {
    type Error = AppError;

    fn try_from(request: UpdateChargeRequest) -> Result<Self> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let original_amount = match request.valor {
            Some(v) if v <= Decimal::ZERO => {
                return Err(AppError::Validation(format!("valor inválido: {}", v)));
            }
            other => other,
        };

        Ok(DueDateChargeUpdate {
            original_amount,
            due_date: request.data_vencimento,
            grace_days_after_due: request.validade_apos_vencimento,
            payer_request: request.solicitacao_pagador,
            debtor_name: non_blank(request.nome),
            debtor_email: non_blank(request.email),
            fine: request.multa,
            interest: request.juros,
            discount: request.desconto,
            rebate: request.abatimento,
        })
    }
}

pub async fn update(
    State(state): State<AppState>,
    Path(txid): Path<String>,
    JsonBody(request): JsonBody<UpdateChargeRequest>,
) -> Result<Json<ChargeView>> {
    let update = DueDateChargeUpdate::try_from(request)?;
    let charge = state.service_context.charge_service
        .update_due_date(&txid, update)
        .await?;
    Ok(Json(charge.into()))
}

pub async fn refresh(
    State(state): State<AppState>,
    Path(txid): Path<String>,
) -> Result<Json<ChargeView>> {
    let charge = state.service_context.charge_service.refresh(&txid).await?;
    Ok(Json(charge.into()))
}

/// PSP document as-is. PSP problem documents keep their own status code.
pub async fn details(
    State(state): State<AppState>,
    Path(txid): Path<String>,
) -> Result<Response> {
    match state.service_context.charge_service.details(&txid).await {
        Ok(value) => Ok(Json(value).into_response()),
        Err(AppError::RemoteApi { status, body }) => match RemoteProblem::parse(&body) {
            Some(problem) => {
                let code = StatusCode::from_u16(problem.status)
                    .or_else(|_| StatusCode::from_u16(status))
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                let payload: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
                tracing::warn!("PSP problem for {}: {} ({})", txid, problem.title, problem.kind);
                Ok((code, Json(payload)).into_response())
            }
            None => Err(AppError::RemoteApi { status, body }),
        },
        Err(e) => Err(e),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusView {
    pub txid: String,
    pub status: String,
    pub valor_original: String,
    pub pago: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_to_end_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valor_pago: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horario_pagamento: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_pagador: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiracao: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_vencimento: Option<String>,
}

pub fn payment_status_view(txid: &str, charge_type: ChargeType, remote: &RemoteCharge) -> PaymentStatusView {
    let status = remote.status.clone().unwrap_or_else(|| "DESCONHECIDO".to_string());
    let valor_original = remote
        .valor
        .as_ref()
        .and_then(|v| v.original.clone())
        .unwrap_or_else(|| "0".to_string());

    let mut view = PaymentStatusView {
        txid: txid.to_string(),
        status,
        valor_original,
        pago: false,
        end_to_end_id: None,
        valor_pago: None,
        horario_pagamento: None,
        info_pagador: None,
        expiracao: None,
        data_vencimento: None,
    };

    match remote.first_payment() {
        Some(pix) => {
            view.pago = true;
            view.end_to_end_id = Some(pix.end_to_end_id.clone().unwrap_or_else(|| "N/A".to_string()));
            view.valor_pago = Some(pix.valor.clone().unwrap_or_else(|| "0".to_string()));
            view.horario_pagamento = Some(pix.horario.clone().unwrap_or_else(|| "N/A".to_string()));
            view.info_pagador = pix.info_pagador.clone();
        }
        None if view.status == "ATIVA" => {
            let calendar = remote.calendario.as_ref();
            match charge_type {
                ChargeType::Cob => view.expiracao = calendar.and_then(|c| c.expiracao),
                ChargeType::Cobv => {
                    view.data_vencimento = calendar
                        .and_then(|c| c.data_de_vencimento)
                        .map(|d| d.to_string())
                }
            }
        }
        None => {}
    }

    view
}

pub async fn payment_status(
    State(state): State<AppState>,
    Path(txid): Path<String>,
) -> Result<Json<PaymentStatusView>> {
    let (charge_type, remote) = state.service_context.charge_service
        .payment_status(&txid)
        .await?;
    Ok(Json(payment_status_view(&txid, charge_type, &remote)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundView {
    pub txid: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mensagem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_devolucao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_devolucao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motivo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horario_solicitacao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horario_liquidacao: Option<String>,
}

pub fn refund_view(txid: &str, remote: &RemoteCharge) -> RefundView {
    let mut view = RefundView {
        txid: txid.to_string(),
        status: "NAO_PAGO",
        mensagem: None,
        id_devolucao: None,
        valor: None,
        status_devolucao: None,
        motivo: None,
        horario_solicitacao: None,
        horario_liquidacao: None,
    };

    let Some(pix) = remote.first_payment() else {
        view.mensagem = Some("Cobrança não foi paga, portanto não possui devolução".to_string());
        return view;
    };

    let Some(refund) = pix.devolucoes.first() else {
        view.status = "SEM_DEVOLUCAO";
        view.mensagem = Some("Pagamento realizado, mas sem devolução registrada".to_string());
        return view;
    };

    let times = refund.horario.clone().unwrap_or_default();
    view.status = "COM_DEVOLUCAO";
    view.id_devolucao = Some(refund.id.clone().unwrap_or_else(|| "N/A".to_string()));
    view.valor = Some(refund.valor.clone().unwrap_or_else(|| "0".to_string()));
    view.status_devolucao = Some(refund.status.clone().unwrap_or_else(|| "N/A".to_string()));
    view.motivo = refund.motivo.clone();
    view.horario_solicitacao = times.solicitacao;
    view.horario_liquidacao = times.liquidacao;
    view
}

pub async fn refund(
    State(state): State<AppState>,
    Path(txid): Path<String>,
) -> Result<Json<RefundView>> {
    let (_, remote) = state.service_context.charge_service
        .payment_status(&txid)
        .await?;
    Ok(Json(refund_view(&txid, &remote)))
}

pub async fn qr_code(
    State(state): State<AppState>,
    Path(txid): Path<String>,
) -> Result<Response> {
    let png = state.service_context.charge_service.qr_code_png(&txid).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"qrcode-pix-{}.png\"", txid),
            ),
        ],
        png,
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequest {
    pub end_to_end_id: Option<String>,
    pub valor_pago: Option<Decimal>,
    pub info_pagador: Option<String>,
}

impl PayRequest {
    /// An empty body means "all defaults"; anything else must be a valid request.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let request: Self = serde_json::from_slice(body)
            .map_err(|e| AppError::Validation(format!("Corpo da requisição inválido: {}", e)))?;

        if let Some(amount) = request.valor_pago {
            if amount <= Decimal::ZERO {
                return Err(AppError::Validation(
                    "valorPago deve ser maior que zero".to_string(),
                ));
            }
        }
        Ok(request)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayResponse {
    txid: String,
    status: String,
    valor_pago: String,
    end_to_end_id: String,
    horario_pagamento: String,
}

pub async fn pay(
    State(state): State<AppState>,
    Path(txid): Path<String>,
    body: Bytes,
) -> Result<Json<PayResponse>> {
    let request = PayRequest::from_body(&body)?;

    let charge = state.service_context.charge_service
        .register_payment(&txid, request.end_to_end_id, request.valor_pago, request.info_pagador)
        .await?;

    let payment = charge.payment.ok_or_else(|| {
        AppError::Internal(format!("Charge {} has no payment after registration", txid))
    })?;

    Ok(Json(PayResponse {
        txid: charge.txid,
        status: charge.status.as_str().to_string(),
        valor_pago: payment.amount_paid.to_string(),
        end_to_end_id: payment.settlement_id,
        horario_pagamento: payment.paid_at.to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limite: i64,
    #[serde(default = "default_kind")]
    tipo: String,
}

fn default_limit() -> i64 {
    10
}

fn default_kind() -> String {
    "todos".to_string()
}

/// `limite` applies per charge type: `todos` may return up to twice as many.
pub async fn list(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<ListResponse>> {
    if !(1..=1000).contains(&params.limite) {
        return Err(AppError::BadRequest("limite deve estar entre 1 e 1000".to_string()));
    }

    let kinds: &[ChargeType] = match params.tipo.as_str() {
        "todos" => &[ChargeType::Cob, ChargeType::Cobv],
        "cob" => &[ChargeType::Cob],
        "cobv" => &[ChargeType::Cobv],
        other => {
            return Err(AppError::BadRequest(format!("Tipo de cobrança inválido: {}", other)));
        }
    };

    let service = &state.service_context.charge_service;
    let mut charges = Vec::new();
    for kind in kinds {
        charges.extend(service.list_recent(Some(*kind), params.limite).await?);
    }

    Ok(Json(charges.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodParams {
    data_inicio: Option<String>,
    data_fim: Option<String>,
}

fn parse_date(value: Option<&str>, name: &str) -> Result<NaiveDate> {
    let value = value.ok_or_else(|| AppError::BadRequest(format!("{} é obrigatória", name)))?;
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AppError::BadRequest("Formato de data inválido. Use o formato AAAA-MM-DD".to_string())
    })
}

pub async fn list_by_period(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<PeriodParams>,
) -> Result<Json<ListResponse>> {
    let start = parse_date(params.data_inicio.as_deref(), "dataInicio")?;
    let end = parse_date(params.data_fim.as_deref(), "dataFim")?;

    let charges = state.service_context.charge_service
        .list_due_between(start, end)
        .await?;
    Ok(Json(charges.into()))
}

pub async fn list_overdue(State(state): State<AppState>) -> Result<Json<ListResponse>> {
    let charges = state.service_context.charge_service.list_overdue().await?;
    Ok(Json(charges.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::is_valid_txid;
    use serde_json::json;

    fn request(doc: Value) -> CreateChargeRequest {
        serde_json::from_value(doc).unwrap()
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let err = request(json!({ "chave": "x@y.com", "valor": "10.00", "tipoCob": "cob" }))
            .into_charge()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "Chave Pix, valor e nome são obrigatórios"));

        let err = request(json!({ "chave": "k", "valor": "0", "nome": "A", "tipoCob": "cob" }))
            .into_charge()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn unknown_charge_type_is_rejected() {
        let err = request(json!({ "chave": "k", "valor": "1.00", "nome": "A", "tipoCob": "boleto" }))
            .into_charge()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "Tipo de cobrança inválido"));
    }

    #[test]
    fn immediate_charge_defaults() {
        let charge = request(json!({
            "chave": "x@y.com", "valor": "10.00", "nome": "A", "tipoCob": "cob", "banco": "001"
        }))
        .into_charge()
        .unwrap();

        assert_eq!(charge.kind, ChargeKind::Immediate { expiry_seconds: DEFAULT_EXPIRY_SECONDS });
        assert!(charge.txid.starts_with("cob001i"));
        assert!(is_valid_txid(&charge.txid));
        assert_eq!(charge.bank_code.as_deref(), Some("001"));
    }

    #[test]
    fn due_date_charge_requires_a_due_date() {
        let err = request(json!({ "chave": "k", "valor": "1.00", "nome": "A", "tipoCob": "cobv" }))
            .into_charge()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let charge = request(json!({
            "chave": "k", "valor": "1.00", "nome": "A", "tipoCob": "cobv",
            "dataVencimento": "2026-12-01",
            "multa": { "modalidade": 2, "valorPerc": "2.00" }
        }))
        .into_charge()
        .unwrap();
        let terms = charge.due_terms().unwrap();
        assert_eq!(terms.grace_days_after_due, DEFAULT_GRACE_DAYS);
        assert_eq!(terms.fine.unwrap().mode, 2);
    }

    #[test]
    fn payer_request_is_capped_at_140_chars() {
        let err = request(json!({
            "chave": "k", "valor": "1.00", "nome": "A", "tipoCob": "cob",
            "solicitacaoPagador": "x".repeat(141)
        }))
        .into_charge()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn status_view_for_paid_and_active_charges() {
        let paid: RemoteCharge = serde_json::from_value(json!({
            "status": "CONCLUIDA",
            "valor": { "original": "10.00" },
            "pix": [{ "endToEndId": "E1", "valor": "10.00", "horario": "2026-01-01T10:00:00Z" }]
        }))
        .unwrap();
        let view = payment_status_view("t", ChargeType::Cob, &paid);
        assert!(view.pago);
        assert_eq!(view.end_to_end_id.as_deref(), Some("E1"));

        let active: RemoteCharge = serde_json::from_value(json!({
            "status": "ATIVA",
            "calendario": { "dataDeVencimento": "2026-03-01" }
        }))
        .unwrap();
        let view = payment_status_view("t", ChargeType::Cobv, &active);
        assert!(!view.pago);
        assert_eq!(view.valor_original, "0");
        assert_eq!(view.data_vencimento.as_deref(), Some("2026-03-01"));
    }

    #[test]
    fn refund_view_covers_all_three_states() {
        let unpaid: RemoteCharge = serde_json::from_value(json!({ "status": "ATIVA" })).unwrap();
        assert_eq!(refund_view("t", &unpaid).status, "NAO_PAGO");

        let paid: RemoteCharge = serde_json::from_value(json!({ "pix": [{ "endToEndId": "E1" }] })).unwrap();
        assert_eq!(refund_view("t", &paid).status, "SEM_DEVOLUCAO");

        let refunded: RemoteCharge = serde_json::from_value(json!({
            "pix": [{
                "endToEndId": "E1",
                "devolucoes": [{
                    "id": "D1", "valor": "5.00", "status": "DEVOLVIDO",
                    "horario": { "solicitacao": "2026-01-02T10:00:00Z" }
                }]
            }]
        }))
        .unwrap();
        let view = refund_view("t", &refunded);
        assert_eq!(view.status, "COM_DEVOLUCAO");
        assert_eq!(view.id_devolucao.as_deref(), Some("D1"));
        assert_eq!(view.status_devolucao.as_deref(), Some("DEVOLVIDO"));
        assert_eq!(view.horario_solicitacao.as_deref(), Some("2026-01-02T10:00:00Z"));
        assert!(view.horario_liquidacao.is_none());
    }

    #[test]
    fn numeric_amount_is_accepted() {
        let charge = request(json!({ "chave": "k", "valor": 10.5, "nome": "A", "tipoCob": "cob" }))
            .into_charge()
            .unwrap();
        assert_eq!(charge.original_amount, Decimal::new(105, 1));
    }

    #[test]
    fn pay_body_is_optional_but_strict() {
        let empty = PayRequest::from_body(b"").unwrap();
        assert!(empty.end_to_end_id.is_none());
        assert!(empty.valor_pago.is_none());

        let parsed = PayRequest::from_body(br#"{"endToEndId":"E1","valorPago":"12.30"}"#).unwrap();
        assert_eq!(parsed.end_to_end_id.as_deref(), Some("E1"));
        assert_eq!(parsed.valor_pago, Some(Decimal::new(1230, 2)));

        assert!(matches!(
            PayRequest::from_body(br#"{"valorPago":"abc"}"#),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(PayRequest::from_body(b"{not json"), Err(AppError::Validation(_))));
        assert!(matches!(
            PayRequest::from_body(br#"{"valorPago":"-5.00"}"#),
            Err(AppError::Validation(_))
        ));
    }
}
