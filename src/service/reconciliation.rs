use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::{
    domain::{
        AdditionalInfo, Charge, ChargeKind, ChargeStatus, ChargeType, Debtor, DueDateTerms,
        Refund, RefundStatus, DEFAULT_GRACE_DAYS,
    },
    error::Result,
    pix::{
        payload::apply_remote_fields,
        response::{parse_amount, parse_instant},
        RemoteCharge, RemoteRefund,
    },
    repository::ChargeRepository,
};

/// Immediate charges adopted from the PSP without an expiry get this one.
pub const ADOPTED_EXPIRY_SECONDS: i64 = 3600;

/// Debtor name for adopted charges whose PSP document carries none.
pub const UNKNOWN_DEBTOR_NAME: &str = "Desconhecido";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Unknown locally; a local row was synthesized from the PSP document.
    Adopted,
    Updated,
    Unchanged,
    /// Local charge is terminal and was left alone.
    Skipped,
}

/// Merges PSP query responses into the local store.
pub struct Reconciler {
    charge_repo: Arc<dyn ChargeRepository>,
}

impl Reconciler {
    pub fn new(charge_repo: Arc<dyn ChargeRepository>) -> Self {
        Self { charge_repo }
    }

    /// Applies `remote` to the local charge `txid`, adopting it if unknown.
    ///
    /// Writes only when something changed, so feeding the same document twice
    /// registers the payment once and keeps a single row per txid.
    pub async fn reconcile(
        &self,
        charge_type: ChargeType,
        txid: &str,
        remote: &RemoteCharge,
    ) -> Result<(Outcome, Option<Charge>)> {
        match self.charge_repo.find_by_txid(txid).await? {
            None => {
                let mut charge = adopt(charge_type, txid, remote);
                merge(&mut charge, remote);
                let charge = self.charge_repo.upsert(charge).await?;
                tracing::info!("Adopted {} charge {} from the PSP", charge_type.as_str(), txid);
                Ok((Outcome::Adopted, Some(charge)))
            }
            Some(charge) if charge.is_terminal() && !settled_without_details(&charge) => {
                tracing::debug!("Charge {} is {}, not reconciling", txid, charge.status.as_str());
                Ok((Outcome::Skipped, Some(charge)))
            }
            Some(mut charge) => {
                if merge(&mut charge, remote) {
                    let charge = self.charge_repo.upsert(charge).await?;
                    Ok((Outcome::Updated, Some(charge)))
                } else {
                    Ok((Outcome::Unchanged, Some(charge)))
                }
            }
        }
    }

    /// Like `reconcile`, but failures are logged and dropped.
    pub async fn reconcile_quietly(
        &self,
        charge_type: ChargeType,
        txid: &str,
        remote: &RemoteCharge,
    ) -> Option<Charge> {
        match self.reconcile(charge_type, txid, remote).await {
            Ok((_, charge)) => charge,
            Err(e) => {
                tracing::error!("Failed to reconcile charge {}: {}", txid, e);
                None
            }
        }
    }
}

/// Minimal local charge built from a PSP document.
fn adopt(charge_type: ChargeType, txid: &str, remote: &RemoteCharge) -> Charge {
    let calendar = remote.calendario.clone().unwrap_or_default();

    let kind = match charge_type {
        ChargeType::Cob => ChargeKind::Immediate {
            expiry_seconds: calendar.expiracao.unwrap_or(ADOPTED_EXPIRY_SECONDS),
        },
        ChargeType::Cobv => {
            let due_date = calendar
                .data_de_vencimento
                .unwrap_or_else(|| Utc::now().date_naive());
            let mut terms = DueDateTerms::new(due_date);
            terms.grace_days_after_due = calendar
                .validade_apos_vencimento
                .unwrap_or(DEFAULT_GRACE_DAYS);
            ChargeKind::WithDueDate(terms)
        }
    };

    let mut debtor = remote
        .devedor
        .as_ref()
        .map(|d| Debtor {
            name: d.nome.clone().unwrap_or_default(),
            cpf: d.cpf.clone(),
            cnpj: d.cnpj.clone(),
            street: d.logradouro.clone(),
            city: d.cidade.clone(),
            state: d.uf.clone(),
            postal_code: d.cep.clone(),
            email: d.email.clone(),
        })
        .unwrap_or_default();
    if debtor.name.trim().is_empty() {
        debtor.name = UNKNOWN_DEBTOR_NAME.to_string();
    }

    let mut charge = Charge::new(
        txid.to_string(),
        remote.chave.clone().unwrap_or_default(),
        remote.original_amount().unwrap_or(Decimal::ZERO),
        debtor,
        kind,
    );
    charge.payer_request = remote.solicitacao_pagador.clone();
    charge.additional_info = remote
        .info_adicionais
        .iter()
        .map(|i| AdditionalInfo {
            name: i.nome.clone(),
            value: i.valor.clone(),
        })
        .collect();
    if let Some(created) = calendar.criacao.as_deref().and_then(parse_instant) {
        charge.created_at = created;
    }
    charge
}

/// Registers the first payment (if any) on an unpaid charge, then copies the
/// PSP-assigned fields. Returns whether the charge changed.
pub fn merge(charge: &mut Charge, remote: &RemoteCharge) -> bool {
    let mut changed = false;

    if charge.payment.is_none() {
        if let Some(pix) = remote.first_payment() {
            let settlement_id = pix
                .end_to_end_id
                .clone()
                .unwrap_or_else(|| format!("API{}", Utc::now().timestamp_millis()));
            let amount = pix
                .valor
                .as_deref()
                .and_then(parse_amount)
                .unwrap_or(charge.original_amount);
            let paid_at = pix
                .horario
                .as_deref()
                .and_then(parse_instant)
                .unwrap_or_else(Utc::now);

            charge.register_payment_at(settlement_id.clone(), amount, pix.info_pagador.clone(), paid_at);
            charge.refunds = pix.devolucoes.iter().filter_map(to_refund).collect();
            tracing::info!("Registered payment {} on charge {}", settlement_id, charge.txid);
            changed = true;
        }
    }

    if charge.payment.is_none() && remote.status.as_deref() == Some(ChargeStatus::Completed.as_str()) {
        tracing::warn!("PSP reports {} as paid without a pix entry", charge.txid);
    }

    apply_remote_fields(charge, remote) || changed
}

/// Marked paid from the PSP status alone, before any `pix` entry was seen.
fn settled_without_details(charge: &Charge) -> bool {
    charge.is_paid() && charge.payment.is_none()
}

fn to_refund(remote: &RemoteRefund) -> Option<Refund> {
    let refund_id = remote.id.clone().or_else(|| remote.rtr_id.clone())?;
    let times = remote.horario.clone().unwrap_or_default();

    Some(Refund {
        refund_id,
        return_id: remote.rtr_id.clone(),
        amount: remote
            .valor
            .as_deref()
            .and_then(parse_amount)
            .unwrap_or(Decimal::ZERO),
        nature: remote.natureza.clone(),
        description: remote.descricao.clone(),
        requested_at: times.solicitacao.as_deref().and_then(parse_instant),
        settled_at: times.liquidacao.as_deref().and_then(parse_instant),
        status: remote
            .status
            .as_deref()
            .and_then(RefundStatus::parse)
            .unwrap_or(RefundStatus::Processing),
        failure_reason: remote.motivo.clone(),
    })
}
