use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;

use crate::{
    domain::{Charge, ChargeType, DueDateTerms, ValueTerm},
    error::{AppError, Result},
    pix::{parse_remote_charge, PixClient, RemoteCharge},
    repository::ChargeRepository,
};
use super::{qr, reconciliation::Reconciler};

/// Fields a PATCH may change on a due-date charge. `None` leaves the field as is.
#[derive(Debug, Clone, Default)]
pub struct DueDateChargeUpdate {
    pub original_amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub grace_days_after_due: Option<i32>,
    pub payer_request: Option<String>,
    pub debtor_name: Option<String>,
    pub debtor_email: Option<String>,
    pub fine: Option<ValueTerm>,
    pub interest: Option<ValueTerm>,
    pub discount: Option<ValueTerm>,
    pub rebate: Option<ValueTerm>,
}

impl DueDateChargeUpdate {
    fn apply(self, charge: &mut Charge) -> Result<()> {
        if let Some(amount) = self.original_amount {
            charge.original_amount = amount;
        }
        if let Some(request) = self.payer_request {
            charge.payer_request = Some(request);
        }
        if let Some(name) = self.debtor_name {
            charge.debtor.name = name;
        }
        if let Some(email) = self.debtor_email {
            charge.debtor.email = Some(email);
        }

        let txid = charge.txid.clone();
        let terms: &mut DueDateTerms = charge.due_terms_mut().ok_or_else(|| {
            AppError::BadRequest(format!(
                "Cobrança {} é imediata e não pode ser alterada por este endpoint",
                txid
            ))
        })?;
        if let Some(due_date) = self.due_date {
            terms.due_date = due_date;
        }
        if let Some(days) = self.grace_days_after_due {
            terms.grace_days_after_due = days;
        }
        if self.fine.is_some() {
            terms.fine = self.fine;
        }
        if self.interest.is_some() {
            terms.interest = self.interest;
        }
        if self.discount.is_some() {
            terms.discount = self.discount;
        }
        if self.rebate.is_some() {
            terms.rebate = self.rebate;
        }

        charge.updated_at = Utc::now();
        Ok(())
    }
}

/// Charge lifecycle: remote call first, local write only after the PSP accepted.
pub struct ChargeService {
    charge_repo: Arc<dyn ChargeRepository>,
    pix: Arc<PixClient>,
    reconciler: Reconciler,
}

impl ChargeService {
    pub fn new(charge_repo: Arc<dyn ChargeRepository>, pix: Arc<PixClient>) -> Self {
        let reconciler = Reconciler::new(charge_repo.clone());
        Self {
            charge_repo,
            pix,
            reconciler,
        }
    }

    /// Sends the charge to the PSP and persists it once accepted.
    ///
    /// Returns the stored charge and the raw PSP response.
    pub async fn create(&self, mut charge: Charge) -> Result<(Charge, Value)> {
        tracing::info!(
            "Creating {} charge {}",
            charge.charge_type().as_str(),
            charge.txid
        );

        let response = self.pix.create(&mut charge).await?;
        let charge = self.charge_repo.upsert(charge).await?;

        tracing::info!("Charge {} created with status {}", charge.txid, charge.status.as_str());
        Ok((charge, response))
    }

    pub async fn find(&self, txid: &str) -> Result<Charge> {
        self.charge_repo
            .find_by_txid(txid)
            .await?
            .ok_or_else(|| not_found(txid))
    }

    /// Cancels at the PSP, then locally. Paid or already removed charges are rejected.
    pub async fn cancel(&self, txid: &str) -> Result<Charge> {
        let mut charge = self.find(txid).await?;
        reject_terminal(&charge, "cancelada")?;

        self.pix.update(&mut charge, true).await?;
        charge.cancel();
        let charge = self.charge_repo.upsert(charge).await?;

        tracing::info!("Charge {} cancelled", txid);
        Ok(charge)
    }

    /// Local-only payment registration used to simulate settlement outside production.
    pub async fn register_payment(
        &self,
        txid: &str,
        settlement_id: Option<String>,
        amount_paid: Option<Decimal>,
        payer_note: Option<String>,
    ) -> Result<Charge> {
        let mut charge = self.find(txid).await?;
        reject_terminal(&charge, "paga")?;

        let settlement_id = settlement_id
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("E{}", Utc::now().timestamp_millis()));
        let amount = amount_paid.unwrap_or(charge.original_amount);

        charge.register_payment(settlement_id, amount, Some(payer_note.unwrap_or_default()));
        let charge = self.charge_repo.upsert(charge).await?;

        tracing::info!("Payment registered on charge {}", txid);
        Ok(charge)
    }

    /// PATCHes a due-date charge at the PSP and stores the result.
    pub async fn update_due_date(&self, txid: &str, update: DueDateChargeUpdate) -> Result<Charge> {
        let mut charge = self.find(txid).await?;
        if charge.charge_type() != ChargeType::Cobv {
            return Err(AppError::BadRequest(format!(
                "Cobrança {} é imediata e não pode ser alterada por este endpoint",
                txid
            )));
        }
        reject_terminal(&charge, "alterada")?;

        update.apply(&mut charge)?;
        self.pix.update(&mut charge, false).await?;
        let charge = self.charge_repo.upsert(charge).await?;

        tracing::info!("Charge {} updated, revision {}", txid, charge.revision);
        Ok(charge)
    }

    /// Queries the PSP and merges the answer into the local store. Errors propagate.
    pub async fn refresh(&self, txid: &str) -> Result<Charge> {
        let (charge_type, value) = self.resolve_remote(txid).await?;
        let remote = parse_remote_charge(&value)?;
        let (_, charge) = self.reconciler.reconcile(charge_type, txid, &remote).await?;
        charge.ok_or_else(|| not_found(txid))
    }

    /// Raw PSP document; reconciliation happens on the side and never fails the call.
    pub async fn details(&self, txid: &str) -> Result<Value> {
        let (charge_type, value) = self.resolve_remote(txid).await?;
        if let Ok(remote) = parse_remote_charge(&value) {
            self.reconciler.reconcile_quietly(charge_type, txid, &remote).await;
        }
        Ok(value)
    }

    /// Parsed PSP view used by the status and refund lookups.
    ///
    /// A charge unknown locally that the PSP also rejects is reported as not found.
    pub async fn payment_status(&self, txid: &str) -> Result<(ChargeType, RemoteCharge)> {
        let known_locally = self.charge_repo.find_by_txid(txid).await?.is_some();

        let (charge_type, value) = match self.resolve_remote(txid).await {
            Ok(found) => found,
            Err(AppError::RemoteApi { status, body }) if !known_locally => {
                tracing::warn!("Charge {} unknown locally and at the PSP ({}): {}", txid, status, body);
                return Err(not_found(txid));
            }
            Err(e) => return Err(e),
        };

        let remote = parse_remote_charge(&value)?;
        self.reconciler.reconcile_quietly(charge_type, txid, &remote).await;
        Ok((charge_type, remote))
    }

    pub async fn list_recent(&self, charge_type: Option<ChargeType>, limit: i64) -> Result<Vec<Charge>> {
        self.charge_repo.list_recent(charge_type, limit).await
    }

    pub async fn list_due_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Charge>> {
        if end < start {
            return Err(AppError::BadRequest(
                "dataFim deve ser igual ou posterior a dataInicio".to_string(),
            ));
        }
        self.charge_repo.list_due_between(start, end).await
    }

    pub async fn list_overdue(&self) -> Result<Vec<Charge>> {
        self.charge_repo.list_overdue(Utc::now().date_naive()).await
    }

    /// PNG QR code of the stored copy-and-paste payload.
    pub async fn qr_code_png(&self, txid: &str) -> Result<Vec<u8>> {
        let charge = self.find(txid).await?;
        let payload = charge
            .copy_paste
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                AppError::BadRequest(format!("Cobrança {} não possui código Pix Copia e Cola", txid))
            })?;
        qr::render_png(payload)
    }

    /// Finds which PSP resource holds `txid` and returns its document.
    ///
    /// Locally known charges use their stored type. Unknown ones try `cob`
    /// first and fall back to `cobv` on any failure other than authentication,
    /// so a transient `cob` error on an immediate charge is misread as "try
    /// cobv" and surfaces as the `cobv` error instead.
    async fn resolve_remote(&self, txid: &str) -> Result<(ChargeType, Value)> {
        if let Some(charge) = self.charge_repo.find_by_txid(txid).await? {
            let charge_type = charge.charge_type();
            return Ok((charge_type, self.pix.query(charge_type, txid).await?));
        }

        match self.pix.query(ChargeType::Cob, txid).await {
            Ok(value) => Ok((ChargeType::Cob, value)),
            Err(e @ AppError::Authentication(_)) => Err(e),
            Err(e) => {
                tracing::warn!("Charge {} not found as cob ({}), trying cobv", txid, e);
                let value = self.pix.query(ChargeType::Cobv, txid).await?;
                Ok((ChargeType::Cobv, value))
            }
        }
    }
}

fn not_found(txid: &str) -> AppError {
    AppError::NotFound(format!("Cobrança {} não encontrada", txid))
}

fn reject_terminal(charge: &Charge, action: &str) -> Result<()> {
    if charge.is_paid() {
        tracing::warn!("Charge {} is already paid", charge.txid);
        return Err(AppError::Conflict(format!(
            "Cobrança {} já foi paga e não pode ser {}",
            charge.txid, action
        )));
    }
    if charge.is_terminal() {
        tracing::warn!("Charge {} is already {}", charge.txid, charge.status.as_str());
        return Err(AppError::Conflict(format!(
            "Cobrança {} está {} e não pode ser {}",
            charge.txid,
            charge.status.as_str(),
            action
        )));
    }
    Ok(())
}
