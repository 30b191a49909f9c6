use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use uuid::Uuid;

use crate::{
    domain::{
        AdditionalInfo, Charge, ChargeKind, ChargeStatus, ChargeType, Debtor, DueDateTerms,
        PaymentRecord, Receiver, Refund, RefundStatus, ValueTerm, DEFAULT_EXPIRY_SECONDS,
        DEFAULT_GRACE_DAYS,
    },
    error::{AppError, Result},
    repository::ChargeRepository,
};

const CHARGE_COLUMNS: &str = r#"
    id, txid, charge_type, payee_key, original_amount, status, revision, bank_code,
    debtor_name, debtor_cpf, debtor_cnpj, debtor_street, debtor_city, debtor_state,
    debtor_postal_code, debtor_email,
    payer_request, location, copy_paste, receiver_name, receiver_cpf, receiver_cnpj,
    expiry_seconds,
    due_date, grace_days_after_due, fine_mode, fine_value, interest_mode, interest_value,
    discount_mode, discount_value, rebate_mode, rebate_value,
    settlement_id, amount_paid, paid_at, payer_note,
    created_at, updated_at
"#;

#[derive(FromRow)]
struct ChargeRow {
    id: String,
    txid: String,
    charge_type: String,
    payee_key: String,
    original_amount: String,
    status: String,
    revision: i32,
    bank_code: Option<String>,
    debtor_name: String,
    debtor_cpf: Option<String>,
    debtor_cnpj: Option<String>,
    debtor_street: Option<String>,
    debtor_city: Option<String>,
    debtor_state: Option<String>,
    debtor_postal_code: Option<String>,
    debtor_email: Option<String>,
    payer_request: Option<String>,
    location: Option<String>,
    copy_paste: Option<String>,
    receiver_name: Option<String>,
    receiver_cpf: Option<String>,
    receiver_cnpj: Option<String>,
    expiry_seconds: Option<i64>,
    due_date: Option<NaiveDate>,
    grace_days_after_due: Option<i32>,
    fine_mode: Option<i32>,
    fine_value: Option<String>,
    interest_mode: Option<i32>,
    interest_value: Option<String>,
    discount_mode: Option<i32>,
    discount_value: Option<String>,
    rebate_mode: Option<i32>,
    rebate_value: Option<String>,
    settlement_id: Option<String>,
    amount_paid: Option<String>,
    paid_at: Option<NaiveDateTime>,
    payer_note: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct AdditionalInfoRow {
    name: String,
    value: String,
}

#[derive(FromRow)]
struct RefundRow {
    refund_id: String,
    return_id: Option<String>,
    amount: String,
    nature: Option<String>,
    description: Option<String>,
    requested_at: Option<NaiveDateTime>,
    settled_at: Option<NaiveDateTime>,
    status: String,
    failure_reason: Option<String>,
}

pub struct SqliteChargeRepository {
    pool: SqlitePool,
}

impl SqliteChargeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: ChargeRow) -> Result<Charge> {
        let additional_info = sqlx::query_as::<_, AdditionalInfoRow>(
            "SELECT name, value FROM charge_additional_info WHERE charge_id = ? ORDER BY position",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .into_iter()
        .map(|r| AdditionalInfo { name: r.name, value: r.value })
        .collect();

        let refunds = sqlx::query_as::<_, RefundRow>(
            r#"
            SELECT refund_id, return_id, amount, nature, description,
                   requested_at, settled_at, status, failure_reason
            FROM charge_refunds
            WHERE charge_id = ?
            ORDER BY requested_at
            "#
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .into_iter()
        .map(Self::row_to_refund)
        .collect::<Result<Vec<_>>>()?;

        let mut charge = Self::row_to_charge(row)?;
        charge.additional_info = additional_info;
        charge.refunds = refunds;
        Ok(charge)
    }

    async fn hydrate_all(&self, rows: Vec<ChargeRow>) -> Result<Vec<Charge>> {
        let mut charges = Vec::with_capacity(rows.len());
        for row in rows {
            charges.push(self.hydrate(row).await?);
        }
        Ok(charges)
    }

    fn row_to_charge(row: ChargeRow) -> Result<Charge> {
        let kind = match Self::parse_charge_type(&row.charge_type)? {
            ChargeType::Cob => ChargeKind::Immediate {
                expiry_seconds: row.expiry_seconds.unwrap_or(DEFAULT_EXPIRY_SECONDS),
            },
            ChargeType::Cobv => ChargeKind::WithDueDate(DueDateTerms {
                due_date: row.due_date.ok_or_else(|| {
                    AppError::Database(format!("Charge {} has no due date", row.txid))
                })?,
                grace_days_after_due: row.grace_days_after_due.unwrap_or(DEFAULT_GRACE_DAYS),
                fine: Self::parse_term(row.fine_mode, row.fine_value.as_deref())?,
                interest: Self::parse_term(row.interest_mode, row.interest_value.as_deref())?,
                discount: Self::parse_term(row.discount_mode, row.discount_value.as_deref())?,
                rebate: Self::parse_term(row.rebate_mode, row.rebate_value.as_deref())?,
            }),
        };

        let payment = match (row.settlement_id, row.amount_paid, row.paid_at) {
            (Some(settlement_id), Some(amount), Some(paid_at)) => Some(PaymentRecord {
                settlement_id,
                amount_paid: Self::parse_decimal(&amount)?,
                paid_at: DateTime::from_naive_utc_and_offset(paid_at, Utc),
                payer_note: row.payer_note,
            }),
            _ => None,
        };

        let receiver = if row.receiver_name.is_some()
            || row.receiver_cpf.is_some()
            || row.receiver_cnpj.is_some()
        {
            Some(Receiver {
                name: row.receiver_name,
                cpf: row.receiver_cpf,
                cnpj: row.receiver_cnpj,
            })
        } else {
            None
        };

        Ok(Charge {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            txid: row.txid,
            payee_key: row.payee_key,
            original_amount: Self::parse_decimal(&row.original_amount)?,
            debtor: Debtor {
                name: row.debtor_name,
                cpf: row.debtor_cpf,
                cnpj: row.debtor_cnpj,
                street: row.debtor_street,
                city: row.debtor_city,
                state: row.debtor_state,
                postal_code: row.debtor_postal_code,
                email: row.debtor_email,
            },
            status: ChargeStatus::parse(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid charge status: {}", row.status)))?,
            revision: row.revision,
            bank_code: row.bank_code,
            payer_request: row.payer_request,
            location: row.location,
            copy_paste: row.copy_paste,
            receiver,
            kind,
            payment,
            additional_info: Vec::new(),
            refunds: Vec::new(),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_refund(row: RefundRow) -> Result<Refund> {
        Ok(Refund {
            refund_id: row.refund_id,
            return_id: row.return_id,
            amount: Self::parse_decimal(&row.amount)?,
            nature: row.nature,
            description: row.description,
            requested_at: row.requested_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            settled_at: row.settled_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            status: RefundStatus::parse(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid refund status: {}", row.status)))?,
            failure_reason: row.failure_reason,
        })
    }

    fn parse_charge_type(s: &str) -> Result<ChargeType> {
        ChargeType::parse(s).ok_or_else(|| AppError::Database(format!("Invalid charge type: {}", s)))
    }

    fn parse_decimal(s: &str) -> Result<Decimal> {
        Decimal::from_str(s).map_err(|e| AppError::Database(format!("Invalid amount {}: {}", s, e)))
    }

    fn parse_term(mode: Option<i32>, value: Option<&str>) -> Result<Option<ValueTerm>> {
        match (mode, value) {
            (Some(mode), Some(value)) => Ok(Some(ValueTerm {
                mode,
                value: Self::parse_decimal(value)?,
            })),
            _ => Ok(None),
        }
    }

    async fn write_children(tx: &mut Transaction<'_, Sqlite>, charge: &Charge) -> Result<()> {
        let charge_id = charge.id.to_string();

        sqlx::query("DELETE FROM charge_additional_info WHERE charge_id = ?")
            .bind(&charge_id)
            .execute(&mut **tx)
            .await?;

        for (position, info) in charge.additional_info.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO charge_additional_info (id, charge_id, position, name, value)
                VALUES (?, ?, ?, ?, ?)
                "#
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&charge_id)
            .bind(position as i64)
            .bind(&info.name)
            .bind(&info.value)
            .execute(&mut **tx)
            .await?;
        }

        sqlx::query("DELETE FROM charge_refunds WHERE charge_id = ?")
            .bind(&charge_id)
            .execute(&mut **tx)
            .await?;

        for refund in &charge.refunds {
            sqlx::query(
                r#"
                INSERT INTO charge_refunds (
                    id, charge_id, refund_id, return_id, amount, nature, description,
                    requested_at, settled_at, status, failure_reason
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&charge_id)
            .bind(&refund.refund_id)
            .bind(&refund.return_id)
            .bind(refund.amount.to_string())
            .bind(&refund.nature)
            .bind(&refund.description)
            .bind(refund.requested_at.map(|dt| dt.naive_utc()))
            .bind(refund.settled_at.map(|dt| dt.naive_utc()))
            .bind(refund.status.as_str())
            .bind(&refund.failure_reason)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl ChargeRepository for SqliteChargeRepository {
    async fn find_by_txid(&self, txid: &str) -> Result<Option<Charge>> {
        let row = sqlx::query_as::<_, ChargeRow>(&format!(
            "SELECT {} FROM charges WHERE txid = ?",
            CHARGE_COLUMNS
        ))
        .bind(txid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, mut charge: Charge) -> Result<Charge> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(String, NaiveDateTime)> =
            sqlx::query_as("SELECT id, created_at FROM charges WHERE txid = ?")
                .bind(&charge.txid)
                .fetch_optional(&mut *tx)
                .await?;

        // Keyed by txid: an existing row keeps its surrogate id and creation time
        if let Some((id, created_at)) = existing {
            charge.id = Uuid::parse_str(&id).map_err(|e| AppError::Database(e.to_string()))?;
            charge.created_at = DateTime::from_naive_utc_and_offset(created_at, Utc);
        }

        let (expiry_seconds, terms) = match &charge.kind {
            ChargeKind::Immediate { expiry_seconds } => (Some(*expiry_seconds), None),
            ChargeKind::WithDueDate(terms) => (None, Some(terms)),
        };
        let term_mode = |t: Option<&ValueTerm>| t.map(|t| t.mode);
        let term_value = |t: Option<&ValueTerm>| t.map(|t| t.value.to_string());
        let fine = terms.and_then(|t| t.fine.as_ref());
        let interest = terms.and_then(|t| t.interest.as_ref());
        let discount = terms.and_then(|t| t.discount.as_ref());
        let rebate = terms.and_then(|t| t.rebate.as_ref());
        let receiver = charge.receiver.clone().unwrap_or_default();
        let payment = charge.payment.as_ref();

        sqlx::query(&format!(
            r#"
            INSERT INTO charges ({})
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                    ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                payee_key = excluded.payee_key,
                original_amount = excluded.original_amount,
                status = excluded.status,
                revision = excluded.revision,
                bank_code = excluded.bank_code,
                debtor_name = excluded.debtor_name,
                debtor_cpf = excluded.debtor_cpf,
                debtor_cnpj = excluded.debtor_cnpj,
                debtor_street = excluded.debtor_street,
                debtor_city = excluded.debtor_city,
                debtor_state = excluded.debtor_state,
                debtor_postal_code = excluded.debtor_postal_code,
                debtor_email = excluded.debtor_email,
                payer_request = excluded.payer_request,
                location = excluded.location,
                copy_paste = excluded.copy_paste,
                receiver_name = excluded.receiver_name,
                receiver_cpf = excluded.receiver_cpf,
                receiver_cnpj = excluded.receiver_cnpj,
                expiry_seconds = excluded.expiry_seconds,
                due_date = excluded.due_date,
                grace_days_after_due = excluded.grace_days_after_due,
                fine_mode = excluded.fine_mode,
                fine_value = excluded.fine_value,
                interest_mode = excluded.interest_mode,
                interest_value = excluded.interest_value,
                discount_mode = excluded.discount_mode,
                discount_value = excluded.discount_value,
                rebate_mode = excluded.rebate_mode,
                rebate_value = excluded.rebate_value,
                settlement_id = excluded.settlement_id,
                amount_paid = excluded.amount_paid,
                paid_at = excluded.paid_at,
                payer_note = excluded.payer_note,
                updated_at = excluded.updated_at
            "#,
            CHARGE_COLUMNS
        ))
        .bind(charge.id.to_string())
        .bind(&charge.txid)
        .bind(charge.charge_type().as_str())
        .bind(&charge.payee_key)
        .bind(charge.original_amount.to_string())
        .bind(charge.status.as_str())
        .bind(charge.revision)
        .bind(&charge.bank_code)
        .bind(&charge.debtor.name)
        .bind(&charge.debtor.cpf)
        .bind(&charge.debtor.cnpj)
        .bind(&charge.debtor.street)
        .bind(&charge.debtor.city)
        .bind(&charge.debtor.state)
        .bind(&charge.debtor.postal_code)
        .bind(&charge.debtor.email)
        .bind(&charge.payer_request)
        .bind(&charge.location)
        .bind(&charge.copy_paste)
        .bind(&receiver.name)
        .bind(&receiver.cpf)
        .bind(&receiver.cnpj)
        .bind(expiry_seconds)
        .bind(terms.map(|t| t.due_date))
        .bind(terms.map(|t| t.grace_days_after_due))
        .bind(term_mode(fine))
        .bind(term_value(fine))
        .bind(term_mode(interest))
        .bind(term_value(interest))
        .bind(term_mode(discount))
        .bind(term_value(discount))
        .bind(term_mode(rebate))
        .bind(term_value(rebate))
        .bind(payment.map(|p| p.settlement_id.clone()))
        .bind(payment.map(|p| p.amount_paid.to_string()))
        .bind(payment.map(|p| p.paid_at.naive_utc()))
        .bind(payment.and_then(|p| p.payer_note.clone()))
        .bind(charge.created_at.naive_utc())
        .bind(charge.updated_at.naive_utc())
        .execute(&mut *tx)
        .await?;

        Self::write_children(&mut tx, &charge).await?;

        tx.commit().await?;

        tracing::debug!("Upserted charge {} ({})", charge.txid, charge.charge_type().as_str());

        self.find_by_txid(&charge.txid).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve upserted charge".to_string())
        })
    }

    async fn list_recent(&self, charge_type: Option<ChargeType>, limit: i64) -> Result<Vec<Charge>> {
        let type_filter = charge_type.map(|t| t.as_str());
        let rows = sqlx::query_as::<_, ChargeRow>(&format!(
            r#"
            SELECT {} FROM charges
            WHERE (? IS NULL OR charge_type = ?)
            ORDER BY created_at DESC
            LIMIT ?
            "#,
            CHARGE_COLUMNS
        ))
        .bind(type_filter)
        .bind(type_filter)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.hydrate_all(rows).await
    }

    async fn list_due_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Charge>> {
        let due_rows = sqlx::query_as::<_, ChargeRow>(&format!(
            r#"
            SELECT {} FROM charges
            WHERE charge_type = 'cobv' AND due_date BETWEEN ? AND ?
            "#,
            CHARGE_COLUMNS
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        // Immediate charges expire at created_at + expiry_seconds; filtered here
        // rather than with SQLite date arithmetic on text timestamps.
        let active_immediate = sqlx::query_as::<_, ChargeRow>(&format!(
            r#"
            SELECT {} FROM charges
            WHERE charge_type = 'cob' AND status = 'ATIVA'
            "#,
            CHARGE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let mut charges = self.hydrate_all(due_rows).await?;
        for charge in self.hydrate_all(active_immediate).await? {
            if let Some(expires) = charge.expires_at() {
                let day = expires.date_naive();
                if day >= start && day <= end {
                    charges.push(charge);
                }
            }
        }

        charges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(charges)
    }

    async fn list_overdue(&self, reference: NaiveDate) -> Result<Vec<Charge>> {
        let rows = sqlx::query_as::<_, ChargeRow>(&format!(
            r#"
            SELECT {} FROM charges
            WHERE charge_type = 'cobv' AND status = 'ATIVA' AND due_date < ?
            ORDER BY due_date
            "#,
            CHARGE_COLUMNS
        ))
        .bind(reference)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.hydrate_all(rows).await
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM charges")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count)
    }
}
