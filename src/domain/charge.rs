use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_EXPIRY_SECONDS: i64 = 86_400;
pub const DEFAULT_GRACE_DAYS: i32 = 30;

/// A Pix charge as known locally. Immediate and due-date charges share every
/// field except the calendar terms held in `kind`.
#[derive(Debug, Clone, PartialEq)]
pub struct Charge {
    pub id: Uuid,
    pub txid: String,
    pub payee_key: String,
    pub original_amount: Decimal,
    pub debtor: Debtor,
    pub status: ChargeStatus,
    pub revision: i32,
    pub bank_code: Option<String>,
    pub payer_request: Option<String>,
    pub location: Option<String>,
    pub copy_paste: Option<String>,
    pub receiver: Option<Receiver>,
    pub kind: ChargeKind,
    pub payment: Option<PaymentRecord>,
    pub additional_info: Vec<AdditionalInfo>,
    pub refunds: Vec<Refund>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChargeKind {
    Immediate { expiry_seconds: i64 },
    WithDueDate(DueDateTerms),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DueDateTerms {
    pub due_date: NaiveDate,
    pub grace_days_after_due: i32,
    pub fine: Option<ValueTerm>,
    pub interest: Option<ValueTerm>,
    pub discount: Option<ValueTerm>,
    pub rebate: Option<ValueTerm>,
}

impl DueDateTerms {
    pub fn new(due_date: NaiveDate) -> Self {
        Self {
            due_date,
            grace_days_after_due: DEFAULT_GRACE_DAYS,
            fine: None,
            interest: None,
            discount: None,
            rebate: None,
        }
    }
}

/// Fee, interest, discount or rebate: a PSP modality code plus its amount or percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueTerm {
    #[serde(rename = "modalidade")]
    pub mode: i32,
    #[serde(rename = "valorPerc")]
    pub value: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeType {
    Cob,
    Cobv,
}

impl ChargeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeType::Cob => "cob",
            ChargeType::Cobv => "cobv",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cob" => Some(ChargeType::Cob),
            "cobv" => Some(ChargeType::Cobv),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargeStatus {
    #[serde(rename = "ATIVA")]
    Active,
    #[serde(rename = "CONCLUIDA")]
    Completed,
    #[serde(rename = "REMOVIDA_PELO_USUARIO_RECEBEDOR")]
    RemovedByPayee,
    #[serde(rename = "REMOVIDA_PELO_PSP")]
    RemovedByPsp,
}

impl ChargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeStatus::Active => "ATIVA",
            ChargeStatus::Completed => "CONCLUIDA",
            ChargeStatus::RemovedByPayee => "REMOVIDA_PELO_USUARIO_RECEBEDOR",
            ChargeStatus::RemovedByPsp => "REMOVIDA_PELO_PSP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ATIVA" => Some(ChargeStatus::Active),
            "CONCLUIDA" => Some(ChargeStatus::Completed),
            "REMOVIDA_PELO_USUARIO_RECEBEDOR" => Some(ChargeStatus::RemovedByPayee),
            "REMOVIDA_PELO_PSP" => Some(ChargeStatus::RemovedByPsp),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChargeStatus::Active)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Debtor {
    pub name: String,
    pub cpf: Option<String>,
    pub cnpj: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub email: Option<String>,
}

/// Receiving account as reported back by the PSP.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Receiver {
    pub name: Option<String>,
    pub cpf: Option<String>,
    pub cnpj: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRecord {
    pub settlement_id: String,
    pub amount_paid: Decimal,
    pub paid_at: DateTime<Utc>,
    pub payer_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalInfo {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Refund {
    pub refund_id: String,
    pub return_id: Option<String>,
    pub amount: Decimal,
    pub nature: Option<String>,
    pub description: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
    pub status: RefundStatus,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundStatus {
    #[serde(rename = "EM_PROCESSAMENTO")]
    Processing,
    #[serde(rename = "DEVOLVIDO")]
    Refunded,
    #[serde(rename = "NAO_REALIZADO")]
    Failed,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Processing => "EM_PROCESSAMENTO",
            RefundStatus::Refunded => "DEVOLVIDO",
            RefundStatus::Failed => "NAO_REALIZADO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EM_PROCESSAMENTO" => Some(RefundStatus::Processing),
            "DEVOLVIDO" => Some(RefundStatus::Refunded),
            "NAO_REALIZADO" => Some(RefundStatus::Failed),
            _ => None,
        }
    }
}

impl Charge {
    /// A fresh, active charge that has not been sent to the PSP yet.
    pub fn new(
        txid: String,
        payee_key: String,
        original_amount: Decimal,
        debtor: Debtor,
        kind: ChargeKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            txid,
            payee_key,
            original_amount,
            debtor,
            status: ChargeStatus::Active,
            revision: 0,
            bank_code: None,
            payer_request: None,
            location: None,
            copy_paste: None,
            receiver: None,
            kind,
            payment: None,
            additional_info: Vec::new(),
            refunds: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn charge_type(&self) -> ChargeType {
        match self.kind {
            ChargeKind::Immediate { .. } => ChargeType::Cob,
            ChargeKind::WithDueDate(_) => ChargeType::Cobv,
        }
    }

    pub fn due_terms(&self) -> Option<&DueDateTerms> {
        match &self.kind {
            ChargeKind::WithDueDate(terms) => Some(terms),
            ChargeKind::Immediate { .. } => None,
        }
    }

    pub fn due_terms_mut(&mut self) -> Option<&mut DueDateTerms> {
        match &mut self.kind {
            ChargeKind::WithDueDate(terms) => Some(terms),
            ChargeKind::Immediate { .. } => None,
        }
    }

    /// Instant an immediate charge stops being payable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self.kind {
            ChargeKind::Immediate { expiry_seconds } => {
                Some(self.created_at + Duration::seconds(expiry_seconds))
            }
            ChargeKind::WithDueDate(_) => None,
        }
    }

    /// Records the settlement and moves the charge to COMPLETED.
    ///
    /// Does not guard against being called twice: a second call overwrites the
    /// payment data. Callers check `is_paid()` first.
    pub fn register_payment(
        &mut self,
        settlement_id: String,
        amount_paid: Decimal,
        payer_note: Option<String>,
    ) {
        self.register_payment_at(settlement_id, amount_paid, payer_note, Utc::now());
    }

    pub fn register_payment_at(
        &mut self,
        settlement_id: String,
        amount_paid: Decimal,
        payer_note: Option<String>,
        paid_at: DateTime<Utc>,
    ) {
        self.payment = Some(PaymentRecord {
            settlement_id,
            amount_paid,
            paid_at,
            payer_note,
        });
        self.status = ChargeStatus::Completed;
        self.updated_at = Utc::now();
    }

    /// Marks the charge as removed by the payee. Callers reject paid charges first.
    pub fn cancel(&mut self) {
        self.status = ChargeStatus::RemovedByPayee;
        self.updated_at = Utc::now();
    }

    pub fn is_active(&self) -> bool {
        self.status == ChargeStatus::Active
    }

    pub fn is_paid(&self) -> bool {
        self.status == ChargeStatus::Completed
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn immediate() -> Charge {
        Charge::new(
            "cob001i0123456789abcdef0123456789ab".to_string(),
            "x@y.com".to_string(),
            Decimal::from_str("10.00").unwrap(),
            Debtor {
                name: "A".to_string(),
                ..Default::default()
            },
            ChargeKind::Immediate {
                expiry_seconds: DEFAULT_EXPIRY_SECONDS,
            },
        )
    }

    #[test]
    fn new_charge_is_active_and_unpaid() {
        let charge = immediate();
        assert!(charge.is_active());
        assert!(!charge.is_paid());
        assert!(!charge.is_terminal());
        assert_eq!(charge.charge_type(), ChargeType::Cob);
    }

    #[test]
    fn register_payment_completes_the_charge() {
        let mut charge = immediate();
        charge.register_payment(
            "E123".to_string(),
            Decimal::from_str("10.00").unwrap(),
            Some("obrigado".to_string()),
        );

        assert!(charge.is_paid());
        assert!(!charge.is_active());
        assert_eq!(charge.status, ChargeStatus::Completed);
        let payment = charge.payment.as_ref().unwrap();
        assert_eq!(payment.settlement_id, "E123");
        assert_eq!(payment.payer_note.as_deref(), Some("obrigado"));
    }

    #[test]
    fn second_registration_overwrites_payment_data() {
        let mut charge = immediate();
        charge.register_payment("E1".into(), Decimal::ONE, None);
        charge.register_payment("E2".into(), Decimal::TWO, None);
        assert_eq!(charge.payment.unwrap().settlement_id, "E2");
    }

    #[test]
    fn cancel_is_terminal() {
        let mut charge = immediate();
        charge.cancel();
        assert_eq!(charge.status, ChargeStatus::RemovedByPayee);
        assert!(charge.is_terminal());
        assert!(!charge.is_active());
    }

    #[test]
    fn immediate_expiry_is_relative_to_creation() {
        let charge = immediate();
        assert_eq!(
            charge.expires_at().unwrap(),
            charge.created_at + Duration::seconds(86_400)
        );
    }

    #[test]
    fn due_date_terms_default_grace() {
        let terms = DueDateTerms::new(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap());
        assert_eq!(terms.grace_days_after_due, 30);
        assert!(terms.fine.is_none());
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            ChargeStatus::Active,
            ChargeStatus::Completed,
            ChargeStatus::RemovedByPayee,
            ChargeStatus::RemovedByPsp,
        ] {
            assert_eq!(ChargeStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ChargeStatus::parse("ativa"), None);
    }

    #[test]
    fn charge_type_parse_is_case_insensitive() {
        assert_eq!(ChargeType::parse("COBV"), Some(ChargeType::Cobv));
        assert_eq!(ChargeType::parse(" cob "), Some(ChargeType::Cob));
        assert_eq!(ChargeType::parse("boleto"), None);
    }
}
