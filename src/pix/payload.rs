use serde_json::{json, Map, Value};

use crate::domain::{Charge, ChargeKind, ChargeStatus, Debtor, Receiver, ValueTerm};
use super::response::RemoteCharge;

/// Body for `PUT`/`PATCH` on either charge resource.
pub fn charge_body(charge: &Charge) -> Value {
    let mut body = Map::new();

    let mut valor = Map::new();
    valor.insert("original".into(), json!(format_amount(charge)));

    match &charge.kind {
        ChargeKind::Immediate { expiry_seconds } => {
            body.insert("calendario".into(), json!({ "expiracao": expiry_seconds }));
            body.insert("devedor".into(), debtor(&charge.debtor, false));
        }
        ChargeKind::WithDueDate(terms) => {
            body.insert(
                "calendario".into(),
                json!({
                    "dataDeVencimento": terms.due_date.format("%Y-%m-%d").to_string(),
                    "validadeAposVencimento": terms.grace_days_after_due,
                }),
            );
            body.insert("devedor".into(), debtor(&charge.debtor, true));

            for (name, term) in [
                ("multa", &terms.fine),
                ("juros", &terms.interest),
                ("abatimento", &terms.rebate),
                ("desconto", &terms.discount),
            ] {
                if let Some(term) = term {
                    valor.insert(name.into(), value_term(term));
                }
            }
        }
    }

    body.insert("valor".into(), Value::Object(valor));
    body.insert("chave".into(), json!(charge.payee_key));

    if let Some(request) = &charge.payer_request {
        body.insert("solicitacaoPagador".into(), json!(request));
    }

    if !charge.additional_info.is_empty() {
        let infos: Vec<Value> = charge
            .additional_info
            .iter()
            .map(|info| json!({ "nome": info.name, "valor": info.value }))
            .collect();
        body.insert("infoAdicionais".into(), Value::Array(infos));
    }

    Value::Object(body)
}

pub fn cancel_body() -> Value {
    json!({ "status": ChargeStatus::RemovedByPayee.as_str() })
}

fn format_amount(charge: &Charge) -> String {
    // The PSP expects two decimal places: "10.00", never "10".
    let mut amount = charge.original_amount;
    amount.rescale(2);
    amount.to_string()
}

fn debtor(debtor: &Debtor, with_address: bool) -> Value {
    let mut out = Map::new();

    // CNPJ wins when both are present
    if let Some(cnpj) = non_empty(&debtor.cnpj) {
        out.insert("cnpj".into(), json!(cnpj));
    } else if let Some(cpf) = non_empty(&debtor.cpf) {
        out.insert("cpf".into(), json!(cpf));
    }
    out.insert("nome".into(), json!(debtor.name));

    if with_address {
        for (name, field) in [
            ("logradouro", &debtor.street),
            ("cidade", &debtor.city),
            ("uf", &debtor.state),
            ("cep", &debtor.postal_code),
            ("email", &debtor.email),
        ] {
            if let Some(v) = non_empty(field) {
                out.insert(name.into(), json!(v));
            }
        }
    }

    Value::Object(out)
}

fn value_term(term: &ValueTerm) -> Value {
    json!({ "modalidade": term.mode, "valorPerc": term.value.to_string() })
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// Copies the PSP-assigned fields from a create/query response onto the charge.
///
/// Returns whether anything changed, so callers can skip redundant writes.
/// An `ATIVA` status in the response never overrides the local one.
pub fn apply_remote_fields(charge: &mut Charge, remote: &RemoteCharge) -> bool {
    let mut changed = false;

    if let Some(location) = &remote.location {
        if charge.location.as_ref() != Some(location) {
            charge.location = Some(location.clone());
            changed = true;
        }
    }

    if let Some(copy_paste) = &remote.pix_copia_e_cola {
        if charge.copy_paste.as_ref() != Some(copy_paste) {
            charge.copy_paste = Some(copy_paste.clone());
            changed = true;
        }
    }

    if let Some(revision) = remote.revisao {
        if charge.revision != revision {
            charge.revision = revision;
            changed = true;
        }
    }

    if let Some(status) = remote.status.as_deref().and_then(ChargeStatus::parse) {
        if status != ChargeStatus::Active && charge.status != status {
            charge.status = status;
            changed = true;
        }
    }

    if let Some(recebedor) = &remote.recebedor {
        let receiver = Receiver {
            name: recebedor.nome.clone(),
            cpf: recebedor.cpf.clone(),
            cnpj: recebedor.cnpj.clone(),
        };
        if charge.receiver.as_ref() != Some(&receiver) {
            charge.receiver = Some(receiver);
            changed = true;
        }
    }

    if changed {
        charge.updated_at = chrono::Utc::now();
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AdditionalInfo, DueDateTerms};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn debtor_with_both_ids() -> Debtor {
        Debtor {
            name: "Empresa X".into(),
            cpf: Some("12345678909".into()),
            cnpj: Some("12345678000195".into()),
            street: Some("Rua A, 10".into()),
            city: Some("Brasília".into()),
            state: Some("DF".into()),
            postal_code: Some("70000000".into()),
            email: Some("".into()),
        }
    }

    #[test]
    fn immediate_body_shape() {
        let mut charge = Charge::new(
            "t".repeat(30),
            "x@y.com".into(),
            Decimal::from(10),
            debtor_with_both_ids(),
            ChargeKind::Immediate { expiry_seconds: 3600 },
        );
        charge.payer_request = Some("Pedido 42".into());
        charge.additional_info.push(AdditionalInfo {
            name: "pedido".into(),
            value: "42".into(),
        });

        let body = charge_body(&charge);
        assert_eq!(body["calendario"]["expiracao"], 3600);
        assert_eq!(body["valor"]["original"], "10.00");
        assert_eq!(body["devedor"]["cnpj"], "12345678000195");
        assert!(body["devedor"].get("cpf").is_none());
        assert!(body["devedor"].get("logradouro").is_none());
        assert_eq!(body["chave"], "x@y.com");
        assert_eq!(body["solicitacaoPagador"], "Pedido 42");
        assert_eq!(body["infoAdicionais"][0]["nome"], "pedido");
    }

    #[test]
    fn due_date_body_carries_terms_and_address() {
        let mut terms = DueDateTerms::new(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
        terms.fine = Some(ValueTerm {
            mode: 2,
            value: Decimal::from_str("2.00").unwrap(),
        });
        let charge = Charge::new(
            "t".repeat(30),
            "chave".into(),
            Decimal::from_str("123.4").unwrap(),
            debtor_with_both_ids(),
            ChargeKind::WithDueDate(terms),
        );

        let body = charge_body(&charge);
        assert_eq!(body["calendario"]["dataDeVencimento"], "2026-03-15");
        assert_eq!(body["calendario"]["validadeAposVencimento"], 30);
        assert_eq!(body["valor"]["original"], "123.40");
        assert_eq!(body["valor"]["multa"]["modalidade"], 2);
        assert_eq!(body["valor"]["multa"]["valorPerc"], "2.00");
        assert!(body["valor"].get("juros").is_none());
        assert_eq!(body["devedor"]["cidade"], "Brasília");
        // empty strings are dropped
        assert!(body["devedor"].get("email").is_none());
        assert!(body.get("solicitacaoPagador").is_none());
        assert!(body.get("infoAdicionais").is_none());
    }

    #[test]
    fn cancel_body_is_status_only() {
        assert_eq!(
            cancel_body(),
            json!({ "status": "REMOVIDA_PELO_USUARIO_RECEBEDOR" })
        );
    }

    #[test]
    fn apply_ignores_active_status_and_reports_changes() {
        let mut charge = Charge::new(
            "t".repeat(30),
            "k".into(),
            Decimal::ONE,
            Debtor::default(),
            ChargeKind::Immediate { expiry_seconds: 60 },
        );
        let remote: RemoteCharge = serde_json::from_value(json!({
            "status": "ATIVA",
            "revisao": 1,
            "location": "pix.example.com/qr/v2/abc",
            "pixCopiaECola": "00020101021226...",
            "recebedor": { "nome": "Loja" }
        }))
        .unwrap();

        assert!(apply_remote_fields(&mut charge, &remote));
        assert_eq!(charge.status, ChargeStatus::Active);
        assert_eq!(charge.revision, 1);
        assert_eq!(charge.copy_paste.as_deref(), Some("00020101021226..."));
        assert_eq!(charge.receiver.as_ref().unwrap().name.as_deref(), Some("Loja"));

        // same document again is a no-op
        assert!(!apply_remote_fields(&mut charge, &remote));
    }

    #[test]
    fn apply_takes_terminal_status() {
        let mut charge = Charge::new(
            "t".repeat(30),
            "k".into(),
            Decimal::ONE,
            Debtor::default(),
            ChargeKind::Immediate { expiry_seconds: 60 },
        );
        let remote: RemoteCharge =
            serde_json::from_value(json!({ "status": "REMOVIDA_PELO_PSP" })).unwrap();
        assert!(apply_remote_fields(&mut charge, &remote));
        assert_eq!(charge.status, ChargeStatus::RemovedByPsp);
    }
}
