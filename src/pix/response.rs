use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

/// Charge document returned by the PSP for `cob` and `cobv` resources.
///
/// Every field is optional: the PSP omits what does not apply and we only
/// look at the parts we reconcile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteCharge {
    pub txid: Option<String>,
    pub status: Option<String>,
    pub revisao: Option<i32>,
    pub location: Option<String>,
    pub pix_copia_e_cola: Option<String>,
    pub chave: Option<String>,
    pub solicitacao_pagador: Option<String>,
    pub calendario: Option<RemoteCalendar>,
    pub devedor: Option<RemotePerson>,
    pub recebedor: Option<RemotePerson>,
    pub valor: Option<RemoteValue>,
    #[serde(deserialize_with = "null_as_default")]
    pub info_adicionais: Vec<RemoteInfo>,
    #[serde(deserialize_with = "null_as_default")]
    pub pix: Vec<RemotePix>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteCalendar {
    pub criacao: Option<String>,
    pub expiracao: Option<i64>,
    pub data_de_vencimento: Option<NaiveDate>,
    pub validade_apos_vencimento: Option<i32>,
}

/// Debtor or receiver block. Address fields only show up on `cobv`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemotePerson {
    pub nome: Option<String>,
    pub cpf: Option<String>,
    pub cnpj: Option<String>,
    pub logradouro: Option<String>,
    pub cidade: Option<String>,
    pub uf: Option<String>,
    pub cep: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteValue {
    pub original: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub nome: String,
    #[serde(deserialize_with = "null_as_default")]
    pub valor: String,
}

/// One settled Pix inside the `pix` array.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemotePix {
    pub end_to_end_id: Option<String>,
    pub txid: Option<String>,
    pub valor: Option<String>,
    pub horario: Option<String>,
    pub info_pagador: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub devolucoes: Vec<RemoteRefund>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteRefund {
    pub id: Option<String>,
    pub rtr_id: Option<String>,
    pub valor: Option<String>,
    pub natureza: Option<String>,
    pub descricao: Option<String>,
    pub horario: Option<RemoteRefundTimes>,
    pub status: Option<String>,
    pub motivo: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteRefundTimes {
    pub solicitacao: Option<String>,
    pub liquidacao: Option<String>,
}

/// Problem document (RFC 7807 style) the PSP sends on errors.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteProblem {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    #[serde(default)]
    pub detail: Option<String>,
}

impl RemoteProblem {
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }
}

impl RemoteCharge {
    pub fn original_amount(&self) -> Option<Decimal> {
        self.valor
            .as_ref()
            .and_then(|v| v.original.as_deref())
            .and_then(parse_amount)
    }

    pub fn first_payment(&self) -> Option<&RemotePix> {
        self.pix.first()
    }
}

/// PSPs send `null` for empty arrays as often as they omit the key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn parse_amount(s: &str) -> Option<Decimal> {
    Decimal::from_str(s.trim()).ok()
}

/// PSP timestamps are RFC 3339; a few sandboxes drop the offset.
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
