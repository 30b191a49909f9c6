use chrono::Utc;
use uuid::Uuid;

use super::ChargeType;

pub const TXID_LEN: usize = 35;

/// Generates a fresh txid for a charge of the given type.
///
/// Layout: type prefix (`cob<bank>i`, `cobv<bank>i`, or `pix` when no type is
/// known), a hyphen-less v4 UUID and the epoch millis in base 36, cut or
/// right-padded with `0` to exactly 35 alphanumeric characters.
pub fn generate_txid(charge_type: Option<ChargeType>, bank_code: &str) -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    build_txid(charge_type, bank_code, Uuid::new_v4(), millis)
}

pub fn build_txid(
    charge_type: Option<ChargeType>,
    bank_code: &str,
    uuid: Uuid,
    epoch_millis: u64,
) -> String {
    let prefix = match charge_type {
        Some(ChargeType::Cob) => format!("cob{}i", bank_code),
        Some(ChargeType::Cobv) => format!("cobv{}i", bank_code),
        None => "pix".to_string(),
    };

    let raw = format!("{}{}{}", prefix, uuid.simple(), to_base36(epoch_millis));

    let mut txid: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(TXID_LEN)
        .collect();
    while txid.len() < TXID_LEN {
        txid.push('0');
    }
    txid
}

/// Accepts what the PSP accepts: 26 to 35 ASCII alphanumerics.
pub fn is_valid_txid(txid: &str) -> bool {
    (26..=TXID_LEN).contains(&txid.len()) && txid.chars().all(|c| c.is_ascii_alphanumeric())
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn immediate_prefix_carries_bank_code() {
        let txid = build_txid(Some(ChargeType::Cob), "001", Uuid::nil(), 0);
        assert!(txid.starts_with("cob001i"));
        assert_eq!(txid.len(), TXID_LEN);
    }

    #[test]
    fn due_date_prefix() {
        let txid = generate_txid(Some(ChargeType::Cobv), "237");
        assert!(txid.starts_with("cobv237i"));
        assert!(is_valid_txid(&txid));
    }

    #[test]
    fn untyped_prefix_is_pix() {
        let txid = generate_txid(None, "ignored");
        assert!(txid.starts_with("pix"));
        assert_eq!(txid.len(), TXID_LEN);
    }

    #[test]
    fn base36_matches_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn validity_bounds() {
        assert!(!is_valid_txid("short"));
        assert!(is_valid_txid(&"a".repeat(26)));
        assert!(!is_valid_txid(&"a".repeat(36)));
        assert!(!is_valid_txid(&format!("{}-", "a".repeat(30))));
    }

    proptest! {
        #[test]
        fn txid_is_always_35_alphanumerics(
            bank in ".{0,40}",
            millis in any::<u64>(),
            bytes in any::<[u8; 16]>(),
            kind in prop_oneof![
                Just(None),
                Just(Some(ChargeType::Cob)),
                Just(Some(ChargeType::Cobv)),
            ],
        ) {
            let txid = build_txid(kind, &bank, Uuid::from_bytes(bytes), millis);
            prop_assert_eq!(txid.len(), TXID_LEN);
            prop_assert!(is_valid_txid(&txid));
        }
    }
}
