use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Tokens within this window of their expiry are treated as already expired.
pub const SAFETY_MARGIN_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub id: Uuid,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn issued_now(value: String, expires_in_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            value,
            created_at: now,
            expires_at: now + Duration::seconds(expires_in_seconds),
        }
    }

    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }

    /// Expired, or close enough to expiry that it should be renewed.
    pub fn needs_renewal(&self) -> bool {
        Utc::now() + Duration::minutes(SAFETY_MARGIN_MINUTES) >= self.expires_at
    }

    pub fn minutes_remaining(&self) -> i64 {
        (self.expires_at - Utc::now()).num_minutes().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_valid_and_not_due() {
        let token = AccessToken::issued_now("abc".into(), 3600);
        assert!(token.is_valid());
        assert!(!token.needs_renewal());
        assert!(token.minutes_remaining() >= 59);
    }

    #[test]
    fn token_inside_margin_needs_renewal_but_is_still_valid() {
        let token = AccessToken::issued_now("abc".into(), 120);
        assert!(token.is_valid());
        assert!(token.needs_renewal());
    }

    #[test]
    fn expired_token_reports_zero_minutes() {
        let token = AccessToken::issued_now("abc".into(), -60);
        assert!(!token.is_valid());
        assert_eq!(token.minutes_remaining(), 0);
    }
}
