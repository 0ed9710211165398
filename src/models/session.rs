//! Session and password reset models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Login session; `id` is the bearer/cookie token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// One-time password reset ticket. Only the SHA-256 of the token is stored.
#[derive(Debug, Clone)]
pub struct PasswordReset {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    /// Unused and not expired
    pub fn is_usable(&self) -> bool {
        self.used_at.is_none() && self.expires_at >= Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let session = Session {
            id: "t".into(),
            user_id: 1,
            expires_at: now - Duration::seconds(1),
            created_at: now - Duration::days(7),
        };
        assert!(session.is_expired());
    }

    #[test]
    fn test_reset_usable() {
        let now = Utc::now();
        let mut reset = PasswordReset {
            id: 1,
            user_id: 1,
            token_hash: "h".into(),
            expires_at: now + Duration::minutes(30),
            used_at: None,
            created_at: now,
        };
        assert!(reset.is_usable());

        reset.used_at = Some(now);
        assert!(!reset.is_usable());

        reset.used_at = None;
        reset.expires_at = now - Duration::minutes(1);
        assert!(!reset.is_usable());
    }
}
