//! Single-use session hashes backing registration confirmation and
//! password reset

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// What a session hash authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionAction {
    #[serde(rename = "confirm-register")]
    ConfirmRegister,
    #[serde(rename = "reset-password")]
    ResetPassword,
}

impl SessionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionAction::ConfirmRegister => "confirm-register",
            SessionAction::ResetPassword => "reset-password",
        }
    }
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirm-register" => Ok(SessionAction::ConfirmRegister),
            "reset-password" => Ok(SessionAction::ResetPassword),
            other => Err(format!("unknown session action: {}", other)),
        }
    }
}

/// Stored session hash; `status` is true while it can still be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHash {
    pub id: i64,
    pub user_id: i64,
    pub hash: String,
    pub code: String,
    pub action: SessionAction,
    pub status: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SessionHash {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status && self.expires_at > now
    }

    pub fn matches(&self, credential: &Credential) -> bool {
        match credential {
            Credential::Hash(hash) => &self.hash == hash,
            Credential::Code(code) => &self.code == code,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSessionHash {
    pub user_id: i64,
    pub hash: String,
    pub code: String,
    pub action: SessionAction,
    pub expires_at: DateTime<Utc>,
}

/// What the user presents back: the long hash from a link or the short code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Hash(String),
    Code(String),
}

impl Credential {
    /// The hash wins when both are given; blank values count as absent
    pub fn from_parts(hash: Option<&str>, code: Option<&str>) -> Option<Self> {
        fn present(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }

        present(hash)
            .map(|h| Credential::Hash(h.to_string()))
            .or_else(|| present(code).map(|c| Credential::Code(c.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn hash(status: bool, expires_in: i64) -> SessionHash {
        let now = Utc::now();
        SessionHash {
            id: 1,
            user_id: 7,
            hash: "ab12".to_string(),
            code: "004217".to_string(),
            action: SessionAction::ConfirmRegister,
            status,
            expires_at: now + Duration::minutes(expires_in),
            created_at: now,
        }
    }

    #[test]
    fn test_action_round_trips_through_text() {
        for action in [SessionAction::ConfirmRegister, SessionAction::ResetPassword] {
            assert_eq!(action.as_str().parse::<SessionAction>(), Ok(action));
        }
        assert!("login".parse::<SessionAction>().is_err());
    }

    #[test]
    fn test_usable_only_while_active_and_unexpired() {
        let now = Utc::now();
        assert!(hash(true, 30).is_usable(now));
        assert!(!hash(false, 30).is_usable(now));
        assert!(!hash(true, -1).is_usable(now));
    }

    #[test]
    fn test_credential_prefers_hash_and_ignores_blanks() {
        assert_eq!(
            Credential::from_parts(Some("ab12"), Some("004217")),
            Some(Credential::Hash("ab12".to_string()))
        );
        assert_eq!(
            Credential::from_parts(Some("  "), Some("004217")),
            Some(Credential::Code("004217".to_string()))
        );
        assert_eq!(Credential::from_parts(None, None), None);
    }

    #[test]
    fn test_matches_by_hash_or_code() {
        let stored = hash(true, 30);
        assert!(stored.matches(&Credential::Code("004217".to_string())));
        assert!(stored.matches(&Credential::Hash("ab12".to_string())));
        assert!(!stored.matches(&Credential::Code("4217".to_string())));
    }
}
