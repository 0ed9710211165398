//! User model
//!
//! Accounts double as profiles: the role stored here decides moderation
//! rights.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Email address (unique, used to log in)
    pub email: String,
    pub display_name: Option<String>,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, not yet persisted user.
    ///
    /// The password must already be hashed with `services::password::hash_password`.
    pub fn new(
        email: String,
        display_name: Option<String>,
        password_hash: String,
        role: UserRole,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            email,
            display_name,
            password_hash,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Whether this user may see or change an entry created by `created_by`
    pub fn can_manage(&self, created_by: Option<i64>) -> bool {
        self.is_admin() || created_by == Some(self.id)
    }
}

/// Profile role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Moderates submissions, curates tours and events
    Admin,
    #[default]
    User,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::User => write!(f, "user"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(id: i64, role: UserRole) -> User {
        let mut user = User::new(format!("u{}@example.org", id), None, "hash".into(), role);
        user.id = id;
        user
    }

    #[test]
    fn test_user_new_is_unsaved() {
        let user = User::new("a@example.org".into(), Some("Anna".into()), "hash".into(), UserRole::User);
        assert_eq!(user.id, 0);
        assert_eq!(user.display_name.as_deref(), Some("Anna"));
        assert!(!user.is_admin());
    }

    #[test]
    fn test_can_manage() {
        let admin = user_with(1, UserRole::Admin);
        let member = user_with(2, UserRole::User);

        assert!(admin.can_manage(Some(2)));
        assert!(admin.can_manage(None));
        assert!(member.can_manage(Some(2)));
        assert!(!member.can_manage(Some(1)));
        assert!(!member.can_manage(None));
    }

    #[test]
    fn test_user_role_from_str() {
        assert_eq!(UserRole::from_str("ADMIN").unwrap(), UserRole::Admin);
        assert_eq!(UserRole::from_str("user").unwrap(), UserRole::User);
        assert!(UserRole::from_str("editor").is_err());
        assert_eq!(UserRole::default(), UserRole::User);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = user_with(3, UserRole::User);
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "user");
    }
}
