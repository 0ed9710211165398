//! Shared API response types
//!
//! Response structures used by more than one endpoint module.

use serde::{Deserialize, Serialize};

use crate::models::User;

// ============================================================================
// User Response Types
// ============================================================================

/// Public view of an account; never carries the password hash
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
    pub is_admin: bool,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            is_admin: user.is_admin(),
            email: user.email,
            display_name: user.display_name,
            role: user.role.to_string(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Response for successful authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

/// Current session as seen by the client; `user` is null when logged out
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub user: Option<UserResponse>,
}

// ============================================================================
// Generic Response Types
// ============================================================================

/// Returned when a resource is created and the client only needs its id
#[derive(Debug, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: i64,
}

/// Plain confirmation message
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Wrapper for list endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> ListResponse<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            total: items.len(),
            items,
        }
    }
}
