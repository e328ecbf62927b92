use serde::{Deserialize, Serialize};
use shared::UserRole;
use uuid::Uuid;

/// Authenticated identity attached to a request once its token verifies.
/// Issuance lives with the authentication collaborator; this service only
/// consumes the claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub email: String,
    pub role: UserRole,
    pub exp: usize,
    pub iat: usize,
}
