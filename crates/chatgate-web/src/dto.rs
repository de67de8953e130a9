use chatgate_core::Claims;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub username: String,
}

/// `username` may hold either the username or the email address.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: u64,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub subject: String,
    pub issuer: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

impl From<Claims> for MeResponse {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            issuer: claims.iss,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}
