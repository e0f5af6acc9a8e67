//! Authentication Models
//! Mission: Define account and session data structures with safe serialization

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PROFILE_IMAGE: &str = "default.jpg";
pub const MIN_PASSWORD_LEN: usize = 6;

/// Registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    /// Stored lowercased; unique across all accounts.
    pub email: String,
    /// bcrypt hash - never serialize. None marks a Google-only account
    /// with no local password.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub profile_image: String,
    /// Google subject (`sub` claim), set on first Google sign-in.
    pub google_id: Option<String>,
    /// At most one valid refresh token at a time - never serialize.
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub created_at: String,
}

/// Access token claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String, // subject (account id)
    pub exp: usize,  // expiration timestamp
}

/// Refresh token claims payload. The jti nonce guarantees two issuances
/// for the same account never produce identical tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub jti: String,
    pub exp: usize,
}

/// Register request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub profile_image: Option<String>,
}

impl RegisterRequest {
    /// Boundary validation; rules mirror the account schema constraints.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("Name is required");
        }
        if !is_valid_email(self.email.trim()) {
            return Err("Invalid email format");
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            return Err("Password must be at least 6 characters");
        }
        Ok(())
    }
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Google sign-in request body (raw provider credential)
#[derive(Debug, Deserialize)]
pub struct GoogleAuthRequest {
    pub credential: Option<String>,
}

/// Refresh / logout request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

/// Change-password request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub user_id: String,
}

/// Account response (sanitized)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub profile_image: String,
}

impl AccountResponse {
    pub fn from_account(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            name: account.name.clone(),
            email: account.email.clone(),
            profile_image: account.profile_image.clone(),
        }
    }
}

/// Register / login / Google sign-in response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: AccountResponse,
    pub access_token: String,
    pub refresh_token: String,
}

/// Refresh-token response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Generic `{message}` response body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Minimal `local@domain.tld` shape check, applied at the boundary.
fn is_valid_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }
    let mut parts = email.splitn(2, '@');
    let (Some(local), Some(domain)) = (parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    let mut labels = domain.rsplitn(2, '.');
    match (labels.next(), labels.next()) {
        (Some(tld), Some(rest)) => !tld.is_empty() && !rest.is_empty(),
        _ => false,
    }
}
