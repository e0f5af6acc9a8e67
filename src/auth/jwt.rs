//! JWT Token Service
//! Mission: Issue and verify access/refresh token pairs securely

use crate::auth::models::{AccessClaims, RefreshClaims};
use crate::config::Config;
use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;
use uuid::Uuid;

/// Stateless token issuance and verification over the configured secrets.
/// Verification checks signature + expiry only; refresh-token revocation
/// lives in the session manager, not here.
pub struct TokenService {
    access_secret: String,
    refresh_secret: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenService {
    pub fn new(config: &Config) -> Self {
        Self {
            access_secret: config.access_secret.clone(),
            refresh_secret: config.refresh_secret.clone(),
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl_secs: config.refresh_ttl_secs,
        }
    }

    /// Short-lived access token binding the account id.
    pub fn issue_access_token(&self, account_id: Uuid) -> Result<String> {
        let claims = AccessClaims {
            sub: account_id.to_string(),
            exp: expiry_timestamp(self.access_ttl_secs)?,
        };

        debug!(
            "Issuing access token for {} ({}s TTL)",
            account_id, self.access_ttl_secs
        );

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.access_secret.as_bytes()),
        )
        .context("Failed to sign access token")
    }

    /// Longer-lived refresh token. The embedded jti makes every issuance
    /// unique, even two in the same second for the same account.
    pub fn issue_refresh_token(&self, account_id: Uuid) -> Result<String> {
        let claims = RefreshClaims {
            sub: account_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: expiry_timestamp(self.refresh_ttl_secs)?,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.refresh_secret.as_bytes()),
        )
        .context("Failed to sign refresh token")
    }

    /// Signature + expiry check; resolves the embedded account id.
    pub fn verify_access_token(&self, token: &str) -> Result<Uuid> {
        let decoded = decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.access_secret.as_bytes()),
            &Validation::default(),
        )
        .context("Invalid or expired access token")?;

        Uuid::parse_str(&decoded.claims.sub).context("Malformed subject in access token")
    }

    /// Signature + expiry check only; does not consult storage.
    pub fn verify_refresh_token(&self, token: &str) -> Result<Uuid> {
        let decoded = decode::<RefreshClaims>(
            token,
            &DecodingKey::from_secret(self.refresh_secret.as_bytes()),
            &Validation::default(),
        )
        .context("Invalid or expired refresh token")?;

        Uuid::parse_str(&decoded.claims.sub).context("Malformed subject in refresh token")
    }
}

fn expiry_timestamp(ttl_secs: i64) -> Result<usize> {
    let expiration = Utc::now()
        .checked_add_signed(chrono::Duration::seconds(ttl_secs))
        .context("Invalid timestamp")?
        .timestamp();
    Ok(expiration as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(access_ttl_secs: i64, refresh_ttl_secs: i64) -> Config {
        Config {
            port: 3000,
            database_path: ":memory:".to_string(),
            access_secret: "test-access-secret-12345".to_string(),
            refresh_secret: "test-refresh-secret-12345".to_string(),
            access_ttl_secs,
            refresh_ttl_secs,
            google_client_id: String::new(),
            google_jwks_url: String::new(),
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = TokenService::new(&test_config(3600, 604_800));
        let account_id = Uuid::new_v4();

        let token = service.issue_access_token(account_id).unwrap();
        assert!(!token.is_empty());

        let resolved = service.verify_access_token(&token).unwrap();
        assert_eq!(resolved, account_id);
    }

    #[test]
    fn test_refresh_token_round_trip() {
        let service = TokenService::new(&test_config(3600, 604_800));
        let account_id = Uuid::new_v4();

        let token = service.issue_refresh_token(account_id).unwrap();
        let resolved = service.verify_refresh_token(&token).unwrap();
        assert_eq!(resolved, account_id);
    }

    #[test]
    fn test_consecutive_refresh_tokens_differ() {
        let service = TokenService::new(&test_config(3600, 604_800));
        let account_id = Uuid::new_v4();

        // Same account, same second - the jti nonce must still differ.
        let first = service.issue_refresh_token(account_id).unwrap();
        let second = service.issue_refresh_token(account_id).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_token_kinds_are_not_interchangeable() {
        let service = TokenService::new(&test_config(3600, 604_800));
        let account_id = Uuid::new_v4();

        let access = service.issue_access_token(account_id).unwrap();
        let refresh = service.issue_refresh_token(account_id).unwrap();

        // Signed with different secrets, so cross-verification fails.
        assert!(service.verify_refresh_token(&access).is_err());
        assert!(service.verify_access_token(&refresh).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let service = TokenService::new(&test_config(3600, 604_800));
        assert!(service.verify_access_token("invalid.token.here").is_err());
        assert!(service.verify_refresh_token("invalid.token.here").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // TTL far enough in the past to clear the default validation leeway.
        let service = TokenService::new(&test_config(-300, -300));
        let account_id = Uuid::new_v4();

        let access = service.issue_access_token(account_id).unwrap();
        let refresh = service.issue_refresh_token(account_id).unwrap();

        assert!(service.verify_access_token(&access).is_err());
        assert!(service.verify_refresh_token(&refresh).is_err());
    }

    #[test]
    fn test_different_secrets_reject() {
        let service1 = TokenService::new(&test_config(3600, 604_800));
        let mut other = test_config(3600, 604_800);
        other.access_secret = "a-different-secret".to_string();
        let service2 = TokenService::new(&other);

        let account_id = Uuid::new_v4();
        let token = service1.issue_access_token(account_id).unwrap();
        assert!(service2.verify_access_token(&token).is_err());
    }
}
