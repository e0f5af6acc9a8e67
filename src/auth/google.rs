//! Google Sign-In Verification
//! Mission: Verify Google ID tokens in-process before any account is touched

use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::debug;

/// Verified identity extracted from a Google ID token.
#[derive(Debug, Clone)]
pub struct GoogleProfile {
    pub subject: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

#[derive(Debug)]
pub enum GoogleAuthError {
    /// GOOGLE_CLIENT_ID is unset; Google sign-in is disabled.
    NotConfigured,
    /// Bad signature, wrong audience/issuer, expired, or missing claims.
    InvalidToken,
    JwksFetchFailed,
}

impl std::fmt::Display for GoogleAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoogleAuthError::NotConfigured => write!(f, "Google sign-in not configured"),
            GoogleAuthError::InvalidToken => write!(f, "Invalid Google token"),
            GoogleAuthError::JwksFetchFailed => {
                write!(f, "Failed to fetch Google verification keys")
            }
        }
    }
}

impl std::error::Error for GoogleAuthError {}

#[derive(Debug, Deserialize)]
struct GoogleIdClaims {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Verifies Google ID tokens (RS256) against Google's published JWKS,
/// enforcing our client id as the audience.
pub struct GoogleVerifier {
    http_client: reqwest::Client,
    client_id: String,
    jwks_url: String,
}

impl GoogleVerifier {
    pub fn new(http_client: reqwest::Client, client_id: String, jwks_url: String) -> Self {
        Self {
            http_client,
            client_id,
            jwks_url,
        }
    }

    pub async fn verify(&self, credential: &str) -> Result<GoogleProfile, GoogleAuthError> {
        if self.client_id.trim().is_empty() {
            return Err(GoogleAuthError::NotConfigured);
        }

        let header = decode_header(credential).map_err(|_| GoogleAuthError::InvalidToken)?;
        let kid = header.kid.ok_or(GoogleAuthError::InvalidToken)?;

        let jwks = self.fetch_jwks().await?;
        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid.as_str()))
            .ok_or(GoogleAuthError::InvalidToken)?;

        let decoding_key =
            DecodingKey::from_jwk(jwk).map_err(|_| GoogleAuthError::InvalidToken)?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(std::slice::from_ref(&self.client_id));
        validation.set_issuer(&["accounts.google.com", "https://accounts.google.com"]);

        let token_data = decode::<GoogleIdClaims>(credential, &decoding_key, &validation)
            .map_err(|_| GoogleAuthError::InvalidToken)?;
        let claims = token_data.claims;

        let email = claims.email.ok_or(GoogleAuthError::InvalidToken)?;
        let name = claims.name.unwrap_or_else(|| email.clone());

        debug!("Verified Google identity for {}", email);

        Ok(GoogleProfile {
            subject: claims.sub,
            email,
            name,
            picture: claims.picture,
        })
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, GoogleAuthError> {
        let resp = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|_| GoogleAuthError::JwksFetchFailed)?;

        if !resp.status().is_success() {
            return Err(GoogleAuthError::JwksFetchFailed);
        }

        resp.json::<JwkSet>()
            .await
            .map_err(|_| GoogleAuthError::JwksFetchFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier(client_id: &str) -> GoogleVerifier {
        GoogleVerifier::new(
            reqwest::Client::new(),
            client_id.to_string(),
            "http://127.0.0.1:0/jwks.json".to_string(),
        )
    }

    #[tokio::test]
    async fn test_unconfigured_verifier_rejects() {
        let result = verifier("").verify("some-credential").await;
        assert!(matches!(result, Err(GoogleAuthError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_malformed_credential_rejected_before_network() {
        // Not a JWT at all: rejected at header decode, no JWKS fetch needed.
        let result = verifier("client-id").verify("not.a.jwt").await;
        assert!(matches!(result, Err(GoogleAuthError::InvalidToken)));
    }
}
