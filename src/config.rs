//! Process Configuration
//! Mission: Resolve all environment knobs once at startup, then inject

use anyhow::Result;
use std::env;

pub const DEV_ACCESS_SECRET: &str = "dev-secret-change-in-production-minimum-32-characters";
pub const DEV_REFRESH_SECRET: &str = "dev-refresh-secret-change-in-production-as-well";

/// Immutable process configuration, read from the environment exactly once.
/// Constructed in main and passed by reference into the auth constructors;
/// business logic never reads env vars directly.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,

    pub access_secret: String,
    pub refresh_secret: String,
    /// Access token lifetime in seconds (default 1h).
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in seconds (default 7d).
    pub refresh_ttl_secs: i64,

    /// Empty string disables Google sign-in.
    pub google_client_id: String,
    pub google_jwks_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "./circleup_auth.db".to_string());

        let access_secret =
            env::var("JWT_SECRET").unwrap_or_else(|_| DEV_ACCESS_SECRET.to_string());
        let refresh_secret =
            env::var("JWT_REFRESH_SECRET").unwrap_or_else(|_| DEV_REFRESH_SECRET.to_string());

        let access_ttl_secs = env::var("JWT_EXPIRES_IN_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(3600);

        let refresh_ttl_secs = env::var("JWT_REFRESH_EXPIRES_IN_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(604_800);

        let google_client_id = env::var("GOOGLE_CLIENT_ID").unwrap_or_default();
        let google_jwks_url = env::var("GOOGLE_JWKS_URL")
            .unwrap_or_else(|_| "https://www.googleapis.com/oauth2/v3/certs".to_string());

        Ok(Self {
            port,
            database_path,
            access_secret,
            refresh_secret,
            access_ttl_secs,
            refresh_ttl_secs,
            google_client_id,
            google_jwks_url,
        })
    }

    /// True when either signing secret is still a baked-in development default.
    pub fn uses_dev_secrets(&self) -> bool {
        self.access_secret == DEV_ACCESS_SECRET || self.refresh_secret == DEV_REFRESH_SECRET
    }
}
