//! Session Manager
//! Mission: Own the register/login/refresh/logout/change-password state machine

use crate::auth::account_store::{
    hash_password, is_unique_violation, verify_password, AccountStore,
};
use crate::auth::jwt::TokenService;
use crate::auth::models::Account;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A freshly established session: the account plus its token pair.
#[derive(Debug)]
pub struct AuthSession {
    pub account: Account,
    pub access_token: String,
    pub refresh_token: String,
}

/// Domain errors surfaced by session operations.
#[derive(Debug)]
pub enum SessionError {
    DuplicateEmail,
    /// Uniform for unknown email and wrong password, so login failures
    /// carry no account-enumeration signal.
    InvalidCredentials,
    /// No account currently holds the supplied refresh token.
    UnknownRefreshToken,
    /// The token matched an account but failed signature/expiry checks;
    /// the stored token has been cleared (forced logout).
    InvalidRefreshToken,
    AccountNotFound,
    IncorrectPassword,
    Internal(anyhow::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::DuplicateEmail => write!(f, "email already exists"),
            SessionError::InvalidCredentials => write!(f, "Invalid credentials"),
            SessionError::UnknownRefreshToken | SessionError::InvalidRefreshToken => {
                write!(f, "Invalid refresh token")
            }
            SessionError::AccountNotFound => write!(f, "User not found"),
            SessionError::IncorrectPassword => write!(f, "Current password is incorrect"),
            SessionError::Internal(e) => write!(f, "internal error: {e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<anyhow::Error> for SessionError {
    fn from(e: anyhow::Error) -> Self {
        SessionError::Internal(e)
    }
}

/// Orchestrates the credential store and token service. Holds no mutable
/// state of its own; the single shared resource is the store, and every
/// mutation there is one atomic update-by-id.
pub struct SessionManager {
    store: Arc<AccountStore>,
    tokens: Arc<TokenService>,
}

impl SessionManager {
    pub fn new(store: Arc<AccountStore>, tokens: Arc<TokenService>) -> Self {
        Self { store, tokens }
    }

    /// Create an account with a freshly hashed password and open a session.
    pub fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        profile_image: Option<&str>,
    ) -> Result<AuthSession, SessionError> {
        if self.store.find_by_email(email)?.is_some() {
            return Err(SessionError::DuplicateEmail);
        }

        let password_hash = hash_password(password)?;
        let account = match self.store.create(
            name,
            email,
            Some(password_hash),
            profile_image.map(str::to_string),
            None,
        ) {
            Ok(account) => account,
            // The UNIQUE constraint backstops the pre-check under races;
            // any other store failure stays internal.
            Err(e) if is_unique_violation(&e) => return Err(SessionError::DuplicateEmail),
            Err(e) => return Err(SessionError::Internal(e)),
        };

        info!("🔐 Registered account: {}", account.email);
        self.open_session(account)
    }

    /// Verify credentials and open a fresh session, overwriting any
    /// previously issued refresh token.
    pub fn login(&self, email: &str, password: &str) -> Result<AuthSession, SessionError> {
        let Some(account) = self.store.find_by_email(email)? else {
            warn!("❌ Failed login attempt: unknown email");
            return Err(SessionError::InvalidCredentials);
        };

        if !verify_password(password, account.password_hash.as_deref())? {
            warn!("❌ Failed login attempt: {}", account.email);
            return Err(SessionError::InvalidCredentials);
        }

        info!("✅ Login successful: {}", account.email);
        self.open_session(account)
    }

    /// Sign in with an already-verified Google identity, auto-provisioning
    /// an account (with no local password) on first sight.
    pub fn google_sign_in(
        &self,
        email: &str,
        name: &str,
        picture: Option<&str>,
        google_id: &str,
    ) -> Result<AuthSession, SessionError> {
        let account = match self.store.find_by_email(email)? {
            Some(existing) => {
                if existing.google_id.is_none() {
                    self.store.set_google_id(&existing.id, google_id)?;
                }
                existing
            }
            None => {
                let account = self.store.create(
                    name,
                    email,
                    None,
                    picture.map(str::to_string),
                    Some(google_id.to_string()),
                )?;
                info!("🔐 Auto-registered Google account: {}", account.email);
                account
            }
        };

        info!("✅ Google sign-in: {}", account.email);
        self.open_session(account)
    }

    /// Rotate a refresh token: the supplied token must match a stored one
    /// exactly, and the returned pair permanently replaces it. A token that
    /// matches but fails verification clears the stored token, forcing the
    /// account back to a logged-out state.
    pub fn refresh(&self, refresh_token: &str) -> Result<(String, String), SessionError> {
        let Some(account) = self.store.find_by_refresh_token(refresh_token)? else {
            return Err(SessionError::UnknownRefreshToken);
        };

        if self.tokens.verify_refresh_token(refresh_token).is_err() {
            self.store.set_refresh_token(&account.id, None)?;
            warn!("🚫 Invalid refresh token for {}; session cleared", account.email);
            return Err(SessionError::InvalidRefreshToken);
        }

        let access_token = self.tokens.issue_access_token(account.id)?;
        let new_refresh_token = self.tokens.issue_refresh_token(account.id)?;
        self.store
            .set_refresh_token(&account.id, Some(&new_refresh_token))?;

        info!("🔄 Rotated refresh token for {}", account.email);
        Ok((access_token, new_refresh_token))
    }

    /// Clear the session. Best-effort by token match (absence is not an
    /// error, so repeated logouts succeed), then by the caller's own
    /// authenticated id.
    pub fn logout(
        &self,
        refresh_token: Option<&str>,
        account_id: Uuid,
    ) -> Result<(), SessionError> {
        if let Some(token) = refresh_token {
            if let Some(holder) = self.store.find_by_refresh_token(token)? {
                self.store.set_refresh_token(&holder.id, None)?;
            }
        }

        let Some(account) = self.store.find_by_id(&account_id)? else {
            return Err(SessionError::AccountNotFound);
        };
        self.store.set_refresh_token(&account.id, None)?;

        info!("👋 Logged out: {}", account.email);
        Ok(())
    }

    /// Re-hash and store a new password after verifying the current one.
    /// The refresh token is left untouched: existing sessions stay valid
    /// across a password change.
    pub fn change_password(
        &self,
        account_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), SessionError> {
        let Some(account) = self.store.find_by_id(&account_id)? else {
            return Err(SessionError::AccountNotFound);
        };

        if !verify_password(current_password, account.password_hash.as_deref())? {
            return Err(SessionError::IncorrectPassword);
        }

        let new_hash = hash_password(new_password)?;
        self.store.set_password_hash(&account.id, &new_hash)?;

        info!("🔑 Password changed for {}", account.email);
        Ok(())
    }

    fn open_session(&self, account: Account) -> Result<AuthSession, SessionError> {
        let access_token = self.tokens.issue_access_token(account.id)?;
        let refresh_token = self.tokens.issue_refresh_token(account.id)?;
        self.store
            .set_refresh_token(&account.id, Some(&refresh_token))?;

        Ok(AuthSession {
            account,
            access_token,
            refresh_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::NamedTempFile;

    fn test_config(refresh_ttl_secs: i64) -> Config {
        Config {
            port: 3000,
            database_path: ":memory:".to_string(),
            access_secret: "test-access-secret-12345".to_string(),
            refresh_secret: "test-refresh-secret-12345".to_string(),
            access_ttl_secs: 3600,
            refresh_ttl_secs,
            google_client_id: String::new(),
            google_jwks_url: String::new(),
        }
    }

    fn create_test_manager() -> (SessionManager, Arc<AccountStore>, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = Arc::new(AccountStore::new(temp_file.path().to_str().unwrap()).unwrap());
        let tokens = Arc::new(TokenService::new(&test_config(604_800)));
        let manager = SessionManager::new(store.clone(), tokens);
        (manager, store, temp_file)
    }

    #[test]
    fn test_register_then_refresh_rotates() {
        let (manager, _store, _temp) = create_test_manager();

        let session = manager
            .register("test", "test@user.com", "testpassword", None)
            .unwrap();
        assert_eq!(session.account.email, "test@user.com");
        assert!(!session.access_token.is_empty());
        assert!(!session.refresh_token.is_empty());

        let (access, rotated) = manager.refresh(&session.refresh_token).unwrap();
        assert!(!access.is_empty());
        // Rotation must never hand back the input token.
        assert_ne!(rotated, session.refresh_token);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let (manager, _store, _temp) = create_test_manager();

        manager
            .register("test", "test@user.com", "testpassword", None)
            .unwrap();
        let second = manager.register("other", "Test@User.com", "otherpassword", None);
        assert!(matches!(second, Err(SessionError::DuplicateEmail)));
    }

    #[test]
    fn test_register_store_failure_is_internal() {
        let (manager, _store, temp) = create_test_manager();

        // A failing insert that is NOT a uniqueness violation must surface as
        // Internal, not masquerade as a duplicate email.
        let conn = rusqlite::Connection::open(temp.path()).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER block_account_inserts BEFORE INSERT ON accounts \
             BEGIN SELECT RAISE(ABORT, 'inserts disabled'); END",
        )
        .unwrap();

        let result = manager.register("test", "test@user.com", "testpassword", None);
        assert!(matches!(result, Err(SessionError::Internal(_))));
    }

    #[test]
    fn test_register_passes_profile_image_through() {
        let (manager, _store, _temp) = create_test_manager();

        let custom = manager
            .register("test", "test@user.com", "testpassword", Some("me.jpg"))
            .unwrap();
        assert_eq!(custom.account.profile_image, "me.jpg");

        let defaulted = manager
            .register("other", "other@user.com", "otherpassword", None)
            .unwrap();
        assert_eq!(
            defaulted.account.profile_image,
            crate::auth::models::DEFAULT_PROFILE_IMAGE
        );
    }

    #[test]
    fn test_login_failures_are_uniform() {
        let (manager, _store, _temp) = create_test_manager();

        manager
            .register("test", "test@user.com", "testpassword", None)
            .unwrap();

        let wrong_password = manager.login("test@user.com", "wrongpassword");
        let unknown_email = manager.login("nobody@user.com", "testpassword");

        // Identical error (and so identical message) either way.
        assert!(matches!(wrong_password, Err(SessionError::InvalidCredentials)));
        assert!(matches!(unknown_email, Err(SessionError::InvalidCredentials)));
        assert_eq!(
            SessionError::InvalidCredentials.to_string(),
            "Invalid credentials"
        );
    }

    #[test]
    fn test_login_is_case_insensitive_on_email() {
        let (manager, _store, _temp) = create_test_manager();

        manager
            .register("test", "Test@User.com", "testpassword", None)
            .unwrap();
        assert!(manager.login("test@user.com", "testpassword").is_ok());
    }

    #[test]
    fn test_rotation_invalidates_old_token() {
        let (manager, _store, _temp) = create_test_manager();

        let session = manager
            .register("test", "test@user.com", "testpassword", None)
            .unwrap();

        let (_, rotated) = manager.refresh(&session.refresh_token).unwrap();

        // The old token has not expired by wall clock, but it can never
        // succeed again.
        let replay = manager.refresh(&session.refresh_token);
        assert!(matches!(replay, Err(SessionError::UnknownRefreshToken)));

        // The rotated token is the one that works.
        assert!(manager.refresh(&rotated).is_ok());
    }

    #[test]
    fn test_logout_revokes_refresh_token() {
        let (manager, _store, _temp) = create_test_manager();

        let session = manager
            .register("test", "test@user.com", "testpassword", None)
            .unwrap();
        let account_id = session.account.id;

        manager
            .logout(Some(&session.refresh_token), account_id)
            .unwrap();

        let replay = manager.refresh(&session.refresh_token);
        assert!(matches!(replay, Err(SessionError::UnknownRefreshToken)));
    }

    #[test]
    fn test_logout_is_idempotent() {
        let (manager, _store, _temp) = create_test_manager();

        let session = manager
            .register("test", "test@user.com", "testpassword", None)
            .unwrap();
        let account_id = session.account.id;

        manager
            .logout(Some(&session.refresh_token), account_id)
            .unwrap();
        // Second logout: the token matches nothing, the account is already
        // cleared - still a success.
        manager
            .logout(Some(&session.refresh_token), account_id)
            .unwrap();
        manager.logout(None, account_id).unwrap();
    }

    #[test]
    fn test_logout_unknown_account_fails() {
        let (manager, _store, _temp) = create_test_manager();
        let result = manager.logout(None, Uuid::new_v4());
        assert!(matches!(result, Err(SessionError::AccountNotFound)));
    }

    #[test]
    fn test_expired_refresh_token_forces_logout() {
        let (manager, store, _temp) = create_test_manager();

        let session = manager
            .register("test", "test@user.com", "testpassword", None)
            .unwrap();
        let account_id = session.account.id;

        // Same secrets, expired TTL: syntactically signed but past expiry.
        let expired_issuer = TokenService::new(&test_config(-300));
        let expired = expired_issuer.issue_refresh_token(account_id).unwrap();
        store
            .set_refresh_token(&account_id, Some(&expired))
            .unwrap();

        let result = manager.refresh(&expired);
        assert!(matches!(result, Err(SessionError::InvalidRefreshToken)));

        // Forced logout: the stored token was cleared, so the same string
        // no longer resolves to any account.
        assert!(store.find_by_refresh_token(&expired).unwrap().is_none());
    }

    #[test]
    fn test_change_password_keeps_session_valid() {
        let (manager, _store, _temp) = create_test_manager();

        let session = manager
            .register("test", "test@user.com", "testpassword", None)
            .unwrap();
        let account_id = session.account.id;

        manager
            .change_password(account_id, "testpassword", "newpassword0")
            .unwrap();

        assert!(manager.login("test@user.com", "newpassword0").is_ok());
        // Sessions survive a password change: the pre-change refresh token
        // still rotates.
        assert!(manager.refresh(&session.refresh_token).is_ok());
    }

    #[test]
    fn test_change_password_wrong_current_does_not_mutate() {
        let (manager, _store, _temp) = create_test_manager();

        let session = manager
            .register("test", "test@user.com", "testpassword", None)
            .unwrap();

        let result =
            manager.change_password(session.account.id, "wrongpassword", "newpassword0");
        assert!(matches!(result, Err(SessionError::IncorrectPassword)));

        // Old password still authenticates.
        assert!(manager.login("test@user.com", "testpassword").is_ok());
    }

    #[test]
    fn test_change_password_unknown_account() {
        let (manager, _store, _temp) = create_test_manager();
        let result = manager.change_password(Uuid::new_v4(), "a", "b");
        assert!(matches!(result, Err(SessionError::AccountNotFound)));
    }

    #[test]
    fn test_google_sign_in_provisions_once() {
        let (manager, store, _temp) = create_test_manager();

        let first = manager
            .google_sign_in("test@user.com", "Test User", Some("pic.jpg"), "sub-123")
            .unwrap();
        assert_eq!(first.account.profile_image, "pic.jpg");
        assert!(first.account.password_hash.is_none());

        let second = manager
            .google_sign_in("test@user.com", "Test User", None, "sub-123")
            .unwrap();
        assert_eq!(second.account.id, first.account.id);

        // Google-only account: no local password ever verifies.
        let login = manager.login("test@user.com", "anything-at-all");
        assert!(matches!(login, Err(SessionError::InvalidCredentials)));

        let stored = store.find_by_id(&first.account.id).unwrap().unwrap();
        assert_eq!(stored.google_id.as_deref(), Some("sub-123"));
    }

    #[test]
    fn test_google_sign_in_links_existing_account() {
        let (manager, store, _temp) = create_test_manager();

        let session = manager
            .register("test", "test@user.com", "testpassword", None)
            .unwrap();

        let google = manager
            .google_sign_in("test@user.com", "Test User", None, "sub-456")
            .unwrap();
        assert_eq!(google.account.id, session.account.id);

        let stored = store.find_by_id(&session.account.id).unwrap().unwrap();
        assert_eq!(stored.google_id.as_deref(), Some("sub-456"));
        // The local password still works after linking.
        assert!(manager.login("test@user.com", "testpassword").is_ok());
    }

    #[test]
    fn test_login_overwrites_previous_refresh_token() {
        let (manager, _store, _temp) = create_test_manager();

        let first = manager
            .register("test", "test@user.com", "testpassword", None)
            .unwrap();
        let second = manager.login("test@user.com", "testpassword").unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        // Only the latest token remains valid.
        let replay = manager.refresh(&first.refresh_token);
        assert!(matches!(replay, Err(SessionError::UnknownRefreshToken)));
        assert!(manager.refresh(&second.refresh_token).is_ok());
    }
}
