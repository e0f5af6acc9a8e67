//! Authentication API Endpoints
//! Mission: Translate the session state machine onto the HTTP surface

use crate::auth::{
    google::{GoogleAuthError, GoogleVerifier},
    middleware::AuthenticatedAccount,
    models::{
        AccountResponse, AuthResponse, ChangePasswordRequest, GoogleAuthRequest, LoginRequest,
        MessageResponse, RefreshTokenRequest, RegisterRequest, TokenPairResponse,
    },
    session::{AuthSession, SessionError, SessionManager},
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<SessionManager>,
    pub google: Arc<GoogleVerifier>,
}

/// Register endpoint - POST /auth/register
pub async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthApiError> {
    payload.validate().map_err(AuthApiError::Validation)?;

    let session = state.sessions.register(
        &payload.name,
        &payload.email,
        &payload.password,
        payload.profile_image.as_deref(),
    )?;

    Ok((StatusCode::CREATED, Json(auth_response(session))))
}

/// Login endpoint - POST /auth/login
pub async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthApiError> {
    let session = state.sessions.login(&payload.email, &payload.password)?;
    Ok(Json(auth_response(session)))
}

/// Google sign-in endpoint - POST /auth/googleAuth
/// Verifies the raw provider credential, then signs in (auto-provisioning
/// an account on first sight).
pub async fn google_auth(
    State(state): State<AuthState>,
    Json(payload): Json<GoogleAuthRequest>,
) -> Result<Json<AuthResponse>, AuthApiError> {
    let Some(credential) = payload.credential.as_deref() else {
        return Err(AuthApiError::MissingGoogleCredential);
    };

    let profile = state.google.verify(credential).await?;
    let session = state.sessions.google_sign_in(
        &profile.email,
        &profile.name,
        profile.picture.as_deref(),
        &profile.subject,
    )?;

    Ok(Json(auth_response(session)))
}

/// Refresh endpoint - POST /auth/refresh-token
pub async fn refresh_token(
    State(state): State<AuthState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPairResponse>, AuthApiError> {
    let Some(token) = payload.refresh_token.as_deref() else {
        return Err(AuthApiError::MissingRefreshToken);
    };

    let (access_token, refresh_token) = state.sessions.refresh(token)?;

    Ok(Json(TokenPairResponse {
        access_token,
        refresh_token,
    }))
}

/// Logout endpoint - POST /auth/logout (protected)
/// Clears by refresh-token match and by the caller's authenticated identity.
pub async fn logout(
    State(state): State<AuthState>,
    identity: Option<Extension<AuthenticatedAccount>>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<Json<MessageResponse>, AuthApiError> {
    let Some(Extension(AuthenticatedAccount(account_id))) = identity else {
        return Err(AuthApiError::NotAuthenticated);
    };

    state
        .sessions
        .logout(payload.refresh_token.as_deref(), account_id)?;

    Ok(Json(MessageResponse {
        message: "Successfully logged out".to_string(),
    }))
}

/// Change-password endpoint - POST /auth/change-password (protected)
/// The authenticated identity names the account; the body's userId is a
/// fallback kept for callers that reach the handler without one.
pub async fn change_password(
    State(state): State<AuthState>,
    identity: Option<Extension<AuthenticatedAccount>>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AuthApiError> {
    let account_id = match identity {
        Some(Extension(AuthenticatedAccount(id))) => id,
        // An id that does not parse cannot resolve to an account.
        None => Uuid::parse_str(&payload.user_id).map_err(|_| AuthApiError::AccountNotFound)?,
    };

    state.sessions.change_password(
        account_id,
        &payload.current_password,
        &payload.new_password,
    )?;

    Ok(Json(MessageResponse {
        message: "Password successfully updated".to_string(),
    }))
}

fn auth_response(session: AuthSession) -> AuthResponse {
    AuthResponse {
        user: AccountResponse::from_account(&session.account),
        access_token: session.access_token,
        refresh_token: session.refresh_token,
    }
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    Validation(&'static str),
    DuplicateEmail,
    InvalidCredentials,
    MissingGoogleCredential,
    InvalidGoogleToken,
    GoogleNotConfigured,
    GoogleKeysFetchFailed,
    MissingRefreshToken,
    InvalidRefreshToken,
    NotAuthenticated,
    AccountNotFound,
    IncorrectPassword,
    InternalError,
}

impl From<SessionError> for AuthApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::DuplicateEmail => AuthApiError::DuplicateEmail,
            SessionError::InvalidCredentials => AuthApiError::InvalidCredentials,
            SessionError::UnknownRefreshToken | SessionError::InvalidRefreshToken => {
                AuthApiError::InvalidRefreshToken
            }
            SessionError::AccountNotFound => AuthApiError::AccountNotFound,
            SessionError::IncorrectPassword => AuthApiError::IncorrectPassword,
            SessionError::Internal(err) => {
                error!("Session operation failed: {err:#}");
                AuthApiError::InternalError
            }
        }
    }
}

impl From<GoogleAuthError> for AuthApiError {
    fn from(e: GoogleAuthError) -> Self {
        match e {
            GoogleAuthError::NotConfigured => AuthApiError::GoogleNotConfigured,
            GoogleAuthError::InvalidToken => {
                warn!("❌ Rejected Google credential");
                AuthApiError::InvalidGoogleToken
            }
            GoogleAuthError::JwksFetchFailed => AuthApiError::GoogleKeysFetchFailed,
        }
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthApiError::DuplicateEmail => (StatusCode::BAD_REQUEST, "email already exists"),
            AuthApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
            AuthApiError::MissingGoogleCredential => {
                (StatusCode::BAD_REQUEST, "Missing Google credential")
            }
            AuthApiError::InvalidGoogleToken => (StatusCode::BAD_REQUEST, "Invalid Google token"),
            AuthApiError::GoogleNotConfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Google sign-in not configured",
            ),
            AuthApiError::GoogleKeysFetchFailed => (
                StatusCode::BAD_GATEWAY,
                "Failed to fetch Google verification keys",
            ),
            AuthApiError::MissingRefreshToken => {
                (StatusCode::UNAUTHORIZED, "Refresh token required")
            }
            AuthApiError::InvalidRefreshToken => (StatusCode::FORBIDDEN, "Invalid refresh token"),
            AuthApiError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "User not authenticated"),
            AuthApiError::AccountNotFound => (StatusCode::NOT_FOUND, "User not found"),
            AuthApiError::IncorrectPassword => {
                (StatusCode::UNAUTHORIZED, "Current password is incorrect")
            }
            AuthApiError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (
            status,
            Json(MessageResponse {
                message: message.to_string(),
            }),
        )
            .into_response()
    }
}
