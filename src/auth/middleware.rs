//! Authentication Middleware
//! Mission: Gate protected routes behind access-token validation

use crate::auth::jwt::TokenService;
use crate::auth::models::MessageResponse;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

/// Typed request-context identity inserted by the auth gate. Downstream
/// handlers read this; the raw token is never attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedAccount(pub Uuid);

/// Auth gate that validates the bearer access token on every protected
/// request. Stateless: no store lookup, signature + expiry only.
pub async fn auth_middleware(
    State(tokens): State<Arc<TokenService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthGateError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or(AuthGateError::NoToken)?;

    let account_id = tokens
        .verify_access_token(token)
        .map_err(|_| AuthGateError::InvalidToken)?;

    req.extensions_mut().insert(AuthenticatedAccount(account_id));

    Ok(next.run(req).await)
}

/// Extract the authenticated identity from a request (after the gate ran).
pub fn extract_account(req: &Request) -> Option<Uuid> {
    req.extensions()
        .get::<AuthenticatedAccount>()
        .map(|a| a.0)
}

/// Auth gate rejections
#[derive(Debug)]
pub enum AuthGateError {
    NoToken,
    InvalidToken,
}

impl IntoResponse for AuthGateError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthGateError::NoToken => (StatusCode::UNAUTHORIZED, "No token provided"),
            AuthGateError::InvalidToken => (StatusCode::FORBIDDEN, "Invalid or expired token"),
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
