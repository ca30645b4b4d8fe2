//! Authentication proxy handlers.

use actix_web::{HttpRequest, HttpResponse, web};

use fieldguard_shared::dto::LoginRequest;

use crate::middleware::error::{AppError, AppResult};
use crate::middleware::rate_limit::{apply_quota_headers, client_address_of};
use crate::state::AppState;

/// POST /api/auth/login
///
/// Counted by source address before the body is read, then by account email.
/// A successful upstream login clears the email window.
pub async fn login(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let address = client_address_of(&req);

    let by_address = state.login.check_address(&address).await;
    if by_address.limited {
        tracing::warn!(client = %address, "Login attempts exceeded for address");
        return Err(AppError::TooManyRequests(by_address));
    }

    let credentials: LoginRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid login request: {}", e)))?;
    if credentials.email.trim().is_empty() {
        return Err(AppError::BadRequest("Email is required".to_string()));
    }

    let by_identity = state.login.check_identity(&credentials.email).await;
    if by_identity.limited {
        tracing::warn!(client = %address, "Login attempts exceeded for account");
        return Err(AppError::TooManyRequests(by_identity));
    }

    let decision = by_address.tighter(by_identity);
    let mut response = state.upstream.post_json("/auth/login", &credentials).await?;

    if response.status().is_success() {
        state.login.reset_identity(&credentials.email).await;
    }

    apply_quota_headers(response.headers_mut(), &decision);
    Ok(response)
}

/// POST /api/auth/token
///
/// Admission is handled by the route's rate limit middleware.
pub async fn token(body: web::Bytes, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid token request: {}", e)))?;

    state.upstream.post_json("/auth/token", &payload).await
}
