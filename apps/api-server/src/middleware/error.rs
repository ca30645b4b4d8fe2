//! Error handling middleware - RFC 7807 compliant responses.

use actix_web::{HttpResponse, HttpResponseBuilder, ResponseError, http::StatusCode};
use fieldguard_core::domain::RateLimitDecision;
use fieldguard_shared::ErrorResponse;
use std::fmt;

/// Application-level error type that converts to RFC 7807 responses.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    /// Quota exhausted; carries the binding decision.
    TooManyRequests(RateLimitDecision),
    BadGateway(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::TooManyRequests(decision) => write!(
                f,
                "Too many requests: retry after {}s",
                decision.retry_after_secs
            ),
            AppError::BadGateway(msg) => write!(f, "Bad gateway: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());

        let error = match self {
            AppError::BadRequest(detail) => ErrorResponse::bad_request(detail),
            AppError::TooManyRequests(decision) => {
                insert_quota_headers(&mut builder, decision);
                builder.insert_header(("Retry-After", decision.retry_after_secs.to_string()));
                ErrorResponse::too_many_requests(decision.retry_after_secs)
            }
            AppError::BadGateway(detail) => {
                // Upstream details stay in the logs
                tracing::error!("Upstream error: {}", detail);
                ErrorResponse::bad_gateway()
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                ErrorResponse::internal_error()
            }
        };

        builder.json(error)
    }
}

/// `X-RateLimit-*` headers for a decision.
pub fn insert_quota_headers(builder: &mut HttpResponseBuilder, decision: &RateLimitDecision) {
    builder
        .insert_header(("X-RateLimit-Limit", decision.limit.to_string()))
        .insert_header(("X-RateLimit-Remaining", decision.remaining.to_string()))
        .insert_header(("X-RateLimit-Reset", decision.reset_epoch_secs().to_string()));
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;
