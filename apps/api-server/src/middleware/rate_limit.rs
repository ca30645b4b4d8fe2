//! Rate limiting middleware - per-address admission for a single policy.

use actix_web::{
    Error, HttpRequest, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderName, HeaderValue},
};
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use fieldguard_core::domain::{RateLimitDecision, RateLimitPolicy, client_address};
use fieldguard_core::ports::RateLimiter;

use crate::middleware::error::AppError;

/// Source address of a request, from proxy headers. Never fails.
pub fn client_address_of(req: &HttpRequest) -> String {
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());
    client_address(header("x-forwarded-for"), header("x-real-ip"))
}

/// Rate limiting middleware factory.
pub struct RateLimitMiddleware {
    limiter: Arc<dyn RateLimiter>,
    policy: RateLimitPolicy,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<dyn RateLimiter>, policy: RateLimitPolicy) -> Self {
        Self { limiter, policy }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            policy: self.policy.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<dyn RateLimiter>,
    policy: RateLimitPolicy,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let limiter = self.limiter.clone();
        let policy = self.policy.clone();
        let address = client_address_of(req.request());

        Box::pin(async move {
            let decision = limiter.check(&address, &policy).await;

            if decision.limited {
                tracing::warn!(
                    policy = policy.key_prefix(),
                    client = %address,
                    retry_after = decision.retry_after_secs,
                    "Rate limit exceeded"
                );

                let response = AppError::TooManyRequests(decision).error_response();
                let (http_req, _payload) = req.into_parts();
                return Ok(ServiceResponse::new(http_req, response).map_into_right_body());
            }

            let mut res = service.call(req).await?;
            apply_quota_headers(res.headers_mut(), &decision);
            Ok(res.map_into_left_body())
        })
    }
}

/// Attach `X-RateLimit-*` headers to an admitted response.
pub fn apply_quota_headers(
    headers: &mut actix_web::http::header::HeaderMap,
    decision: &RateLimitDecision,
) {
    let values = [
        ("x-ratelimit-limit", decision.limit.to_string()),
        ("x-ratelimit-remaining", decision.remaining.to_string()),
        ("x-ratelimit-reset", decision.reset_epoch_secs().to_string()),
    ];

    for (name, value) in values {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
}
