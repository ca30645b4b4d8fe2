//! HTTP handlers and route configuration.

mod auth;
mod health;
mod reports;

use std::sync::Arc;

use actix_web::web;
use fieldguard_core::ports::RateLimiter;

use crate::middleware::rate_limit::RateLimitMiddleware;
use crate::state::AppState;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig, state: &AppState) {
    let limiter: Arc<dyn RateLimiter> = state.limiter.clone();
    let policies = &state.policies;

    cfg.service(
        web::scope("/api")
            // Public routes
            .route("/health", web::get().to(health::health_check))
            // Auth proxy; login runs its own two-key check
            .service(
                web::scope("/auth")
                    .route("/login", web::post().to(auth::login))
                    .service(
                        web::resource("/token")
                            .wrap(RateLimitMiddleware::new(
                                limiter.clone(),
                                policies.token_issuance.clone(),
                            ))
                            .route(web::post().to(auth::token)),
                    ),
            )
            // Browser reports
            .service(
                web::scope("/reports")
                    .service(
                        web::resource("/csp")
                            .wrap(RateLimitMiddleware::new(
                                limiter.clone(),
                                policies.csp_report.clone(),
                            ))
                            .route(web::post().to(reports::csp)),
                    )
                    .service(
                        web::resource("/error")
                            .wrap(RateLimitMiddleware::new(
                                limiter,
                                policies.error_report.clone(),
                            ))
                            .route(web::post().to(reports::client_error)),
                    ),
            ),
    );
}
