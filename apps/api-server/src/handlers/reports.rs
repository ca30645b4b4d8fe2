//! Browser report intake: CSP violations and client-side errors.

use actix_web::{HttpResponse, web};

use fieldguard_shared::dto::{ClientErrorReport, CspReportEnvelope};

use crate::middleware::error::{AppError, AppResult};

/// POST /api/reports/csp
///
/// Browsers send `application/csp-report`, so the body is parsed by hand.
pub async fn csp(body: web::Bytes) -> AppResult<HttpResponse> {
    let envelope: CspReportEnvelope = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid CSP report: {}", e)))?;
    let report = envelope.report;

    tracing::warn!(
        document_uri = report.document_uri.as_deref().unwrap_or("-"),
        violated_directive = report.violated_directive.as_deref().unwrap_or("-"),
        blocked_uri = report.blocked_uri.as_deref().unwrap_or("-"),
        source_file = report.source_file.as_deref().unwrap_or("-"),
        line_number = report.line_number,
        "CSP violation reported"
    );

    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/reports/error
pub async fn client_error(body: web::Bytes) -> AppResult<HttpResponse> {
    let report: ClientErrorReport = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid error report: {}", e)))?;

    tracing::error!(
        message = %report.message,
        url = report.url.as_deref().unwrap_or("-"),
        component = report.component.as_deref().unwrap_or("-"),
        stack = report.stack.as_deref().unwrap_or("-"),
        "Client error reported"
    );

    Ok(HttpResponse::NoContent().finish())
}
