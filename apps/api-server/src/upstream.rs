//! HTTP client for the upstream auth service.

use std::time::Duration;

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::Serialize;

use crate::middleware::error::{AppError, AppResult};

/// Forwards admitted requests and relays the upstream answer verbatim.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// POST a JSON body to `path` and relay status, content type and body.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> AppResult<HttpResponse> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::BadGateway(format!("{url}: {e}")))?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|e| AppError::BadGateway(e.to_string()))?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::BadGateway(format!("{url}: {e}")))?;

        tracing::debug!(url = %url, status = status.as_u16(), "Upstream responded");

        let mut builder = HttpResponse::build(status);
        if let Some(content_type) = content_type {
            builder.content_type(content_type);
        }
        Ok(builder.body(bytes))
    }
}
