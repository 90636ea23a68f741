//! Shared HTTP plumbing for upstream service clients.

use crate::api_types::ApiErrorResponse;
use crate::errors::{RagError, RagResult, UpstreamService};
use reqwest::{Client, Response};
use std::time::Duration;

/// Build a pooled HTTP client with optional timeouts
pub fn build_http_client(
    request_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
) -> RagResult<Client> {
    let mut builder = Client::builder();
    if let Some(secs) = request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = connect_timeout_secs {
        builder = builder.connect_timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| RagError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Pass a 2xx response through, turn anything else into `UpstreamError`
pub async fn ensure_success(service: UpstreamService, response: Response) -> RagResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response
        .text()
        .await
        .map_err(|e| RagError::from_reqwest(service, e))?;

    // Google-style `{"error": {...}}` bodies carry a better message
    let message = match serde_json::from_str::<ApiErrorResponse>(&error_body) {
        Ok(parsed) if !parsed.error.message.is_empty() => parsed.error.message,
        _ => error_body,
    };

    Err(RagError::http_status(
        service,
        status.as_u16(),
        format!("API request failed: {}", message),
    ))
}
