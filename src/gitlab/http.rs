//! HTTP utilities for GitLab REST API calls

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Header GitLab reads personal/project access tokens from
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Error raised for a non-2xx API response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "API request failed: {}", self.status)
    }
}

impl std::error::Error for ApiError {}

/// HTTP client wrapper for GitLab API calls
#[derive(Clone)]
pub struct GitLabHttpClient {
    client: Client,
}

impl GitLabHttpClient {
    /// Create a new HTTP client, with an optional per-request timeout
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder =
            Client::builder().user_agent(concat!("glstep/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request with query parameters
    pub async fn get(&self, url: &str, token: &str, query: &[(&str, &str)]) -> Result<Value> {
        tracing::debug!("GET {}", url);
        let request = self.request(Method::GET, url, token).query(query);
        Self::send(request).await
    }

    /// Make a POST request with an optional JSON body
    pub async fn post(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        tracing::debug!("POST {}", url);

        let mut request = self.request(Method::POST, url, token).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        Self::send(request).await
    }

    /// Make a PUT request with a JSON body
    pub async fn put(&self, url: &str, token: &str, body: &Value) -> Result<Value> {
        tracing::debug!("PUT {}", url);
        let request = self.request(Method::PUT, url, token).json(body);
        Self::send(request).await
    }

    fn request(&self, method: Method, url: &str, token: &str) -> RequestBuilder {
        self.client.request(method, url).header(TOKEN_HEADER, token)
    }

    async fn send(request: RequestBuilder) -> Result<Value> {
        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Only the sanitized body is logged, it may echo request data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(ApiError { status }.into());
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).context("Failed to parse response JSON")
    }
}

/// Format a GitLab API error for display
///
/// Known HTTP failures map to short messages. Anything else is reported
/// through the error's own description.
pub fn format_api_error(error: &anyhow::Error) -> String {
    let status = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<ApiError>())
        .map(|e| e.status.as_u16());

    let message = match status {
        Some(400) => "Invalid request. Check your parameters.",
        Some(401) => "Authentication failed. Check your private token.",
        Some(403) => "Permission denied. Check the token's scopes and role.",
        Some(404) => "Resource not found.",
        Some(409) => "Resource conflict. The resource may already exist.",
        Some(429) => "Rate limit exceeded. Please try again later.",
        Some(code) if code >= 500 => "GitLab service temporarily unavailable. Please try again.",
        _ => return error.to_string(),
    };

    message.to_string()
}
