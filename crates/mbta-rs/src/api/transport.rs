//! HTTP transport seam.
//!
//! The client never talks to reqwest directly; it goes through [`Transport`],
//! which returns the raw status, body and `Retry-After` of one GET. The
//! production implementation is [`HttpTransport`]; tests substitute scripted
//! transports.

use super::jsonapi::JSONAPI_MEDIA_TYPE;
use crate::config::ClientConfig;
use crate::error::ApiError;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, RETRY_AFTER};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::debug;

/// Raw result of one upstream GET.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    /// Parsed `Retry-After` header (delta-seconds form only).
    pub retry_after: Option<Duration>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            retry_after: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Convert a non-success response into the matching [`ApiError`].
    pub fn into_error(self) -> ApiError {
        let detail = super::jsonapi::error_detail(&self.body);
        ApiError::from_status(self.status, detail, self.retry_after)
    }
}

/// Boxed future returned by [`Transport::get`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, ApiError>> + Send + 'a>>;

/// Performs a single HTTP GET. Implementations must not retry.
pub trait Transport: Send + Sync {
    /// GET `url` with the given query parameters appended.
    fn get<'a>(&'a self, url: &'a str, query: &'a [(String, String)]) -> TransportFuture<'a>;
}

/// reqwest-backed transport sending the JSON:API `Accept` header and the
/// API key.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSONAPI_MEDIA_TYPE));
        if let Some(key) = config.api_key.as_deref() {
            let mut value = HeaderValue::from_str(key)
                .map_err(|e| ApiError::Configuration(format!("invalid API key header: {e}")))?;
            value.set_sensitive(true);
            headers.insert("x-api-key", value);
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("mbta-rs/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn send(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse, ApiError> {
        let url = if query.is_empty() {
            reqwest::Url::parse(url)
        } else {
            reqwest::Url::parse_with_params(url, query)
        }
        .map_err(|e| ApiError::Configuration(format!("invalid request URL '{url}': {e}")))?;

        debug!("GET {url}");
        let start = Instant::now();
        let resp = self.client.get(url).send().await.map_err(classify)?;

        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = resp.text().await.map_err(classify)?;

        debug!(
            "Upstream response: HTTP {} in {:.0}ms ({} bytes)",
            status,
            start.elapsed().as_secs_f64() * 1000.0,
            body.len()
        );
        Ok(HttpResponse {
            status,
            body,
            retry_after,
        })
    }
}

impl Transport for HttpTransport {
    fn get<'a>(&'a self, url: &'a str, query: &'a [(String, String)]) -> TransportFuture<'a> {
        Box::pin(self.send(url, query))
    }
}

fn classify(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout(e.to_string())
    } else if e.is_decode() {
        ApiError::Decode(e.to_string())
    } else {
        ApiError::Connection(e.to_string())
    }
}
