//! HTTP fetching
//!
//! One fetch per dispatched URL: a plain GET for category pages, or a form
//! POST carrying the age-gate acknowledgement for story pages. The fetch
//! result is classified so the controller can apply its bounded retry
//! policy: transient failures are retryable, permanent ones abandon the URL.

use crate::config::{CrawlerConfig, UserAgentConfig};
use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched an HTML page
    Success {
        /// HTTP status code
        status_code: u16,
        /// Page body content
        body: String,
    },

    /// Page is not HTML (Content-Type mismatch); never retried
    ContentMismatch {
        /// The actual Content-Type received
        content_type: String,
    },

    /// HTTP error status
    HttpError {
        /// The HTTP status code
        status_code: u16,
        /// Whether the controller may retry this URL
        retryable: bool,
    },

    /// Network-level error (timeout, connection refused, body read failure)
    NetworkError {
        /// Error description
        error: String,
        /// Whether the controller may retry this URL
        retryable: bool,
    },
}

impl FetchResult {
    /// True if the retry policy may re-dispatch this URL
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Success { .. } | Self::ContentMismatch { .. } => false,
            Self::HttpError { retryable, .. } | Self::NetworkError { retryable, .. } => *retryable,
        }
    }
}

impl fmt::Display for FetchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { status_code, .. } => write!(f, "HTTP {}", status_code),
            Self::ContentMismatch { content_type } => {
                write!(f, "non-HTML content-type: {}", content_type)
            }
            Self::HttpError { status_code, .. } => write!(f, "HTTP {}", status_code),
            Self::NetworkError { error, .. } => write!(f, "{}", error),
        }
    }
}

/// Builds the HTTP client used for the whole crawl
///
/// # Arguments
///
/// * `user_agent` - Crawler identification configuration
/// * `crawler` - Crawler behavior configuration (request timeout)
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL, optionally posting form parameters.
///
/// Story pages carry the age-gate form; everything else is a plain GET.
/// Status handling: 404 and other 4xx are permanent, 429 and 5xx are
/// retryable, timeouts and connection errors are retryable.
pub async fn fetch_url(
    client: &Client,
    url: &Url,
    form: Option<&BTreeMap<String, String>>,
) -> FetchResult {
    let request = match form.filter(|fields| !fields.is_empty()) {
        Some(fields) => client.post(url.clone()).form(fields),
        None => client.get(url.clone()),
    };

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            let retryable = e.is_timeout() || e.is_connect() || e.is_request();
            return FetchResult::NetworkError {
                error: e.to_string(),
                retryable,
            };
        }
    };

    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
            retryable: true,
        };
    }

    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
            retryable: false,
        };
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();

    // Missing Content-Type is tolerated; an explicit non-HTML type is not
    if !content_type.is_empty() && !content_type.contains("text/html") {
        return FetchResult::ContentMismatch { content_type };
    }

    match response.text().await {
        Ok(body) => FetchResult::Success {
            status_code: status.as_u16(),
            body,
        },
        Err(e) => FetchResult::NetworkError {
            error: e.to_string(),
            retryable: true,
        },
    }
}
