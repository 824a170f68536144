use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Skaz
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub site: SiteConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Stop accepting new stories once this many records are accepted
    #[serde(rename = "max-stories")]
    pub max_stories: u64,

    /// Minimum assembled content length for a record to be accepted
    #[serde(rename = "min-content-length")]
    pub min_content_length: usize,

    /// Maximum number of concurrent in-flight fetches
    #[serde(rename = "max-concurrent-fetches")]
    pub max_concurrent_fetches: u32,

    /// Minimum time between requests to the same host (milliseconds)
    #[serde(rename = "per-host-delay-ms")]
    pub per_host_delay_ms: u64,

    /// Maximum fetch attempts per URL before it is abandoned
    #[serde(rename = "max-fetch-retries")]
    pub max_fetch_retries: u32,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

/// Site layout configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Crawl root: the page listing category links
    #[serde(rename = "root-url")]
    pub root_url: String,

    /// Form fields posted with story-page requests (age-gate acknowledgement)
    #[serde(rename = "age-gate-form", default)]
    pub age_gate_form: BTreeMap<String, String>,
}

/// How the crawler identifies itself to the site
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// Page describing the crawler, advertised in the User-Agent header
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Abuse/contact address, advertised in the User-Agent header
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+URL; email)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the JSONL records file
    #[serde(rename = "records-path")]
    pub records_path: String,
}
