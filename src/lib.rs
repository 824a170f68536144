//! Skaz: a story-archive crawler
//!
//! This crate crawls a story-archive site from a configured root, walks its
//! category tree and category pagination, fetches stories that span multiple
//! linked pages, reassembles each story into one record, and appends accepted
//! records to a line-oriented JSONL sink.

pub mod config;
pub mod crawler;
pub mod record;
pub mod sink;
pub mod url;

use thiserror::Error;

/// Main error type for Skaz operations
#[derive(Debug, Error)]
pub enum SkazError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL classification error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Failed to construct HTTP client: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Sink error: {0}")]
    Sink(#[from] sink::SinkError),

    #[error("Root page unavailable: {url}")]
    RootUnavailable { url: String },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Skaz operations
pub type Result<T> = std::result::Result<T, SkazError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use record::{StoryMetadata, StoryRecord};
pub use url::{Classifier, PageKind, PageSequence, StoryId};
