//! Configuration loading and validation
//!
//! Configuration is a TOML file with kebab-case keys, loaded once at startup
//! and validated before any crawl state exists.

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use types::{Config, CrawlerConfig, OutputConfig, SiteConfig, UserAgentConfig};
pub use validation::validate;
