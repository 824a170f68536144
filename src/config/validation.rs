use crate::config::types::Config;
use crate::url::Classifier;
use crate::ConfigError;

/// Validates a parsed configuration
///
/// Checks that every field makes sense before any crawl state is created:
/// the root URL must classify cleanly, numeric limits must be usable, and
/// the user-agent identification must be complete.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler(config)?;
    validate_site(config)?;
    validate_user_agent(config)?;
    validate_output(config)?;
    Ok(())
}

fn validate_crawler(config: &Config) -> Result<(), ConfigError> {
    let c = &config.crawler;

    if c.max_stories == 0 {
        return Err(ConfigError::Validation(
            "max-stories must be greater than 0".to_string(),
        ));
    }

    if c.max_concurrent_fetches == 0 {
        return Err(ConfigError::Validation(
            "max-concurrent-fetches must be greater than 0".to_string(),
        ));
    }

    if c.min_content_length == 0 {
        return Err(ConfigError::Validation(
            "min-content-length must be greater than 0".to_string(),
        ));
    }

    if c.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_site(config: &Config) -> Result<(), ConfigError> {
    // The classifier applies the same scheme/host checks used at crawl time
    Classifier::new(&config.site.root_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.site.root_url, e)))?;
    Ok(())
}

fn validate_user_agent(config: &Config) -> Result<(), ConfigError> {
    let ua = &config.user_agent;

    if ua.crawler_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name must not be empty".to_string(),
        ));
    }

    if ua.crawler_version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crawler-version must not be empty".to_string(),
        ));
    }

    if !ua.contact_url.starts_with("http://") && !ua.contact_url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "contact-url must be an http(s) URL, got: {}",
            ua.contact_url
        )));
    }

    if !ua.contact_email.contains('@') {
        return Err(ConfigError::Validation(format!(
            "contact-email does not look like an email address: {}",
            ua.contact_email
        )));
    }

    Ok(())
}

fn validate_output(config: &Config) -> Result<(), ConfigError> {
    if config.output.records_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "records-path must not be empty".to_string(),
        ));
    }
    Ok(())
}
