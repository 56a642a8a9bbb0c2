use crate::config::types::{CrawlConfig, SiteConfig};
use crate::rules::RuleSet;
use crate::url::CrawlUrl;
use crate::ConfigError;
use std::collections::HashSet;

/// Validates the entire configuration
pub fn validate(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be >= 1, got {}",
            config.concurrency
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.database_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for site in &config.sites {
        validate_site(site)?;
        if !names.insert(site.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate site name: {}",
                site.name
            )));
        }
    }

    Ok(())
}

/// Validates one site entry
fn validate_site(site: &SiteConfig) -> Result<(), ConfigError> {
    if site.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "Site name cannot be empty".to_string(),
        ));
    }

    if !site.delay.is_finite() || site.delay < 0.0 {
        return Err(ConfigError::Validation(format!(
            "Site {}: delay must be a non-negative number of seconds, got {}",
            site.name, site.delay
        )));
    }

    if site.domain_concurrency < 1 {
        return Err(ConfigError::Validation(format!(
            "Site {}: domain-concurrency must be >= 1, got {}",
            site.name, site.domain_concurrency
        )));
    }

    if site.urls.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Site {} has no seed URLs",
            site.name
        )));
    }

    for url in &site.urls {
        CrawlUrl::parse_http(url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Site {}: {}", site.name, e)))?;
    }

    for rule in [&site.crawl, &site.parse].into_iter().flatten() {
        validate_rule(&site.name, rule)?;
    }

    Ok(())
}

/// Validates a rule tree; regexes are already compiled during parsing
fn validate_rule(site: &str, rule: &RuleSet) -> Result<(), ConfigError> {
    for domain in rule.domains() {
        if domain.trim().trim_start_matches("*.").trim_matches('.').is_empty() {
            return Err(ConfigError::InvalidRule(format!(
                "Site {}: domain rule cannot be empty",
                site
            )));
        }
    }
    Ok(())
}
