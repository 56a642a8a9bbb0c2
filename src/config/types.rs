use crate::rules::RuleSet;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for mediacrawl
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Number of crawl workers running at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Path to the SQLite page cache
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

/// A site to crawl: its seeds, limits and rules
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Unique name, stored with every page fetched for this site
    pub name: String,

    /// Minimum seconds between the starts of requests to the same host
    #[serde(default)]
    pub delay: f64,

    /// Maximum requests in flight per host
    #[serde(default = "default_domain_concurrency")]
    pub domain_concurrency: usize,

    /// Seed URLs
    pub urls: Vec<String>,

    /// Query parameter names stripped from discovered URLs
    #[serde(default)]
    pub query_ignore: Vec<String>,

    /// Which URLs are followed; absent means everything
    #[serde(default)]
    pub crawl: Option<RuleSet>,

    /// Which fetched pages are marked for extraction; absent means every page
    #[serde(default)]
    pub parse: Option<RuleSet>,
}

impl SiteConfig {
    /// Creates a site with default limits and no rules
    pub fn new(name: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            name: name.into(),
            delay: 0.0,
            domain_concurrency: default_domain_concurrency(),
            urls,
            query_ignore: Vec::new(),
            crawl: None,
            parse: None,
        }
    }

    /// The configured delay as a duration; negative or non-finite values count as zero
    pub fn delay_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay).unwrap_or(Duration::ZERO)
    }
}

impl CrawlConfig {
    /// Creates a configuration with defaults for everything but the sites
    pub fn new(sites: Vec<SiteConfig>) -> Self {
        Self {
            concurrency: default_concurrency(),
            user_agent: default_user_agent(),
            database_path: default_database_path(),
            sites,
        }
    }

    /// Looks up a site by name
    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.name == name)
    }
}

fn default_concurrency() -> usize {
    100
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (mediacrawl)".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("mediacrawl.db")
}

fn default_domain_concurrency() -> usize {
    10
}
