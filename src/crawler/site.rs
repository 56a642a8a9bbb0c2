use crate::config::SiteConfig;
use crate::crawler::limiter::{HostLimiter, HostPermit};
use crate::page::Page;
use crate::rules::{Rule, RuleOutcome};
use crate::url::CrawlUrl;
use std::collections::HashSet;
use tokio::sync::AcquireError;

/// Runtime view of a configured site
///
/// Holds the parsed seeds, the rules as trait objects and the site's own
/// per-host limiter.
#[derive(Debug)]
pub struct Site {
    name: String,
    seeds: Vec<CrawlUrl>,
    seed_ids: HashSet<String>,
    query_ignore: HashSet<String>,
    crawl: Option<Box<dyn Rule>>,
    parse: Option<Box<dyn Rule>>,
    limiter: HostLimiter,
}

impl Site {
    pub fn new(config: &SiteConfig) -> Self {
        let seeds: Vec<CrawlUrl> = config.urls.iter().map(CrawlUrl::new).collect();
        let seed_ids = seeds.iter().map(|s| s.id().to_string()).collect();

        Self {
            name: config.name.clone(),
            seeds,
            seed_ids,
            query_ignore: config.query_ignore.iter().cloned().collect(),
            crawl: config.crawl.clone().map(|r| Box::new(r) as Box<dyn Rule>),
            parse: config.parse.clone().map(|r| Box::new(r) as Box<dyn Rule>),
            limiter: HostLimiter::new(config.domain_concurrency, config.delay_duration()),
        }
    }

    /// Replaces the crawl rule
    pub fn with_crawl_rule(mut self, rule: Box<dyn Rule>) -> Self {
        self.crawl = Some(rule);
        self
    }

    /// Replaces the parse rule
    pub fn with_parse_rule(mut self, rule: Box<dyn Rule>) -> Self {
        self.parse = Some(rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seeds(&self) -> &[CrawlUrl] {
        &self.seeds
    }

    /// Whether `url` is one of the seeds, compared by canonical id
    pub fn is_seed(&self, url: &CrawlUrl) -> bool {
        self.seed_ids.contains(url.id())
    }

    /// Normalizes a discovered URL for this site
    pub fn clean(&self, url: &CrawlUrl) -> CrawlUrl {
        url.clean(&self.query_ignore)
    }

    /// Evaluates the crawl rule; no rule means no opinion
    pub fn check_crawl(&self, url: &CrawlUrl, page: Option<&Page>) -> RuleOutcome {
        self.crawl
            .as_ref()
            .map_or(RuleOutcome::Unset, |rule| rule.check(url, page))
    }

    /// Evaluates the parse rule; no rule means no opinion
    pub fn check_parse(&self, url: &CrawlUrl, page: Option<&Page>) -> RuleOutcome {
        self.parse
            .as_ref()
            .map_or(RuleOutcome::Unset, |rule| rule.check(url, page))
    }

    /// Waits for this site's turn to request `host`
    pub async fn acquire(&self, host: &str) -> Result<HostPermit, AcquireError> {
        self.limiter.acquire(host).await
    }
}
