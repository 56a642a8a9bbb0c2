//! A single unit of crawl work
//!
//! A [`Task`] takes one URL of one site through its lifecycle: an optional
//! cache lookup, a rate-limited fetch, evaluation against the site's rules,
//! link extraction and finally persistence.

use crate::crawler::fetcher::{fetch_url, FetchResult};
use crate::crawler::scheduler::WorkerContext;
use crate::crawler::site::Site;
use crate::page::{Page, MIN_TEXT_LENGTH};
use crate::state::TaskState;
use crate::url::CrawlUrl;
use crate::{CrawlError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// One URL to crawl for one site
pub struct Task {
    site: Arc<Site>,
    url: CrawlUrl,
    state: TaskState,
}

impl Task {
    pub fn new(site: Arc<Site>, url: CrawlUrl) -> Self {
        Self {
            site,
            url,
            state: TaskState::Created,
        }
    }

    pub fn site(&self) -> &Arc<Site> {
        &self.site
    }

    pub fn url(&self) -> &CrawlUrl {
        &self.url
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Runs the task to a terminal state
    ///
    /// Seeds always go to the network. Other URLs are served from the cache
    /// when a copy exists; the cached copy is re-evaluated and its parse flag
    /// rewritten, but it is never fetched again.
    ///
    /// # Returns
    ///
    /// * `Ok(TaskState::Persisted)` - The page passed evaluation
    /// * `Ok(TaskState::Dropped)` - The page was rejected or could not be fetched
    /// * `Err(CrawlError)` - The cache or a limiter failed
    pub async fn crawl(&mut self, ctx: &WorkerContext) -> Result<TaskState> {
        if !self.site.is_seed(&self.url) {
            if let Some(page) = ctx.cache.find(&self.url).await? {
                self.advance(TaskState::CacheHit)?;
                ctx.stats.record_cache_hit();
                debug!("Cache hit for {}", self.url);
                return self.handle_cached(page, ctx).await;
            }
        }

        self.advance(TaskState::Fetching)?;
        let Some(mut page) = self.fetch(ctx).await? else {
            return self.drop_task("fetch failed");
        };

        self.advance(TaskState::Evaluating)?;
        if let Err(reason) = self.evaluate(&mut page) {
            return self.drop_task(reason);
        }

        self.advance(TaskState::Extracting)?;
        self.extract(&page, ctx);

        ctx.cache.save(&page).await?;
        ctx.stats.record_persisted();
        self.advance(TaskState::Persisted)?;
        Ok(self.state)
    }

    async fn handle_cached(&mut self, mut page: Page, ctx: &WorkerContext) -> Result<TaskState> {
        self.advance(TaskState::Evaluating)?;
        let evaluation = self.evaluate(&mut page);
        if evaluation.is_ok() {
            self.advance(TaskState::Extracting)?;
            self.extract(&page, ctx);
        }

        ctx.cache.update_parse_flag(&page).await?;

        match evaluation {
            Ok(()) => {
                self.advance(TaskState::Persisted)?;
                Ok(self.state)
            }
            Err(reason) => self.drop_task(reason),
        }
    }

    /// Fetches the task's URL under the site's and the global host limits
    ///
    /// Both permits are released as soon as the response body has been read.
    async fn fetch(&self, ctx: &WorkerContext) -> Result<Option<Page>> {
        let host = self.url.domain();
        let result = {
            let _site_permit = self.site.acquire(&host).await?;
            let _connection = ctx.connections.acquire(&host).await?;
            ctx.stats.record_fetch();
            fetch_url(&ctx.client, self.url.as_str()).await
        };

        match result {
            FetchResult::Success {
                final_url,
                status_code,
                content_type,
                charset,
                body,
                truncated,
            } => {
                info!(
                    "{} {} ({} bytes{})",
                    status_code,
                    self.url,
                    body.len(),
                    if truncated { ", truncated" } else { "" }
                );
                let mut page = Page::new(
                    self.site.name(),
                    CrawlUrl::new(final_url),
                    self.url.clone(),
                );
                page.ok = (200..300).contains(&status_code);
                page.status = Some(status_code);
                page.content_type = content_type;
                page.charset = charset;
                page.set_content(Some(body));
                Ok(Some(page))
            }
            FetchResult::HttpError { status_code } => {
                info!("{} {}", status_code, self.url);
                Ok(None)
            }
            FetchResult::NetworkError { error } => {
                error!("Failed to fetch {}: {}", self.url, error);
                Ok(None)
            }
        }
    }

    /// Decides whether a page is kept and whether it is marked for parsing
    ///
    /// Rules see the task's URL, not the URL the page was finally served from.
    fn evaluate(&self, page: &mut Page) -> std::result::Result<(), &'static str> {
        page.parse = false;

        match page.content() {
            None => return Err("no content"),
            Some(content) if content.len() < MIN_TEXT_LENGTH => return Err("content too short"),
            Some(_) => {}
        }

        if self.site.check_crawl(&self.url, Some(&*page)).is_denied() {
            return Err("denied by crawl rule");
        }

        if !page.ok {
            return Err("unsuccessful response");
        }

        if !self.site.check_parse(&self.url, Some(&*page)).is_denied() {
            page.parse = true;
        }

        Ok(())
    }

    /// Enqueues every link on the page, resolved against the fetched URL
    fn extract(&self, page: &Page, ctx: &WorkerContext) {
        let mut queued = 0;
        for link in page.links() {
            if let Some(url) = page.url.join(link) {
                if ctx.frontier.enqueue(&self.site, &url) {
                    queued += 1;
                }
            }
        }
        debug!("{} of {} links from {} queued", queued, page.links().len(), self.url);
    }

    fn drop_task(&mut self, reason: &str) -> Result<TaskState> {
        self.advance(TaskState::Dropped)?;
        debug!("Dropped {}: {}", self.url, reason);
        Ok(self.state)
    }

    fn advance(&mut self, next: TaskState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.site.name(), self.url, self.state)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("site", &self.site.name())
            .field("url", &self.url)
            .field("state", &self.state)
            .finish()
    }
}
