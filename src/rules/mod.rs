//! Crawl and parse rules
//!
//! A rule is a tri-state predicate over a URL and, once it has been fetched,
//! its page. Sites carry two optional rules: `crawl` decides whether a URL is
//! followed at all, `parse` decides whether a fetched page is marked for text
//! extraction.
//!
//! Only an explicit [`RuleOutcome::Deny`] blocks anything. [`RuleOutcome::Unset`]
//! means the rule has no opinion, which is what content rules report when they
//! are asked about a URL that has not been fetched yet.

mod set;

pub use set::{Pattern, RuleSet};

use crate::page::Page;
use crate::url::CrawlUrl;
use std::fmt::Debug;

/// Result of evaluating a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleOutcome {
    Allow,
    Deny,
    Unset,
}

impl RuleOutcome {
    /// Maps a plain match result onto allow/deny
    pub fn from_match(matched: bool) -> Self {
        if matched {
            Self::Allow
        } else {
            Self::Deny
        }
    }

    /// Returns true only for an explicit denial
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny)
    }

    /// Swaps allow and deny; no opinion stays no opinion
    pub fn negate(self) -> Self {
        match self {
            Self::Allow => Self::Deny,
            Self::Deny => Self::Allow,
            Self::Unset => Self::Unset,
        }
    }
}

/// A predicate deciding whether a URL (and optionally its page) passes
pub trait Rule: Debug + Send + Sync {
    /// Evaluates the rule
    ///
    /// `page` is `None` when the crawler is deciding whether to enqueue a
    /// discovered link, and the fetched page afterwards.
    fn check(&self, url: &CrawlUrl, page: Option<&Page>) -> RuleOutcome;
}
