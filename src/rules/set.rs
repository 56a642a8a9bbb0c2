use crate::page::Page;
use crate::rules::{Rule, RuleOutcome};
use crate::url::CrawlUrl;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// A rule tree as written in the site configuration
///
/// Each node is a single-key table in TOML:
///
/// ```toml
/// crawl = { and = [{ domain = "example.com" }, { not = { pattern = ".*/login.*" } }] }
/// parse = { mime_group = "text" }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSet {
    /// Matches everything
    MatchAll {},

    /// Host equals the domain or is one of its subdomains; a leading `*.` is accepted
    Domain(String),

    /// Regular expression that must match the whole URL
    Pattern(Pattern),

    /// Exact content type of the fetched page
    MimeType(String),

    /// Major part of the content type (`text`, `application`, ...)
    MimeGroup(String),

    And(Vec<RuleSet>),

    Or(Vec<RuleSet>),

    Not(Box<RuleSet>),
}

impl Rule for RuleSet {
    fn check(&self, url: &CrawlUrl, page: Option<&Page>) -> RuleOutcome {
        match self {
            Self::MatchAll {} => RuleOutcome::Allow,
            Self::Domain(domain) => RuleOutcome::from_match(matches_domain(domain, &url.domain())),
            Self::Pattern(pattern) => RuleOutcome::from_match(pattern.is_match(url.as_str())),
            Self::MimeType(expected) => match page {
                Some(page) => RuleOutcome::from_match(
                    page.content_type
                        .as_deref()
                        .is_some_and(|ct| ct.eq_ignore_ascii_case(expected.trim())),
                ),
                None => RuleOutcome::Unset,
            },
            Self::MimeGroup(expected) => match page {
                Some(page) => RuleOutcome::from_match(
                    page.content_type
                        .as_deref()
                        .and_then(|ct| ct.split('/').next())
                        .is_some_and(|group| group.trim().eq_ignore_ascii_case(expected.trim())),
                ),
                None => RuleOutcome::Unset,
            },
            Self::And(children) => {
                let mut all_allow = true;
                for child in children {
                    match child.check(url, page) {
                        RuleOutcome::Deny => return RuleOutcome::Deny,
                        RuleOutcome::Unset => all_allow = false,
                        RuleOutcome::Allow => {}
                    }
                }
                if all_allow {
                    RuleOutcome::Allow
                } else {
                    RuleOutcome::Unset
                }
            }
            Self::Or(children) => {
                let mut all_deny = true;
                for child in children {
                    match child.check(url, page) {
                        RuleOutcome::Allow => return RuleOutcome::Allow,
                        RuleOutcome::Unset => all_deny = false,
                        RuleOutcome::Deny => {}
                    }
                }
                if all_deny {
                    RuleOutcome::Deny
                } else {
                    RuleOutcome::Unset
                }
            }
            Self::Not(inner) => inner.check(url, page).negate(),
        }
    }
}

impl RuleSet {
    /// Visits every domain named in the tree, for config validation
    pub(crate) fn domains(&self) -> Vec<&str> {
        match self {
            Self::Domain(domain) => vec![domain.as_str()],
            Self::And(children) | Self::Or(children) => {
                children.iter().flat_map(|c| c.domains()).collect()
            }
            Self::Not(inner) => inner.domains(),
            _ => Vec::new(),
        }
    }
}

fn matches_domain(pattern: &str, host: &str) -> bool {
    let base = pattern
        .trim()
        .trim_start_matches("*.")
        .trim_matches('.')
        .to_lowercase();
    if base.is_empty() {
        return false;
    }
    host == base || host.ends_with(&format!(".{}", base))
}

/// A compiled, whole-string regular expression
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", source))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.source)
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let source = String::deserialize(deserializer)?;
        Pattern::new(&source).map_err(serde::de::Error::custom)
    }
}
