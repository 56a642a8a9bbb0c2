use crate::UrlError;
use sha1::{Digest, Sha1};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use url::{form_urlencoded, Url};

/// An immutable URL as seen by the crawler
///
/// The raw string is kept exactly as it was discovered or configured. Parsed
/// components and the canonical id are derived on first use and memoized.
///
/// Two `CrawlUrl`s are equal when their canonical ids are equal, so URLs that
/// differ only by fragment, host case, trailing slash or scheme compare equal
/// and hash to the same bucket.
#[derive(Clone)]
pub struct CrawlUrl {
    raw: String,
    parsed: OnceLock<Option<Url>>,
    id: OnceLock<String>,
}

impl CrawlUrl {
    /// Wraps a raw URL string. Never fails; unparseable input is kept and
    /// reports `None` from [`CrawlUrl::parsed`].
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            parsed: OnceLock::new(),
            id: OnceLock::new(),
        }
    }

    /// Parses an absolute http(s) URL, rejecting anything else
    ///
    /// # Examples
    ///
    /// ```
    /// use mediacrawl::url::CrawlUrl;
    ///
    /// assert!(CrawlUrl::parse_http("https://example.com/").is_ok());
    /// assert!(CrawlUrl::parse_http("ftp://example.com/").is_err());
    /// assert!(CrawlUrl::parse_http("not a url").is_err());
    /// ```
    pub fn parse_http(raw: &str) -> Result<Self, UrlError> {
        let parsed = Url::parse(raw).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(UrlError::InvalidScheme(parsed.scheme().to_string()));
        }
        Ok(Self::new(raw))
    }

    /// The URL exactly as given
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed components, `None` for input the URL parser rejects
    pub fn parsed(&self) -> Option<&Url> {
        self.parsed
            .get_or_init(|| Url::parse(&self.raw).ok())
            .as_ref()
    }

    /// Lowercase hostname with surrounding dots stripped
    ///
    /// Falls back to `localhost` when the URL has no host.
    pub fn domain(&self) -> String {
        self.parsed()
            .and_then(|u| u.host_str())
            .map(|h| h.trim_matches('.').to_lowercase())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }

    /// Lowercase scheme, `http` when none is present
    pub fn scheme(&self) -> String {
        if let Some(url) = self.parsed() {
            return url.scheme().to_lowercase();
        }
        match self.raw.split_once("://") {
            Some((scheme, _)) if !scheme.trim().is_empty() => scheme.trim().to_lowercase(),
            _ => "http".to_string(),
        }
    }

    /// Whether the scheme is one the crawler fetches
    pub fn is_http(&self) -> bool {
        matches!(self.scheme().as_str(), "http" | "https")
    }

    /// Canonical fingerprint used as the dedup key
    ///
    /// SHA-1 hex digest of the URL with the fragment removed, the host
    /// lowercased, trailing slashes stripped from the path and the scheme
    /// forced to `http`. Query parameters are kept verbatim.
    ///
    /// # Examples
    ///
    /// ```
    /// use mediacrawl::url::CrawlUrl;
    ///
    /// let a = CrawlUrl::new("https://EXAMPLE.com/news/#top");
    /// let b = CrawlUrl::new("http://example.com/news");
    /// assert_eq!(a.id(), b.id());
    /// ```
    pub fn id(&self) -> &str {
        self.id.get_or_init(|| {
            let canonical = self.canonical_form();
            hex::encode(Sha1::digest(canonical.as_bytes()))
        })
    }

    fn canonical_form(&self) -> String {
        let Some(url) = self.parsed() else {
            let without_fragment = self.raw.split('#').next().unwrap_or_default();
            return without_fragment.trim_end_matches('/').to_string();
        };

        let mut form = String::from("http://");
        if !url.username().is_empty() {
            form.push_str(url.username());
            if let Some(password) = url.password() {
                form.push(':');
                form.push_str(password);
            }
            form.push('@');
        }
        if let Some(host) = url.host_str() {
            form.push_str(&host.to_lowercase());
        }
        if let Some(port) = url.port() {
            form.push_str(&format!(":{}", port));
        }
        form.push_str(url.path().trim_end_matches('/'));
        if let Some(query) = url.query() {
            form.push('?');
            form.push_str(query);
        }
        form
    }

    /// Returns the form stored in the dedup set and work queue
    ///
    /// Strips the fragment, lowercases the host and drops every query parameter
    /// whose name is in `ignored`. Unlike [`CrawlUrl::id`], scheme and trailing
    /// slash are left alone, so `clean(u).id()` equals `u.id()` only when no
    /// ignored parameter was present.
    pub fn clean(&self, ignored: &HashSet<String>) -> CrawlUrl {
        let Some(url) = self.parsed() else {
            let without_fragment = self.raw.split('#').next().unwrap_or_default();
            return CrawlUrl::new(without_fragment);
        };

        let mut cleaned = url.clone();
        cleaned.set_fragment(None);

        if let Some(host) = url.host_str() {
            let lowered = host.to_lowercase();
            if lowered != host {
                // Only fails for hosts the parser already accepted as invalid
                let _ = cleaned.set_host(Some(&lowered));
            }
        }

        if let Some(query) = url.query().filter(|_| !ignored.is_empty()) {
            let segments: Vec<&str> = query.split('&').collect();
            let kept: Vec<&str> = segments
                .iter()
                .copied()
                .filter(|segment| !is_ignored_param(segment, ignored))
                .collect();

            if kept.len() != segments.len() {
                if kept.is_empty() {
                    cleaned.set_query(None);
                } else {
                    cleaned.set_query(Some(&kept.join("&")));
                }
            }
        }

        CrawlUrl::from(cleaned)
    }

    /// Resolves a link found on this page against this URL
    ///
    /// Handles absolute, protocol-relative (`//host/x`), root-relative and
    /// path-relative references. Returns `None` only when the result cannot
    /// be parsed.
    pub fn join(&self, relative: &str) -> Option<CrawlUrl> {
        let relative = relative.trim();
        match self.parsed() {
            Some(base) => base.join(relative).ok().map(CrawlUrl::from),
            None => Url::parse(relative).ok().map(CrawlUrl::from),
        }
    }
}

/// Whether a raw `key=value` query segment names an ignored parameter
fn is_ignored_param(segment: &str, ignored: &HashSet<String>) -> bool {
    form_urlencoded::parse(segment.as_bytes())
        .next()
        .is_some_and(|(key, _)| ignored.contains(key.as_ref()))
}

impl From<Url> for CrawlUrl {
    fn from(url: Url) -> Self {
        let raw = url.to_string();
        let parsed = OnceLock::new();
        let _ = parsed.set(Some(url));
        Self {
            raw,
            parsed,
            id: OnceLock::new(),
        }
    }
}

impl From<&str> for CrawlUrl {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl PartialEq for CrawlUrl {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for CrawlUrl {}

impl Hash for CrawlUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Display for CrawlUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Debug for CrawlUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CrawlUrl({:?})", self.raw)
    }
}
