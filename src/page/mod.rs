//! Fetched pages
//!
//! A [`Page`] is the result of fetching one URL, either fresh from the network
//! or retrieved from the page cache. Decoded text and the outgoing link set are
//! derived from the raw body on first access and memoized per instance.

mod decode;

pub use decode::{decode_text, MIN_TEXT_LENGTH};

use crate::url::CrawlUrl;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::OnceLock;

/// A fetched (or cached) page and its metadata
#[derive(Debug, Clone)]
pub struct Page {
    /// Name of the site this page was crawled for
    pub site: String,

    /// URL the content was actually served from (after redirects)
    pub url: CrawlUrl,

    /// URL the crawler asked for
    pub original_url: CrawlUrl,

    pub method: String,

    /// Whether the HTTP response itself was successful
    pub ok: bool,

    /// Whether this page should be forwarded for text extraction
    pub parse: bool,

    /// True only when loaded from the cache rather than freshly fetched
    pub retrieved: bool,

    pub status: Option<u16>,
    pub timestamp: DateTime<Utc>,
    pub content_type: Option<String>,
    pub charset: Option<String>,

    content: Option<Vec<u8>>,
    text: OnceLock<Option<String>>,
    links: OnceLock<Vec<String>>,
}

impl Page {
    /// Creates an empty, not-yet-successful page stamped with the current time
    pub fn new(site: impl Into<String>, url: CrawlUrl, original_url: CrawlUrl) -> Self {
        Self {
            site: site.into(),
            url,
            original_url,
            method: "GET".to_string(),
            ok: false,
            parse: false,
            retrieved: false,
            status: None,
            timestamp: Utc::now(),
            content_type: None,
            charset: None,
            content: None,
            text: OnceLock::new(),
            links: OnceLock::new(),
        }
    }

    /// Raw body bytes, if any were read
    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    /// Replaces the body and forgets everything derived from the old one
    pub fn set_content(&mut self, content: Option<Vec<u8>>) {
        self.content = content;
        self.text = OnceLock::new();
        self.links = OnceLock::new();
    }

    /// Best-effort decoded text of the body
    ///
    /// `None` for missing bodies, PDFs, bodies under [`MIN_TEXT_LENGTH`] bytes
    /// and bodies no candidate encoding decodes cleanly.
    pub fn text(&self) -> Option<&str> {
        self.text
            .get_or_init(|| {
                self.content
                    .as_deref()
                    .and_then(|c| decode_text(c, self.charset.as_deref()))
            })
            .as_deref()
    }

    /// Parses the body into a document tree
    ///
    /// Uses the decoded text when available and falls back to a lossy reading
    /// of the raw bytes otherwise. The tree is not `Send`, so it is rebuilt on
    /// each call instead of being stored on the page.
    pub fn document(&self) -> Option<Html> {
        let content = self.content.as_deref()?;
        let source = match self.text() {
            Some(text) => Cow::Borrowed(text),
            None => String::from_utf8_lossy(content),
        };
        Some(Html::parse_document(&source))
    }

    /// Raw `href`s of anchors and `src`s of inline frames, deduplicated,
    /// in document order
    pub fn links(&self) -> &[String] {
        self.links.get_or_init(|| match self.document() {
            Some(document) => extract_links(&document),
            None => Vec::new(),
        })
    }
}

fn extract_links(document: &Html) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for (selector, attribute) in [("a[href]", "href"), ("iframe[src]", "src")] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        for element in document.select(&selector) {
            if let Some(value) = element.value().attr(attribute) {
                if seen.insert(value.to_string()) {
                    links.push(value.to_string());
                }
            }
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_body(body: &str) -> Page {
        let url = CrawlUrl::new("http://example.com/");
        let mut page = Page::new("example", url.clone(), url);
        page.set_content(Some(body.as_bytes().to_vec()));
        page
    }

    fn padded(body: &str) -> String {
        format!("<html><head><title>padding padding padding padding padding</title></head><body>{}</body></html>", body)
    }

    #[test]
    fn test_new_page_defaults() {
        let url = CrawlUrl::new("http://example.com/");
        let page = Page::new("example", url.clone(), url);
        assert_eq!(page.method, "GET");
        assert!(!page.ok);
        assert!(!page.parse);
        assert!(!page.retrieved);
        assert!(page.content().is_none());
        assert!(page.text().is_none());
        assert!(page.document().is_none());
        assert!(page.links().is_empty());
    }

    #[test]
    fn test_text_decodes_utf8() {
        let page = page_with_body(&padded("Grüße aus Köln"));
        assert!(page.text().unwrap().contains("Grüße aus Köln"));
    }

    #[test]
    fn test_short_body_has_no_text() {
        let page = page_with_body("<p>tiny</p>");
        assert!(page.text().is_none());
        // still parseable from raw bytes
        assert!(page.document().is_some());
    }

    #[test]
    fn test_links_anchors_and_iframes() {
        let page = page_with_body(&padded(
            r#"<a href="/about">About</a>
               <iframe src="//video.example.org/embed/1"></iframe>
               <a href="/about">About again</a>
               <a name="anchor-without-href">x</a>"#,
        ));
        assert_eq!(page.links(), &["/about", "//video.example.org/embed/1"]);
    }

    #[test]
    fn test_links_from_undecodable_body() {
        let mut bytes = padded(r#"<a href="/raw">raw</a>"#).into_bytes();
        bytes.extend_from_slice(&[0xff, 0xfe, 0xfd]);
        let url = CrawlUrl::new("http://example.com/");
        let mut page = Page::new("example", url.clone(), url);
        page.set_content(Some(bytes));
        assert!(page.text().is_none());
        assert_eq!(page.links(), &["/raw"]);
    }

    #[test]
    fn test_set_content_resets_derived_fields() {
        let mut page = page_with_body(&padded(r#"<a href="/one">1</a>"#));
        assert_eq!(page.links(), &["/one"]);
        page.set_content(Some(padded(r#"<a href="/two">2</a>"#).into_bytes()));
        assert_eq!(page.links(), &["/two"]);
    }
}
