//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client with the configured user agent
//! - GET requests with redirects followed by the client
//! - Streaming bodies up to a size cap
//! - Error classification

use reqwest::header::CONTENT_TYPE;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use tracing::warn;

/// Largest body the crawler keeps, in bytes
pub const MAX_CONTENT: usize = 20 * 1024 * 1024;

/// Idle connections kept per host by the client pool
pub const MAX_HOST_CONNECTIONS: usize = 5;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REDIRECTS: usize = 10;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Media type from the Content-Type header, lowercased, without parameters
        content_type: Option<String>,
        /// `charset` parameter from the Content-Type header
        charset: Option<String>,
        /// Page body content
        body: Vec<u8>,
        /// Whether the body was cut short by the size cap or a stream error
        truncated: bool,
    },

    /// Server answered with a status above 299
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network error (connection refused, timeout, etc.)
    NetworkError {
        /// Error description
        error: String,
    },
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The User-Agent header sent with every request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use mediacrawl::crawler::build_http_client;
///
/// let client = build_http_client("Mozilla/5.0 (mediacrawl)").unwrap();
/// ```
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(REQUEST_TIMEOUT)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .pool_max_idle_per_host(MAX_HOST_CONNECTIONS)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL, keeping at most [`MAX_CONTENT`] bytes of the body
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
///
/// # Returns
///
/// A FetchResult indicating success or the type of failure
pub async fn fetch_url(client: &Client, url: &str) -> FetchResult {
    fetch_url_with_limit(client, url, MAX_CONTENT).await
}

/// Fetches a URL, keeping at most `limit` bytes of the body
///
/// A stream error after the headers arrived is logged and the bytes read so
/// far are returned as a truncated success.
pub async fn fetch_url_with_limit(client: &Client, url: &str, limit: usize) -> FetchResult {
    let mut response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            return FetchResult::NetworkError {
                error: describe_error(&e),
            }
        }
    };

    let status = response.status();
    if status.as_u16() > 299 {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
        };
    }

    let final_url = response.url().to_string();
    let (content_type, charset) = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(parse_content_type)
        .unwrap_or((None, None));

    let mut body = Vec::new();
    let mut truncated = false;
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let remaining = limit - body.len();
                if chunk.len() > remaining {
                    body.extend_from_slice(&chunk[..remaining]);
                    truncated = true;
                    break;
                }
                body.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Body of {} truncated at {} bytes: {}", url, body.len(), e);
                truncated = true;
                break;
            }
        }
    }

    FetchResult::Success {
        final_url,
        status_code: status.as_u16(),
        content_type,
        charset,
        body,
        truncated,
    }
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("Request timeout: {}", e)
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else if e.is_redirect() {
        format!("Redirect error: {}", e)
    } else {
        e.to_string()
    }
}

/// Splits a Content-Type header into its media type and charset
///
/// # Examples
///
/// ```
/// use mediacrawl::crawler::parse_content_type;
///
/// let (mime, charset) = parse_content_type("text/HTML; charset=\"UTF-8\"");
/// assert_eq!(mime.as_deref(), Some("text/html"));
/// assert_eq!(charset.as_deref(), Some("utf-8"));
/// ```
pub fn parse_content_type(header: &str) -> (Option<String>, Option<String>) {
    let mut parts = header.split(';');

    let mime = parts
        .next()
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty());

    let charset = parts.find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches('"').trim().to_ascii_lowercase();
        (!value.is_empty()).then_some(value)
    });

    (mime, charset)
}
