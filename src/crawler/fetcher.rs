//! Fetch adapter and resource contracts
//!
//! The traversal engine only sees two traits:
//! - `Fetcher`: turns an address into a `Resource`, or fails
//! - `Resource`: exposes a title and outbound addresses
//!
//! `HttpFetcher` is the production implementation, built on `reqwest`
//! and the HTML parser in this crate.

use crate::crawler::parser::parse_html;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A fetched and parsed resource
pub trait Resource: Send + Sync {
    /// The resource title, empty if it has none
    fn title(&self) -> &str;

    /// Outbound addresses, already absolute, in document order
    fn links(&self) -> &[String];
}

/// Errors produced while fetching a single address
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Expected HTML from {url}, got {content_type}")]
    ContentMismatch { url: String, content_type: String },

    #[error("Resource {url} unavailable: {reason}")]
    Unavailable { url: String, reason: String },

    #[error("Fetch of {url} cancelled")]
    Cancelled { url: String },
}

impl FetchError {
    /// Returns true if the fetch stopped because the run was cancelled
    ///
    /// Cancellation is not a fetch failure and is never reported as one.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Fetch adapter used by the traversal engine
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches and parses `address`
    ///
    /// Implementations must return `FetchError::Cancelled` promptly once
    /// `cancel` fires.
    async fn fetch(
        &self,
        cancel: &CancellationToken,
        address: &str,
    ) -> Result<Box<dyn Resource>, FetchError>;
}

/// Builds an HTTP client with the configured user agent and timeout
///
/// # Example
///
/// ```no_run
/// use sounding::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client("sounding/0.1", Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// HTTP implementation of `Fetcher`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher around an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a fetcher with its own client
    pub fn with_settings(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(user_agent, timeout)?))
    }

    /// Sends the GET request and parses the body
    ///
    /// # Error Classification
    ///
    /// | Condition | Error |
    /// |-----------|-------|
    /// | Unparseable address | InvalidUrl |
    /// | Transport timeout | Timeout |
    /// | Other transport failure | Http |
    /// | Non-2xx status | Status |
    /// | Content-Type present and not HTML | ContentMismatch |
    async fn get(&self, address: &str) -> Result<Box<dyn Resource>, FetchError> {
        let url = Url::parse(address).map_err(|e| FetchError::InvalidUrl {
            url: address.to_string(),
            message: e.to_string(),
        })?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify(address, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: address.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !content_type.contains("text/html") {
                return Err(FetchError::ContentMismatch {
                    url: address.to_string(),
                    content_type: content_type.to_string(),
                });
            }
        }

        let body = response.text().await.map_err(|e| classify(address, e))?;

        Ok(Box::new(parse_html(&body, &url)))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        cancel: &CancellationToken,
        address: &str,
    ) -> Result<Box<dyn Resource>, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled {
                url: address.to_string(),
            }),
            result = self.get(address) => result,
        }
    }
}

fn classify(address: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: address.to_string(),
        }
    } else {
        FetchError::Http {
            url: address.to_string(),
            source: error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::with_settings("TestCrawler/1.0", Duration::from_secs(5)).unwrap()
    }

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client("TestCrawler/1.0", Duration::from_secs(30)).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_parses_title_and_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/help"))
            .respond_with(html(
                r#"<html><head><title>Help</title></head>
                <body><a href="/first">1</a><a href="second">2</a></body></html>"#,
            ))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let address = format!("{}/help", server.uri());
        let page = fetcher().fetch(&cancel, &address).await.unwrap();

        assert_eq!(page.title(), "Help");
        assert_eq!(
            page.links(),
            &[
                format!("{}/first", server.uri()),
                format!("{}/second", server.uri())
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(html("<html></html>").set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::with_settings("TestCrawler/1.0", Duration::from_secs(1)).unwrap();
        let cancel = CancellationToken::new();
        let result = fetcher
            .fetch(&cancel, &format!("{}/slow", server.uri()))
            .await;

        assert!(matches!(result, Err(FetchError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let result = fetcher()
            .fetch(&cancel, &format!("{}/missing", server.uri()))
            .await;

        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_fetch_content_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0x25, 0x50, 0x44, 0x46])
                    .insert_header("content-type", "application/pdf"),
            )
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let result = fetcher()
            .fetch(&cancel, &format!("{}/doc.pdf", server.uri()))
            .await;

        assert!(matches!(result, Err(FetchError::ContentMismatch { .. })));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let cancel = CancellationToken::new();
        let result = fetcher().fetch(&cancel, "not a url").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_fetch_cancelled_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(html("<title>never</title>"))
            .expect(0)
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = fetcher().fetch(&cancel, &format!("{}/", server.uri())).await;

        assert!(result.as_ref().err().map(FetchError::is_cancelled).unwrap_or(false));
    }

    #[tokio::test]
    async fn test_fetch_cancelled_during_slow_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(html("<title>slow</title>").set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = fetcher().fetch(&cancel, &format!("{}/", server.uri())).await;

        assert!(matches!(result, Err(FetchError::Cancelled { .. })));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
