//! HTML parser for extracting a page title and outbound links
//!
//! Links are resolved against the page URL, so every address handed to the
//! traversal engine is absolute.

use crate::crawler::fetcher::Resource;
use scraper::{Html, Selector};
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    /// The page title (from the first <title> tag), empty if missing
    pub title: String,

    /// All links found on the page (absolute URLs, document order)
    pub links: Vec<String>,
}

impl ParsedPage {
    /// Creates a page from already-extracted parts
    pub fn new(title: impl Into<String>, links: Vec<String>) -> Self {
        Self {
            title: title.into(),
            links,
        }
    }
}

impl Resource for ParsedPage {
    fn title(&self) -> &str {
        &self.title
    }

    fn links(&self) -> &[String] {
        &self.links
    }
}

/// Parses HTML content and extracts the title and links
///
/// # Link Extraction Rules
///
/// **Include:** every `<a href="...">` that resolves to an http(s) URL.
///
/// **Exclude:** `javascript:`, `mailto:`, `tel:` and `data:` links,
/// fragment-only links, and anything that fails to resolve.
///
/// Duplicates are kept; the traversal engine deduplicates by address.
///
/// # Example
///
/// ```
/// use sounding::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, "Test");
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> String {
    let Ok(title_selector) = Selector::parse("title") else {
        return String::new();
    };

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Extracts all followable links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&a_selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| {
            let resolved = resolve_link(href, base_url);
            if resolved.is_none() {
                tracing::trace!(href, base = %base_url, "Skipping link");
            }
            resolved
        })
        .collect()
}

/// Resolves a link href to an absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url.to_string()),
        _ => None,
    }
}
