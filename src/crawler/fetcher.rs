//! HTTP retrieval of crawl candidates

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::Client as ReqwestClient;
use scraper::Html;
use tracing::{debug, instrument, warn};
use url::Url;

use super::config::CrawlerConfig;
use super::decode::{charset_from_content_type, DecodePolicy, DecodeSource};
use super::error::CrawlError;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// A successfully fetched and decoded response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL that was requested
    pub url: Url,

    /// URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status: u16,

    /// Decoded body
    pub body: String,

    /// Which decoding step produced the body
    pub decoded_with: DecodeSource,
}

impl FetchedPage {
    /// Parse the body into a document tree
    pub fn into_document(self) -> ParsedDocument {
        ParsedDocument::parse(self.url, self.final_url, &self.body)
    }
}

/// A parsed page ready for extraction and link harvesting
///
/// The tree is not `Send`; build it, use it and drop it without holding it
/// across an `.await`.
pub struct ParsedDocument {
    /// URL the page was requested under
    pub url: Url,

    /// URL relative links resolve against
    pub base_url: Url,

    /// The parsed markup
    pub html: Html,
}

impl ParsedDocument {
    /// Parse markup fetched from `url` (served from `base_url` after redirects)
    pub fn parse(url: Url, base_url: Url, markup: &str) -> Self {
        Self {
            url,
            base_url,
            html: Html::parse_document(markup),
        }
    }

    /// Parse markup for a page that was not redirected
    pub fn from_markup(url: Url, markup: &str) -> Self {
        Self::parse(url.clone(), url, markup)
    }
}

/// HTTP fetcher for crawl candidates
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: ReqwestClient,
    decode: DecodePolicy,
}

impl PageFetcher {
    /// Create a fetcher with the headers, timeout and decoding policy from `config`
    pub fn new(config: &CrawlerConfig) -> Result<Self, CrawlError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        let language = HeaderValue::from_str(&config.accept_language)
            .map_err(|e| CrawlError::Config(format!("invalid Accept-Language: {}", e)))?;
        headers.insert(ACCEPT_LANGUAGE, language);

        let client = ReqwestClient::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            decode: config.decode.clone(),
        })
    }

    /// Fetch a page, logging and swallowing any failure
    pub async fn fetch(&self, url: &Url) -> Option<FetchedPage> {
        match self.try_fetch(url).await {
            Ok(page) => Some(page),
            Err(e) => {
                warn!(%url, error = %e, "Skipping page");
                None
            }
        }
    }

    /// Fetch and decode a page
    #[instrument(skip_all, fields(url = %url), level = "debug")]
    pub async fn try_fetch(&self, url: &Url) -> Result<FetchedPage, CrawlError> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(content_type) = &content_type {
            if !is_document_type(content_type) {
                return Err(CrawlError::UnsupportedContent {
                    url: url.to_string(),
                    content_type: content_type.clone(),
                });
            }
        }

        let bytes = response.bytes().await?;
        let declared = content_type.as_deref().and_then(charset_from_content_type);
        let tld = final_url
            .host_str()
            .and_then(|host| host.rsplit('.').next())
            .filter(|tld| !tld.is_empty() && tld.bytes().all(|b| b.is_ascii_lowercase()))
            .map(str::to_string);

        let decoded = self.decode.decode(&bytes, declared, tld.as_deref());
        debug!(
            encoding = decoded.encoding.name(),
            bytes = bytes.len(),
            "Fetched page"
        );

        Ok(FetchedPage {
            url: url.clone(),
            final_url,
            status: status.as_u16(),
            body: decoded.text,
            decoded_with: decoded.source,
        })
    }
}

/// Whether a Content-Type names something we can extract text from
fn is_document_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.is_empty() || mime.starts_with("text/") || mime.contains("html") || mime.ends_with("xml")
}
