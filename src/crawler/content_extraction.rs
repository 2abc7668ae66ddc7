//! Content extraction functionality for the crawler module

use scraper::{ElementRef, Node, Selector};
use thiserror::Error;
use tracing::warn;

use super::config::CrawlerConfig;
use super::fetcher::ParsedDocument;
use super::normalizer::normalize;
use super::IndexedPage;

/// Why a fetched page was not turned into an [`IndexedPage`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionReject {
    /// The document has no body element
    #[error("page has no body")]
    NoBody,

    /// The main content is below the word threshold
    #[error("page has {words} words, fewer than the required {min}")]
    TooShort {
        /// Words found
        words: usize,
        /// Words required
        min: usize,
    },
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!("Failed to parse selector '{}': {}", selector, e);
            None
        }
    }
}

/// Append the text below `element`, skipping excluded subtrees
fn collect_text(element: ElementRef<'_>, exclude_tags: &[String], out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                if exclude_tags.iter().any(|tag| tag.eq_ignore_ascii_case(el.name())) {
                    continue;
                }
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, exclude_tags, out);
                }
            }
            _ => {}
        }
    }
}

fn cleaned_text(element: ElementRef<'_>, exclude_tags: &[String]) -> String {
    let mut raw = String::new();
    collect_text(element, exclude_tags, &mut raw);
    normalize(&raw)
}

/// Extract the page title
///
/// Falls back to the last non-empty path segment of the URL, then to the
/// URL itself.
pub fn extract_title(doc: &ParsedDocument) -> String {
    let title = parse_selector("title")
        .and_then(|selector| {
            doc.html
                .select(&selector)
                .next()
                .map(|element| normalize(&element.text().collect::<String>()))
        })
        .unwrap_or_default();

    if !title.is_empty() {
        return title;
    }

    doc.url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .unwrap_or_else(|| doc.url.to_string())
}

/// Extract the main text of the page
///
/// The first of `config.content_selectors` that matches wins; if none does,
/// the whole body is used. Elements named in `config.exclude_tags` are left
/// out either way. Returns `None` when the document has no body.
pub fn extract_main_content(doc: &ParsedDocument, config: &CrawlerConfig) -> Option<String> {
    for selector in config.content_selectors.iter().filter_map(|s| parse_selector(s)) {
        if let Some(container) = doc.html.select(&selector).next() {
            return Some(cleaned_text(container, &config.exclude_tags));
        }
    }

    let body = parse_selector("body")?;
    doc.html
        .select(&body)
        .next()
        .map(|body| cleaned_text(body, &config.exclude_tags))
}

/// Extract the meta description, or an empty string
pub fn extract_description(doc: &ParsedDocument) -> String {
    parse_selector("meta[name='description']")
        .and_then(|selector| {
            doc.html
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("content"))
                .map(normalize)
        })
        .unwrap_or_default()
}

/// Turn a parsed document into an indexable page
pub fn extract_page(
    doc: &ParsedDocument,
    config: &CrawlerConfig,
) -> Result<IndexedPage, ExtractionReject> {
    let content = extract_main_content(doc, config).ok_or(ExtractionReject::NoBody)?;

    let words = content.split_whitespace().count();
    if words < config.min_words {
        return Err(ExtractionReject::TooShort {
            words,
            min: config.min_words,
        });
    }

    Ok(IndexedPage {
        url: doc.url.to_string(),
        title: extract_title(doc),
        content,
        description: extract_description(doc),
        last_updated: crate::timestamp::now(),
    })
}
