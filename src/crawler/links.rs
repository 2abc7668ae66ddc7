//! Same-site link discovery

use std::collections::HashSet;

use scraper::Selector;
use url::Url;

use super::fetcher::ParsedDocument;
use super::CrawlError;

/// The authority a crawl is confined to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteScope {
    host: String,
    port: Option<u16>,
}

impl SiteScope {
    /// Scope of the site `url` belongs to
    pub fn of(url: &Url) -> Result<Self, CrawlError> {
        let host = url
            .host_str()
            .ok_or_else(|| CrawlError::InvalidUrl(format!("{} has no host", url)))?;
        Ok(Self {
            host: host.to_ascii_lowercase(),
            port: url.port_or_known_default(),
        })
    }

    /// Whether `url` is served by the same host and port
    pub fn contains(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.host))
            && url.port_or_known_default() == self.port
    }
}

/// Strip the fragment so `page#a` and `page#b` are one frontier entry
pub fn normalize_url(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

fn has_skipped_extension(url: &Url, skip_extensions: &[String]) -> bool {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    match last.rsplit_once('.') {
        Some((_, ext)) => skip_extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Collect crawlable links from a page
///
/// Every `a[href]` is resolved against the page's base URL. Links leaving
/// `scope`, using a scheme other than http(s), or pointing at a file with
/// one of `skip_extensions` are dropped. Hrefs that fail to resolve are
/// ignored.
pub fn harvest_links(
    doc: &ParsedDocument,
    scope: &SiteScope,
    skip_extensions: &[String],
) -> HashSet<Url> {
    let Ok(anchors) = Selector::parse("a[href]") else {
        return HashSet::new();
    };

    doc.html
        .select(&anchors)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| doc.base_url.join(href.trim()).ok())
        .map(normalize_url)
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .filter(|url| scope.contains(url))
        .filter(|url| !has_skipped_extension(url, skip_extensions))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlerConfig;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn harvest(page_url: &str, markup: &str) -> HashSet<String> {
        let page = url(page_url);
        let scope = SiteScope::of(&page).unwrap();
        let doc = ParsedDocument::from_markup(page, markup);
        harvest_links(&doc, &scope, &CrawlerConfig::default().skip_extensions)
            .into_iter()
            .map(|u| u.to_string())
            .collect()
    }

    #[test]
    fn test_relative_links_resolve_against_page() {
        let links = harvest(
            "https://docs.example.com/guide/intro.html",
            r#"<a href="setup.html">s</a><a href="/api/">a</a><a href="../faq#q1">f</a>"#,
        );
        let expected: HashSet<String> = [
            "https://docs.example.com/guide/setup.html",
            "https://docs.example.com/api/",
            "https://docs.example.com/faq",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(links, expected);
    }

    #[test]
    fn test_offsite_and_non_http_links_are_dropped() {
        let links = harvest(
            "https://docs.example.com/",
            r#"
            <a href="https://other.example.org/page">x</a>
            <a href="https://docs.example.com:8443/page">port</a>
            <a href="mailto:team@example.com">m</a>
            <a href="javascript:void(0)">j</a>
            <a href="ftp://docs.example.com/file">f</a>
            <a href="HTTPS://DOCS.EXAMPLE.COM/kept">k</a>
            "#,
        );
        assert_eq!(links.len(), 1);
        assert!(links.contains("https://docs.example.com/kept"));
    }

    #[test]
    fn test_non_document_extensions_are_skipped() {
        let links = harvest(
            "https://docs.example.com/",
            r#"
            <a href="manual.pdf">p</a>
            <a href="logo.PNG">i</a>
            <a href="release.tar.gz">t</a>
            <a href="setup.exe">e</a>
            <a href="v1.2/index.html">kept</a>
            <a href="pdf/overview">kept too</a>
            "#,
        );
        let expected: HashSet<String> = [
            "https://docs.example.com/v1.2/index.html",
            "https://docs.example.com/pdf/overview",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(links, expected);
    }

    #[test]
    fn test_fragments_collapse_to_one_link() {
        let links = harvest(
            "https://docs.example.com/",
            r##"<a href="page#one">1</a><a href="page#two">2</a><a href="#top">top</a>"##,
        );
        let expected: HashSet<String> = ["https://docs.example.com/page", "https://docs.example.com/"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(links, expected);
    }

    #[test]
    fn test_scope_uses_effective_port() {
        let scope = SiteScope::of(&url("http://127.0.0.1:4000/")).unwrap();
        assert!(scope.contains(&url("http://127.0.0.1:4000/a")));
        assert!(!scope.contains(&url("http://127.0.0.1:4001/a")));

        let default_port = SiteScope::of(&url("https://example.com/")).unwrap();
        assert!(default_port.contains(&url("https://example.com:443/a")));
        assert!(default_port.contains(&url("https://EXAMPLE.com/b")));
    }

    #[test]
    fn test_scope_requires_host() {
        assert!(SiteScope::of(&url("data:text/plain,hello")).is_err());
    }
}
