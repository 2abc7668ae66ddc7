//! Frontier-driven site traversal

use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use url::Url;

use super::config::CrawlerConfig;
use super::content_extraction::extract_page;
use super::error::CrawlError;
use super::fetcher::{FetchedPage, PageFetcher};
use super::frontier::Frontier;
use super::links::{harvest_links, normalize_url, SiteScope};
use super::IndexedPage;

/// What a crawl produced
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    /// Pages that passed extraction
    pub pages: Vec<IndexedPage>,

    /// URLs that were requested, indexed or not
    pub visited: usize,
}

/// Crawls one site at a time with a pool of workers
#[derive(Debug, Clone)]
pub struct Crawler {
    fetcher: PageFetcher,
    config: Arc<CrawlerConfig>,
}

impl Crawler {
    /// Create a crawler with the given configuration
    pub fn new(config: CrawlerConfig) -> Result<Self, CrawlError> {
        Ok(Self {
            fetcher: PageFetcher::new(&config)?,
            config: Arc::new(config),
        })
    }

    /// The configuration the crawler was built with
    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Crawl the site of `seed` and return the extracted pages
    ///
    /// Links are followed from every page that was fetched, including pages
    /// too short to be indexed. Navigation hubs therefore still lead to the
    /// pages behind them, and the crawl reaches more of the site than
    /// following indexed pages only would.
    ///
    /// `max_pages == 0` means no limit. Cancelling the token stops the crawl
    /// at the next frontier pop and returns what was collected so far. The
    /// only error is a seed that cannot be crawled.
    pub async fn crawl(
        &self,
        seed: &str,
        max_pages: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<IndexedPage>, CrawlError> {
        Ok(self.crawl_site(seed, max_pages, cancel).await?.pages)
    }

    /// Like [`Crawler::crawl`], also reporting how many URLs were visited
    #[instrument(skip(self, cancel), fields(workers = self.config.workers))]
    pub async fn crawl_site(
        &self,
        seed: &str,
        max_pages: u32,
        cancel: &CancellationToken,
    ) -> Result<CrawlSummary, CrawlError> {
        let seed_url = normalize_url(Url::parse(seed)?);
        if !matches!(seed_url.scheme(), "http" | "https") {
            return Err(CrawlError::InvalidUrl(format!(
                "{} is not an http(s) URL",
                seed_url
            )));
        }
        let scope = SiteScope::of(&seed_url)?;

        info!(
            "Starting crawl of {} (max pages: {})",
            seed_url,
            if max_pages == 0 {
                "unlimited".to_string()
            } else {
                max_pages.to_string()
            }
        );

        let frontier = Arc::new(Frontier::new(seed_url, max_pages));
        let deadline = self.config.crawl_timeout.map(|timeout| Instant::now() + timeout);
        let cancel = cancel.child_token();

        let mut workers = JoinSet::new();
        for id in 0..self.config.workers.max(1) {
            let worker = Worker {
                id,
                fetcher: self.fetcher.clone(),
                config: self.config.clone(),
                scope: scope.clone(),
                frontier: frontier.clone(),
                cancel: cancel.clone(),
                deadline,
            };
            workers.spawn(worker.run());
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                // A lost worker never releases its slot, so stop the others
                error!(error = %e, "Crawl worker failed");
                cancel.cancel();
            }
        }

        let visited = frontier.visited().await;
        let pages = frontier.take_results().await;
        info!(
            pages = pages.len(),
            visited, "Crawl completed. Found {} pages.", pages.len()
        );

        Ok(CrawlSummary { pages, visited })
    }
}

struct Worker {
    id: usize,
    fetcher: PageFetcher,
    config: Arc<CrawlerConfig>,
    scope: SiteScope,
    frontier: Arc<Frontier>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Worker {
    async fn run(self) {
        let delay = self.config.politeness_delay();

        while let Some(url) = self.frontier.next(&self.cancel, self.deadline).await {
            debug!(worker = self.id, %url, "Visiting");

            let (page, links) = match self.fetcher.fetch(&url).await {
                Some(fetched) => self.process(fetched),
                None => (None, HashSet::new()),
            };
            self.frontier.complete(page, links).await;

            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.cancel.cancelled() => break,
                }
            }
        }
    }

    /// Parse once, then extract and harvest from the same tree
    ///
    /// Links are returned even when extraction rejects the page.
    fn process(&self, fetched: FetchedPage) -> (Option<IndexedPage>, HashSet<Url>) {
        let doc = fetched.into_document();
        let links = harvest_links(&doc, &self.scope, &self.config.skip_extensions);

        let page = match extract_page(&doc, &self.config) {
            Ok(page) => Some(page),
            Err(reject) => {
                debug!(url = %doc.url, %reject, "Page not indexed");
                None
            }
        };

        (page, links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Mock, Server, ServerGuard};
    use std::time::Duration;

    fn crawler(workers: usize) -> Crawler {
        Crawler::new(
            CrawlerConfig::builder()
                .politeness_delay_ms(0)
                .workers(workers)
                .build(),
        )
        .unwrap()
    }

    fn page_html(title: &str, words: usize, links: &[&str]) -> String {
        let text = (0..words)
            .map(|i| format!("palabra{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let anchors: String = links
            .iter()
            .map(|href| format!(r#"<a href="{}">link</a>"#, href))
            .collect();
        format!(
            "<html><head><title>{}</title></head><body><nav>{}</nav><main>{}</main></body></html>",
            title, anchors, text
        )
    }

    async fn serve(server: &mut ServerGuard, path: &str, body: String) -> Mock {
        server
            .mock("GET", path)
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(body)
            .create_async()
            .await
    }

    fn urls(pages: &[IndexedPage], base: &str) -> HashSet<String> {
        pages
            .iter()
            .map(|p| p.url.trim_start_matches(base).to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_crawls_reachable_same_site_pages() {
        let mut server = Server::new_async().await;
        let _a = serve(
            &mut server,
            "/",
            page_html("A", 30, &["/b", "/c", "https://offsite.example.org/d"]),
        )
        .await;
        let _b = serve(&mut server, "/b", page_html("B", 30, &["/", "/c#section"])).await;
        let _c = serve(&mut server, "/c", page_html("C", 30, &["/b"])).await;

        let seed = format!("{}/", server.url());
        let summary = crawler(1)
            .crawl_site(&seed, 0, &CancellationToken::new())
            .await
            .unwrap();

        let expected: HashSet<String> = ["/", "/b", "/c"].into_iter().map(String::from).collect();
        assert_eq!(urls(&summary.pages, &server.url()), expected);
        assert_eq!(summary.visited, 3);
    }

    #[tokio::test]
    async fn test_shared_links_are_fetched_once_with_several_workers() {
        let mut server = Server::new_async().await;
        let graph: [(&str, &[&str]); 5] = [
            ("/", &["/a", "/b", "/c"]),
            ("/a", &["/", "/shared", "/b"]),
            ("/b", &["/", "/shared", "/c"]),
            ("/c", &["/", "/shared#top", "/a"]),
            ("/shared", &["/", "/a", "/b", "/c"]),
        ];
        let mut mocks = Vec::new();
        for (path, links) in graph {
            mocks.push(
                server
                    .mock("GET", path)
                    .with_status(200)
                    .with_header("content-type", "text/html; charset=utf-8")
                    .with_body(page_html(path, 30, links))
                    .expect(1)
                    .create_async()
                    .await,
            );
        }

        let seed = format!("{}/", server.url());
        let summary = crawler(3)
            .crawl_site(&seed, 0, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.pages.len(), 5);
        assert_eq!(summary.visited, 5);
        for mock in &mocks {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_max_pages_is_never_exceeded() {
        let mut server = Server::new_async().await;
        let _root = serve(
            &mut server,
            "/",
            page_html("root", 30, &["/1", "/2", "/3", "/4", "/5"]),
        )
        .await;
        let mut mocks = Vec::new();
        for i in 1..=5 {
            mocks.push(serve(&mut server, &format!("/{}", i), page_html("child", 30, &[])).await);
        }

        let seed = format!("{}/", server.url());
        for workers in [1, 3] {
            let pages = crawler(workers)
                .crawl(&seed, 2, &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(pages.len(), 2, "with {} workers", workers);
        }
    }

    #[tokio::test]
    async fn test_single_page_site() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/solo")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(page_html("Solo", 25, &[]))
            .expect(1)
            .create_async()
            .await;

        let seed = format!("{}/solo", server.url());
        let pages = crawler(1)
            .crawl(&seed, 0, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title, "Solo");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_short_hub_page_is_followed_but_not_indexed() {
        let mut server = Server::new_async().await;
        let _hub = serve(&mut server, "/", page_html("Hub", 5, &["/guide"])).await;
        let _guide = serve(&mut server, "/guide", page_html("Guide", 40, &[])).await;

        let seed = format!("{}/", server.url());
        let summary = crawler(2)
            .crawl_site(&seed, 0, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.pages.len(), 1);
        assert_eq!(summary.pages[0].title, "Guide");
        assert_eq!(summary.visited, 2);
    }

    #[tokio::test]
    async fn test_failed_pages_are_skipped() {
        let mut server = Server::new_async().await;
        let _root = serve(&mut server, "/", page_html("Root", 30, &["/gone", "/ok"])).await;
        let _gone = server
            .mock("GET", "/gone")
            .with_status(500)
            .create_async()
            .await;
        let _ok = serve(&mut server, "/ok", page_html("Ok", 30, &[])).await;

        let seed = format!("{}/", server.url());
        let pages = crawler(1)
            .crawl(&seed, 0, &CancellationToken::new())
            .await
            .unwrap();

        let expected: HashSet<String> = ["/", "/ok"].into_iter().map(String::from).collect();
        assert_eq!(urls(&pages, &server.url()), expected);
    }

    #[tokio::test]
    async fn test_cancelled_crawl_returns_collected_pages() {
        let mut server = Server::new_async().await;
        let _root = serve(&mut server, "/", page_html("Root", 30, &["/next"])).await;
        let _next = serve(&mut server, "/next", page_html("Next", 30, &[])).await;

        let crawler = Crawler::new(
            CrawlerConfig::builder()
                .politeness_delay_ms(60_000)
                .build(),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let seed = format!("{}/", server.url());
        let pages = tokio::time::timeout(Duration::from_secs(10), crawler.crawl(&seed, 0, &cancel))
            .await
            .expect("cancellation should cut the politeness sleep short")
            .unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title, "Root");
    }

    #[tokio::test]
    async fn test_cancelled_before_start_fetches_nothing() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_body(page_html("Root", 30, &[]))
            .expect(0)
            .create_async()
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let pages = crawler(1)
            .crawl(&format!("{}/", server.url()), 0, &cancel)
            .await
            .unwrap();
        assert!(pages.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_seed() {
        let cancel = CancellationToken::new();
        assert!(matches!(
            crawler(1).crawl("not a url", 0, &cancel).await,
            Err(CrawlError::UrlParse(_))
        ));
        assert!(matches!(
            crawler(1).crawl("mailto:someone@example.com", 0, &cancel).await,
            Err(CrawlError::InvalidUrl(_))
        ));
    }
}
