//! Shared state of one crawl: the queue, what has been seen, and the results

use std::collections::{HashSet, VecDeque};

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::IndexedPage;

#[derive(Debug)]
struct CrawlState {
    queue: VecDeque<Url>,
    queued: HashSet<Url>,
    visited: HashSet<Url>,
    results: Vec<IndexedPage>,
    in_flight: usize,
    max_pages: usize,
}

impl CrawlState {
    fn budget_full(&self) -> bool {
        self.max_pages > 0 && self.results.len() >= self.max_pages
    }

    /// A request may start without the budget being overshot
    fn has_slot(&self) -> bool {
        self.max_pages == 0 || self.results.len() + self.in_flight < self.max_pages
    }

    fn pop_unvisited(&mut self) -> Option<Url> {
        while let Some(url) = self.queue.pop_front() {
            self.queued.remove(&url);
            if self.visited.insert(url.clone()) {
                return Some(url);
            }
        }
        None
    }
}

/// FIFO frontier shared by the workers of a crawl
///
/// Popping a URL marks it visited and reserves one slot of the page budget
/// until [`Frontier::complete`] releases it.
#[derive(Debug)]
pub(crate) struct Frontier {
    state: Mutex<CrawlState>,
    changed: Notify,
}

impl Frontier {
    pub(crate) fn new(seed: Url, max_pages: u32) -> Self {
        let mut queue = VecDeque::new();
        let mut queued = HashSet::new();
        queued.insert(seed.clone());
        queue.push_back(seed);

        Self {
            state: Mutex::new(CrawlState {
                queue,
                queued,
                visited: HashSet::new(),
                results: Vec::new(),
                in_flight: 0,
                max_pages: max_pages as usize,
            }),
            changed: Notify::new(),
        }
    }

    /// Wait for the next URL to fetch
    ///
    /// Returns `None` once the crawl is over: the token was cancelled, the
    /// deadline passed, the budget is full, or the queue is empty with no
    /// request left in flight that could refill it.
    pub(crate) async fn next(
        &self,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Option<Url> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d) {
                    return None;
                }
                if state.budget_full() {
                    return None;
                }
                if state.has_slot() {
                    if let Some(url) = state.pop_unvisited() {
                        state.in_flight += 1;
                        return Some(url);
                    }
                }
                if state.in_flight == 0 {
                    return None;
                }
            }

            let expired = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return None,
                _ = expired => return None,
            }
        }
    }

    /// Release the slot taken by [`Frontier::next`]
    ///
    /// `page` is the extraction result, if any. `links` are merged into the
    /// queue unless the budget is already full.
    pub(crate) async fn complete(&self, page: Option<IndexedPage>, links: HashSet<Url>) {
        {
            let mut state = self.state.lock().await;
            state.in_flight = state.in_flight.saturating_sub(1);

            if let Some(page) = page {
                if !state.budget_full() {
                    state.results.push(page);
                }
            }

            if !state.budget_full() {
                for link in links {
                    if !state.visited.contains(&link) && state.queued.insert(link.clone()) {
                        state.queue.push_back(link);
                    }
                }
            }
        }
        self.changed.notify_waiters();
    }

    /// Number of URLs handed out so far
    pub(crate) async fn visited(&self) -> usize {
        self.state.lock().await.visited.len()
    }

    /// Take the pages collected so far
    pub(crate) async fn take_results(&self) -> Vec<IndexedPage> {
        std::mem::take(&mut self.state.lock().await.results)
    }
}
