//! The URL frontier: a deduplicated FIFO queue with depth tracking and an
//! optional inter-dequeue delay.
//!
//! One mutex guards the whole state so readers observe a consistent
//! snapshot. The seen set is append-only for the life of a crawl: a URL is
//! admitted at most once, ever. Closing the frontier makes every subsequent
//! dequeue return None, which is how crawl cancellation propagates.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// A queued URL with its crawl-tree position.
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: u32,
    pub parent_url: Option<String>,
}

#[derive(Default)]
struct FrontierState {
    queue: VecDeque<FrontierEntry>,
    seen: HashSet<String>,
    in_progress: HashSet<String>,
    depths: HashMap<String, u32>,
    last_dequeue: Option<Instant>,
    closed: bool,
}

/// Per-crawl frontier. Discarded when the crawl terminates.
pub struct UrlFrontier {
    max_depth: u32,
    max_pages: usize,
    rate_limit_delay: Duration,
    state: Mutex<FrontierState>,
}

impl UrlFrontier {
    #[must_use]
    pub fn new(max_depth: u32, max_pages: usize) -> Self {
        Self::with_rate_limit(max_depth, max_pages, Duration::ZERO)
    }

    /// `rate_limit_delay` spaces out dequeues; zero disables pacing.
    #[must_use]
    pub fn with_rate_limit(max_depth: u32, max_pages: usize, rate_limit_delay: Duration) -> Self {
        Self {
            max_depth,
            max_pages,
            rate_limit_delay,
            state: Mutex::new(FrontierState::default()),
        }
    }

    /// Admit a URL. Rejected when already seen, past the depth bound, or the
    /// seen set has reached the page budget. Admission is idempotent:
    /// enqueueing the same URL twice is identical to once.
    pub async fn enqueue(&self, url: &str, depth: u32, parent_url: Option<&str>) -> bool {
        let mut state = self.state.lock().await;
        if state.closed
            || state.seen.contains(url)
            || depth > self.max_depth
            || state.seen.len() >= self.max_pages
        {
            return false;
        }
        state.seen.insert(url.to_string());
        state.depths.insert(url.to_string(), depth);
        state.queue.push_back(FrontierEntry {
            url: url.to_string(),
            depth,
            parent_url: parent_url.map(str::to_string),
        });
        debug!("Frontier admitted {url} at depth {depth}");
        true
    }

    /// Pop the next URL, pacing against the configured delay. None when the
    /// queue is empty or the frontier is closed.
    pub async fn dequeue(&self) -> Option<FrontierEntry> {
        let mut state = self.state.lock().await;
        if state.closed || state.queue.is_empty() {
            return None;
        }

        if self.rate_limit_delay > Duration::ZERO {
            if let Some(last) = state.last_dequeue {
                let since = last.elapsed();
                if since < self.rate_limit_delay {
                    tokio::time::sleep(self.rate_limit_delay - since).await;
                }
            }
        }

        let entry = state.queue.pop_front()?;
        state.in_progress.insert(entry.url.clone());
        state.last_dequeue = Some(Instant::now());
        Some(entry)
    }

    /// Mark a dequeued URL finished (successfully or not).
    pub async fn complete(&self, url: &str) {
        let mut state = self.state.lock().await;
        state.in_progress.remove(url);
    }

    /// The crawl is complete when nothing is queued and nothing is in
    /// flight.
    pub async fn is_done(&self) -> bool {
        let state = self.state.lock().await;
        state.queue.is_empty() && state.in_progress.is_empty()
    }

    /// Close the frontier: all subsequent dequeues return None. In-flight
    /// work is unaffected.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        debug!("Frontier closed");
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Recorded depth for an admitted URL.
    pub async fn depth_of(&self, url: &str) -> Option<u32> {
        self.state.lock().await.depths.get(url).copied()
    }

    /// Size of the append-only seen set.
    pub async fn seen_count(&self) -> usize {
        self.state.lock().await.seen.len()
    }

    /// (queued, in_progress) sizes under one lock, for a consistent view.
    pub async fn sizes(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        (state.queue.len(), state.in_progress.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admission_is_idempotent() {
        let frontier = UrlFrontier::new(3, 100);
        assert!(frontier.enqueue("https://x.test/a", 0, None).await);
        assert!(!frontier.enqueue("https://x.test/a", 0, None).await);
        assert!(!frontier.enqueue("https://x.test/a", 1, None).await);
        assert_eq!(frontier.seen_count().await, 1);
        let (queued, _) = frontier.sizes().await;
        assert_eq!(queued, 1);
    }

    #[tokio::test]
    async fn depth_bound_is_enforced() {
        let frontier = UrlFrontier::new(2, 100);
        assert!(frontier.enqueue("https://x.test/ok", 2, None).await);
        assert!(!frontier.enqueue("https://x.test/deep", 3, None).await);
    }

    #[tokio::test]
    async fn page_budget_bounds_the_seen_set() {
        let frontier = UrlFrontier::new(5, 2);
        assert!(frontier.enqueue("https://x.test/1", 0, None).await);
        assert!(frontier.enqueue("https://x.test/2", 1, None).await);
        assert!(!frontier.enqueue("https://x.test/3", 1, None).await);
        assert_eq!(frontier.seen_count().await, 2);
    }

    #[tokio::test]
    async fn dequeue_moves_to_in_progress_until_complete() {
        let frontier = UrlFrontier::new(3, 100);
        frontier.enqueue("https://x.test/a", 0, None).await;

        let entry = frontier.dequeue().await.expect("entry");
        assert_eq!(entry.url, "https://x.test/a");
        assert!(!frontier.is_done().await);

        frontier.complete(&entry.url).await;
        assert!(frontier.is_done().await);
    }

    #[tokio::test]
    async fn closed_frontier_stops_dequeues() {
        let frontier = UrlFrontier::new(3, 100);
        frontier.enqueue("https://x.test/a", 0, None).await;
        frontier.close().await;
        assert!(frontier.dequeue().await.is_none());
        assert!(!frontier.enqueue("https://x.test/b", 0, None).await);
    }

    #[tokio::test]
    async fn dequeue_respects_rate_limit_delay() {
        let frontier =
            UrlFrontier::with_rate_limit(3, 100, Duration::from_millis(50));
        frontier.enqueue("https://x.test/a", 0, None).await;
        frontier.enqueue("https://x.test/b", 0, None).await;

        let start = Instant::now();
        frontier.dequeue().await.expect("first");
        frontier.dequeue().await.expect("second");
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn parent_and_depth_are_recorded() {
        let frontier = UrlFrontier::new(3, 100);
        frontier
            .enqueue("https://x.test/child", 2, Some("https://x.test/"))
            .await;
        let entry = frontier.dequeue().await.expect("entry");
        assert_eq!(entry.depth, 2);
        assert_eq!(entry.parent_url.as_deref(), Some("https://x.test/"));
        assert_eq!(frontier.depth_of("https://x.test/child").await, Some(2));
    }
}
