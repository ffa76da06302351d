//! Site crawler: breadth-first traversal over the frontier, dispatching
//! worker batches against the shared scraper.
//!
//! Per-URL failures are counted, never propagated; the crawl itself fails
//! only when something escapes the driver loop. Cancellation closes the
//! frontier, lets in-flight workers finish, and returns the partial result.

pub mod frontier;
pub mod links;
pub mod types;

pub use frontier::{FrontierEntry, UrlFrontier};
pub use links::LinkExtractor;
pub use types::{CrawlRequest, CrawlResponse, CrawlStats, CrawlStatus, CrawledPage};

use crate::scrape::{ScrapeOptions, Scraper};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Pause when the frontier is empty but workers are still in flight.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Cooperative cancellation flag for a running crawl.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Accumulated crawl output, mutated only under its mutex and never across a
/// scrape call.
struct CrawlAccumulator {
    pages: Vec<CrawledPage>,
    success_count: usize,
    failed_count: usize,
}

/// The crawler. Holds a shared handle to the scraper; one instance serves
/// many crawls.
pub struct Crawler {
    scraper: Arc<Scraper>,
    workers: usize,
}

impl Crawler {
    #[must_use]
    pub fn new(scraper: Arc<Scraper>, workers: usize) -> Self {
        Self {
            scraper,
            workers: workers.max(1),
        }
    }

    /// Run a crawl to completion and return the page set with statistics.
    pub async fn crawl(&self, request: CrawlRequest) -> CrawlResponse {
        self.crawl_with_cancel(request, CancelToken::new()).await
    }

    /// Run a crawl that an external holder of the token can cancel.
    pub async fn crawl_with_cancel(
        &self,
        request: CrawlRequest,
        cancel: CancelToken,
    ) -> CrawlResponse {
        let crawl_id = request.crawl_id;
        let mut stats = CrawlStats::started_now();

        if let Err(e) = request.validate() {
            return failed_response(crawl_id, stats, e.to_string());
        }

        let mut extractor = match LinkExtractor::from_request(&request) {
            Ok(extractor) => extractor,
            Err(e) => return failed_response(crawl_id, stats, e.to_string()),
        };
        extractor.load_robots(&request.url).await;
        let extractor = Arc::new(extractor);

        let frontier = Arc::new(UrlFrontier::new(request.max_depth, request.max_pages));
        let accumulator = Arc::new(Mutex::new(CrawlAccumulator {
            pages: Vec::new(),
            success_count: 0,
            failed_count: 0,
        }));

        info!(
            "Starting crawl {crawl_id} from {} (depth {}, pages {})",
            request.url, request.max_depth, request.max_pages
        );
        frontier.enqueue(&request.url, 0, None).await;

        let mut cancelled = false;
        loop {
            if cancel.is_cancelled() {
                info!("Crawl {crawl_id} cancelled, closing frontier");
                frontier.close().await;
                cancelled = true;
                break;
            }

            let page_count = accumulator.lock().await.pages.len();
            if page_count >= request.max_pages {
                debug!("Crawl {crawl_id} reached page budget");
                break;
            }
            if frontier.is_done().await {
                break;
            }

            let batch_size = self.workers.min(request.max_pages - page_count);
            let mut batch = Vec::with_capacity(batch_size);
            for _ in 0..batch_size {
                match frontier.dequeue().await {
                    Some(entry) => batch.push(entry),
                    None => break,
                }
            }

            if batch.is_empty() {
                let (queued, in_progress) = frontier.sizes().await;
                if queued == 0 && in_progress == 0 {
                    break;
                }
                tokio::time::sleep(IDLE_POLL).await;
                continue;
            }

            let tasks: Vec<_> = batch
                .into_iter()
                .map(|entry| {
                    let scraper = Arc::clone(&self.scraper);
                    let frontier = Arc::clone(&frontier);
                    let extractor = Arc::clone(&extractor);
                    let accumulator = Arc::clone(&accumulator);
                    let max_depth = request.max_depth;
                    tokio::spawn(async move {
                        process_entry(scraper, frontier, extractor, accumulator, entry, max_depth)
                            .await;
                    })
                })
                .collect();

            for join_result in join_all(tasks).await {
                if let Err(e) = join_result {
                    error!("Crawl worker panicked: {e}");
                    accumulator.lock().await.failed_count += 1;
                }
            }
        }

        let accumulator = accumulator.lock().await;
        let seen = frontier.seen_count().await;
        stats.success_count = accumulator.success_count;
        stats.failed_count = accumulator.failed_count;
        // Admitted but never crawled (budget reached or cancelled)
        stats.skipped_count = seen.saturating_sub(stats.success_count + stats.failed_count);
        stats.total_pages = accumulator.pages.len();
        stats.end_time = Some(Utc::now());
        stats.duration_s = stats
            .end_time
            .map(|end| (end - stats.start_time).num_milliseconds() as f64 / 1000.0);

        let status = if cancelled {
            CrawlStatus::Cancelled
        } else {
            CrawlStatus::Completed
        };
        info!(
            "Crawl {crawl_id} {status:?}: {} pages, {} failed, {} skipped",
            stats.total_pages, stats.failed_count, stats.skipped_count
        );

        CrawlResponse {
            crawl_id,
            status,
            pages: accumulator.pages.clone(),
            stats,
            error: None,
        }
    }
}

/// Scrape one frontier entry, record the outcome, and feed discovered links
/// back. The frontier entry is completed on every path.
async fn process_entry(
    scraper: Arc<Scraper>,
    frontier: Arc<UrlFrontier>,
    extractor: Arc<LinkExtractor>,
    accumulator: Arc<Mutex<CrawlAccumulator>>,
    entry: FrontierEntry,
    max_depth: u32,
) {
    debug!("Crawling [depth {}] {}", entry.depth, entry.url);

    let options = ScrapeOptions {
        only_main: true,
        include_raw_html: false,
        include_screenshot: false,
        ..ScrapeOptions::default()
    };

    let result = scraper.scrape(&entry.url, &options).await;

    if result.success {
        // Feed the frontier before appending, so admissions see a consistent
        // pre-append budget
        if entry.depth < max_depth {
            if let Some(html) = result.data.html.as_deref() {
                for link in extractor.extract(html, &entry.url) {
                    frontier
                        .enqueue(&link, entry.depth + 1, Some(&entry.url))
                        .await;
                }
            }
        }

        let page = CrawledPage {
            url: entry.url.clone(),
            markdown: result.data.markdown.unwrap_or_default(),
            structured_data: result.data.structured_data,
            scrape_id: Uuid::new_v4(),
            crawled_at: Utc::now(),
            depth: entry.depth,
            parent_url: entry.parent_url.clone(),
        };

        let mut acc = accumulator.lock().await;
        acc.pages.push(page);
        acc.success_count += 1;
    } else {
        warn!(
            "Crawl page failed: {} ({})",
            entry.url,
            result
                .data
                .metadata
                .error
                .as_deref()
                .unwrap_or("unknown error")
        );
        accumulator.lock().await.failed_count += 1;
    }

    frontier.complete(&entry.url).await;
}

fn failed_response(crawl_id: Uuid, mut stats: CrawlStats, error: String) -> CrawlResponse {
    stats.end_time = Some(Utc::now());
    stats.duration_s = Some(0.0);
    CrawlResponse {
        crawl_id,
        status: CrawlStatus::Failed,
        pages: Vec::new(),
        stats,
        error: Some(error),
    }
}
