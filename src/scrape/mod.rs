//! Scrape orchestration: cache consult, pooled browser drive, concurrent
//! extraction, result assembly.
//!
//! `scrape` never returns an error: every failure folds into a
//! `success == false` result with a populated metadata block. Outer
//! concurrency is bounded by a semaphore distinct from the browser pool so
//! cache hits do not contend for browsers.

pub mod types;

pub use types::{PageMetadata, ScrapeData, ScrapeOptions, ScrapeResult};

use crate::browser::{BrowserPool, ContextConfig, LinkCapture, PooledSession};
use crate::cache::{ResultCache, fingerprint};
use crate::error::ScrapeError;
use crate::extract;
use crate::metrics::ScraperMetrics;
use crate::settings::Settings;
use crate::structured::{self, StructuredData};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// What one browser drive produces before post-processing.
struct PageCapture {
    content: String,
    status: u16,
    links: Vec<LinkCapture>,
    screenshot: Option<String>,
}

/// The concurrent scraper. Shared by handle; the crawler holds one.
pub struct Scraper {
    settings: Settings,
    pool: Arc<BrowserPool>,
    cache: Arc<ResultCache>,
    semaphore: Arc<Semaphore>,
    metrics: ScraperMetrics,
}

impl Scraper {
    #[must_use]
    pub fn new(settings: Settings, metrics: ScraperMetrics) -> Self {
        let cache = if settings.cache_enabled {
            ResultCache::new(&settings.redis_url, settings.cache_ttl_secs)
        } else {
            ResultCache::disabled()
        };
        let pool = BrowserPool::new(
            settings.max_browsers,
            metrics.clone(),
            settings.chromium_path.clone(),
        );
        let semaphore = Arc::new(Semaphore::new(settings.concurrent_scrapes.max(1)));
        Self {
            settings,
            pool,
            cache: Arc::new(cache),
            semaphore,
            metrics,
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &ScraperMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Scrape one URL. Failures surface as `success == false`, never as a
    /// panic or error.
    pub async fn scrape(&self, url: &str, options: &ScrapeOptions) -> ScrapeResult {
        self.metrics.incr_requests();

        if let Err(e) = url::Url::parse(url) {
            self.metrics.incr_errors();
            return ScrapeResult::failure(url, format!("invalid URL: {e}"));
        }

        let fp = fingerprint(url, options);
        let use_cache = self.cache.is_enabled() && !options.bypass_cache;

        if use_cache {
            if let Some(data) = self.cache.get(&fp).await {
                debug!("Serving {url} from cache");
                return ScrapeResult {
                    success: true,
                    data,
                    cached: true,
                };
            }
        }

        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.metrics.incr_errors();
                return ScrapeResult::failure(url, "scraper is shut down".to_string());
            }
        };

        let started = Instant::now();
        let outcome = self.scrape_inner(url, options).await;
        self.metrics
            .scrape_duration
            .observe(started.elapsed().as_secs_f64());
        drop(permit);

        match outcome {
            Ok(data) => {
                if use_cache {
                    // Only successful scrapes are worth remembering
                    self.cache.put(&fp, &data, options.cache_ttl_s).await;
                }
                ScrapeResult {
                    success: true,
                    data,
                    cached: false,
                }
            }
            Err(e) => {
                self.metrics.incr_errors();
                warn!("Scrape failed for {url}: {e}");
                ScrapeResult::failure(url, e.to_string())
            }
        }
    }

    async fn scrape_inner(
        &self,
        url: &str,
        options: &ScrapeOptions,
    ) -> Result<ScrapeData, ScrapeError> {
        let capture = self.capture_page(url, options).await?;
        self.process_capture(url, options, capture).await
    }

    /// Drive a pooled browser through navigation and capture. The session is
    /// released on every path.
    async fn capture_page(
        &self,
        url: &str,
        options: &ScrapeOptions,
    ) -> Result<PageCapture, ScrapeError> {
        let config = ContextConfig {
            window_width: options.window_width,
            window_height: options.window_height,
            mobile: options.mobile,
            user_agent: options
                .user_agent
                .clone()
                .or_else(|| self.settings.default_user_agent.clone()),
            extra_headers: options.headers.clone(),
        };

        let session = self.pool.acquire(config).await?;
        let result = self.drive_page(&session, url, options).await;
        self.pool.release(session).await;
        result
    }

    async fn drive_page(
        &self,
        session: &PooledSession,
        url: &str,
        options: &ScrapeOptions,
    ) -> Result<PageCapture, ScrapeError> {
        let timeout = Duration::from_millis(options.timeout_ms.unwrap_or(self.settings.timeout_ms));
        let context = &session.context;

        let status = context.navigate(url, timeout).await?;

        if let Some(selector) = &options.wait_for_selector {
            context
                .wait_for_selector(selector, timeout)
                .await
                .map_err(|_| ScrapeError::NavigationTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })?;
        }

        let content = context
            .page_source()
            .await
            .map_err(|e| ScrapeError::Browser(format!("{e:#}")))?;

        // Links and screenshots never fail a scrape
        let links = context.links().await.unwrap_or_else(|e| {
            warn!("Link capture failed for {url}: {e}");
            Vec::new()
        });

        let screenshot = if options.include_screenshot {
            context
                .screenshot(self.settings.screenshot_quality)
                .await
        } else {
            None
        };

        info!("Captured {url} ({} bytes, status {status})", content.len());
        Ok(PageCapture {
            content,
            status,
            links,
            screenshot,
        })
    }

    /// Run content and structured-data extraction concurrently off the I/O
    /// scheduler, then assemble the result.
    async fn process_capture(
        &self,
        url: &str,
        options: &ScrapeOptions,
        capture: PageCapture,
    ) -> Result<ScrapeData, ScrapeError> {
        let only_main = options.only_main;
        let html_for_content = capture.content.clone();
        let content_task =
            tokio::task::spawn_blocking(move || extract::extract_content(&html_for_content, only_main));

        let html_for_structured = capture.content.clone();
        let structured_task =
            tokio::task::spawn_blocking(move || structured::extract_all(&html_for_structured));

        let (content_result, structured_result) = tokio::join!(content_task, structured_task);

        let content = content_result
            .map_err(|e| ScrapeError::ContentExtraction(format!("extraction task failed: {e}")))?
            .map_err(|e| ScrapeError::ContentExtraction(format!("{e:#}")))?;

        // Structured data degrades to its empty shape, never failing the scrape
        let structured_data: StructuredData = match structured_result {
            Ok(data) => data,
            Err(e) => {
                warn!("Structured-data extraction task failed for {url}: {e}");
                StructuredData::empty()
            }
        };

        let mut metadata = PageMetadata {
            source_url: url.to_string(),
            status_code: capture.status,
            ..PageMetadata::default()
        };
        metadata.absorb(content.metadata);

        Ok(ScrapeData {
            markdown: Some(content.markdown),
            html: Some(content.html),
            raw_html: options.include_raw_html.then_some(capture.content),
            screenshot: capture.screenshot,
            links: Some(dedup_links(capture.links)),
            metadata,
            structured_data: Some(structured_data),
            warning: None,
        })
    }

    /// Shut down the underlying browser pool.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

/// Deduplicate captured links to their hrefs, preserving first-seen order.
fn dedup_links(links: Vec<LinkCapture>) -> Vec<String> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| !link.href.is_empty())
        .filter(|link| seen.insert(link.href.clone()))
        .map(|link| link.href)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(href: &str) -> LinkCapture {
        LinkCapture {
            href: href.to_string(),
            text: String::new(),
            rel: String::new(),
        }
    }

    #[test]
    fn links_dedup_to_href_preserving_order() {
        let links = vec![
            capture("https://x.test/a"),
            capture("https://x.test/b"),
            capture("https://x.test/a"),
            capture(""),
        ];
        assert_eq!(
            dedup_links(links),
            vec!["https://x.test/a".to_string(), "https://x.test/b".to_string()]
        );
    }
}
