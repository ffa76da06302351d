//! Error types for scrape and crawl operations.
//!
//! `ScrapeError` is the boundary error: everything that can surface from
//! `Scraper::scrape` or `Crawler::crawl` maps onto one of these variants.
//! Internal layers use `anyhow` with context and convert at the edge.

use thiserror::Error;

/// Failure categories surfaced by the scraping core.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Network/DNS/TLS failure before any response was received.
    #[error("failed to fetch {url}: {reason}")]
    UrlFetch { url: String, reason: String },

    /// The page did not reach a ready state within the navigation budget.
    #[error("navigation timed out after {timeout_ms} ms")]
    NavigationTimeout { timeout_ms: u64 },

    /// A bot-protection challenge stayed in place past its timeout.
    #[error("{family} challenge not cleared within {timeout_secs} s")]
    BotProtectionUnbypassed { family: String, timeout_secs: u64 },

    /// The captured HTML could not be parsed or cleaned.
    #[error("content extraction failed: {0}")]
    ContentExtraction(String),

    /// Pool exhausted, driver crash, or health-check failure during acquire.
    #[error("browser error: {0}")]
    Browser(String),

    /// Caller-side throttling breached (mapped to 429 by the facade).
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Request shape invalid; rejected before reaching the core.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Cache backend unreachable. Always swallowed into a miss by callers.
    #[error("cache backend error: {0}")]
    Cache(String),
}

impl From<anyhow::Error> for ScrapeError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} preserves the full context chain
        Self::Browser(format!("{err:#}"))
    }
}
