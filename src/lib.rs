pub mod browser;
pub mod cache;
pub mod challenge;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod scrape;
pub mod settings;
pub mod structured;

pub use browser::{BrowserContext, BrowserPool, ContextConfig};
pub use cache::{ResultCache, fingerprint};
pub use challenge::{ChallengeGuard, ProtectionFamily};
pub use crawler::{
    CancelToken, CrawlRequest, CrawlResponse, CrawlStats, CrawlStatus, CrawledPage, Crawler,
    LinkExtractor, UrlFrontier,
};
pub use error::ScrapeError;
pub use extract::{ExtractedContent, extract_content};
pub use metrics::{MetricsSnapshot, ScraperMetrics};
pub use scrape::{PageMetadata, ScrapeData, ScrapeOptions, ScrapeResult, Scraper};
pub use settings::Settings;
pub use structured::StructuredData;
