//! Request and response shapes for site crawls.

use crate::error::ScrapeError;
use crate::structured::StructuredData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bounds accepted for crawl depth.
pub const MAX_DEPTH_LIMIT: u32 = 10;
/// Bounds accepted for page count.
pub const MAX_PAGES_LIMIT: usize = 1000;

/// A crawl request: seed URL plus traversal rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub url: String,
    /// 1-10.
    pub max_depth: u32,
    /// 1-1000.
    pub max_pages: usize,
    /// Regex patterns that re-admit URLs; empty means everything same-domain.
    #[serde(default)]
    pub include_patterns: Vec<String>,
    /// Regex patterns that reject URLs.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default = "default_true")]
    pub respect_robots: bool,
    #[serde(default = "Uuid::new_v4")]
    pub crawl_id: Uuid,
}

fn default_true() -> bool {
    true
}

impl CrawlRequest {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_depth: 2,
            max_pages: 10,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            respect_robots: true,
            crawl_id: Uuid::new_v4(),
        }
    }

    /// Boundary validation. Anything invalid here never reaches the crawl
    /// loop.
    pub fn validate(&self) -> Result<(), ScrapeError> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| ScrapeError::Validation(format!("invalid seed URL: {e}")))?;
        if parsed.host_str().is_none() {
            return Err(ScrapeError::Validation("seed URL has no host".to_string()));
        }
        if !(1..=MAX_DEPTH_LIMIT).contains(&self.max_depth) {
            return Err(ScrapeError::Validation(format!(
                "max_depth must be between 1 and {MAX_DEPTH_LIMIT}"
            )));
        }
        if !(1..=MAX_PAGES_LIMIT).contains(&self.max_pages) {
            return Err(ScrapeError::Validation(format!(
                "max_pages must be between 1 and {MAX_PAGES_LIMIT}"
            )));
        }
        for pattern in self.include_patterns.iter().chain(&self.exclude_patterns) {
            regex::Regex::new(pattern)
                .map_err(|e| ScrapeError::Validation(format!("bad pattern {pattern:?}: {e}")))?;
        }
        Ok(())
    }
}

/// Lifecycle of one crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// One successfully scraped page within a crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawledPage {
    pub url: String,
    pub markdown: String,
    pub structured_data: Option<StructuredData>,
    pub scrape_id: Uuid,
    pub crawled_at: DateTime<Utc>,
    pub depth: u32,
    pub parent_url: Option<String>,
}

/// Aggregate crawl accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlStats {
    pub total_pages: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_s: Option<f64>,
}

impl CrawlStats {
    #[must_use]
    pub fn started_now() -> Self {
        Self {
            total_pages: 0,
            success_count: 0,
            failed_count: 0,
            skipped_count: 0,
            start_time: Utc::now(),
            end_time: None,
            duration_s: None,
        }
    }
}

/// Final product of a crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResponse {
    pub crawl_id: Uuid,
    pub status: CrawlStatus,
    pub pages: Vec<CrawledPage>,
    pub stats: CrawlStats,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_request_validates() {
        assert!(CrawlRequest::new("https://site.test/").validate().is_ok());
    }

    #[test]
    fn depth_and_pages_bounds_are_enforced() {
        let mut request = CrawlRequest::new("https://site.test/");
        request.max_depth = 0;
        assert!(request.validate().is_err());
        request.max_depth = 11;
        assert!(request.validate().is_err());
        request.max_depth = 2;
        request.max_pages = 0;
        assert!(request.validate().is_err());
        request.max_pages = 1001;
        assert!(request.validate().is_err());
    }

    #[test]
    fn bad_seed_and_bad_patterns_are_rejected() {
        assert!(CrawlRequest::new("not a url").validate().is_err());
        let mut request = CrawlRequest::new("https://site.test/");
        request.exclude_patterns = vec!["[unclosed".to_string()];
        assert!(request.validate().is_err());
    }
}
