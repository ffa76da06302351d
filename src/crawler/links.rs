//! Outbound-link extraction and filtering for crawls.
//!
//! Links are resolved against the page URL, stripped of fragment and query,
//! and admitted only when they stay on the seed's domain, clear the
//! exclude/include pattern gauntlet, and (when enabled) are allowed by the
//! site's robots.txt. A missing or unfetchable robots.txt means no
//! restrictions.

use crate::crawler::types::CrawlRequest;
use crate::error::ScrapeError;
use regex::Regex;
use robotstxt::DefaultMatcher;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[href]").expect("BUG: hardcoded CSS selector 'a[href]' is invalid")
});

/// Budget for the one-shot robots.txt fetch.
const ROBOTS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-crawl link filter, configured once from the request.
pub struct LinkExtractor {
    base_domain: String,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    respect_robots: bool,
    /// Raw robots.txt body; None when disabled or the fetch failed.
    robots_body: Option<String>,
}

impl LinkExtractor {
    /// Build the filter from a validated request. Pattern compilation errors
    /// surface as validation failures.
    pub fn from_request(request: &CrawlRequest) -> Result<Self, ScrapeError> {
        let seed = url::Url::parse(&request.url)
            .map_err(|e| ScrapeError::Validation(format!("invalid seed URL: {e}")))?;
        let base_domain = seed
            .host_str()
            .ok_or_else(|| ScrapeError::Validation("seed URL has no host".to_string()))?
            .to_lowercase();

        let compile = |patterns: &[String]| -> Result<Vec<Regex>, ScrapeError> {
            patterns
                .iter()
                .map(|p| {
                    Regex::new(p)
                        .map_err(|e| ScrapeError::Validation(format!("bad pattern {p:?}: {e}")))
                })
                .collect()
        };

        Ok(Self {
            base_domain,
            include: compile(&request.include_patterns)?,
            exclude: compile(&request.exclude_patterns)?,
            respect_robots: request.respect_robots,
            robots_body: None,
        })
    }

    /// Fetch `<scheme>://<host>/robots.txt` once. Best-effort: any failure
    /// leaves the crawl unrestricted.
    pub async fn load_robots(&mut self, seed_url: &str) {
        if !self.respect_robots {
            return;
        }
        let Ok(seed) = url::Url::parse(seed_url) else {
            return;
        };
        let Ok(robots_url) = seed.join("/robots.txt").map(String::from) else {
            return;
        };

        let client = match reqwest::Client::builder()
            .timeout(ROBOTS_FETCH_TIMEOUT)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to build robots.txt client: {e}");
                return;
            }
        };

        match client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    debug!("Loaded robots.txt from {robots_url} ({} bytes)", body.len());
                    self.robots_body = Some(body);
                }
                Err(e) => warn!("Failed to read robots.txt body: {e}"),
            },
            Ok(response) => {
                debug!("robots.txt at {robots_url} returned {}", response.status());
            }
            Err(e) => warn!("Failed to fetch {robots_url}: {e}"),
        }
    }

    /// Inject a robots.txt body directly (tests, pre-fetched content).
    pub fn set_robots_body(&mut self, body: impl Into<String>) {
        self.robots_body = Some(body.into());
    }

    /// Extract admissible outbound links from rendered HTML.
    #[must_use]
    pub fn extract(&self, html: &str, base_url: &str) -> BTreeSet<String> {
        let Ok(base) = url::Url::parse(base_url) else {
            warn!("Cannot resolve links against invalid base URL {base_url}");
            return BTreeSet::new();
        };

        let document = Html::parse_document(html);
        let mut admitted = BTreeSet::new();

        for anchor in document.select(&ANCHOR_SELECTOR) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(normalized) = normalize_link(&base, href) else {
                continue;
            };
            if self.should_admit(&normalized) {
                admitted.insert(normalized);
            }
        }
        admitted
    }

    /// Filter one normalized URL: same domain, not excluded, included when
    /// include patterns exist, and robots-allowed.
    #[must_use]
    pub fn should_admit(&self, url: &str) -> bool {
        let Ok(parsed) = url::Url::parse(url) else {
            return false;
        };
        let host_matches = parsed
            .host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.base_domain));
        if !host_matches {
            return false;
        }

        if self.exclude.iter().any(|pattern| pattern.is_match(url)) {
            return false;
        }

        if !self.include.is_empty() && !self.include.iter().any(|pattern| pattern.is_match(url)) {
            return false;
        }

        self.allowed_by_robots(url)
    }

    fn allowed_by_robots(&self, url: &str) -> bool {
        if !self.respect_robots {
            return true;
        }
        match &self.robots_body {
            Some(body) => DefaultMatcher::default().one_agent_allowed_by_robots(body, "*", url),
            None => true,
        }
    }
}

/// Resolve a raw href against its page and strip fragment/query. Non-HTTP
/// schemes and unparseable hrefs are dropped.
fn normalize_link(base: &url::Url, href: &str) -> Option<String> {
    let mut resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    resolved.set_query(None);
    Some(resolved.to_string())
}
