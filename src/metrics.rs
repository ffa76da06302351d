//! Process-wide operational metrics using lock-free atomic counters.
//!
//! The registry is created once at startup and shared by handle; metric names
//! in [`MetricsSnapshot::render_prometheus`] are a contract for operators and
//! must not change. Snapshot reads use `SeqCst` so the rendered exposition is
//! coherent across fields.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Upper bounds (seconds) for duration histogram buckets, plus +Inf.
const DURATION_BUCKETS: [f64; 9] = [0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Fixed-bucket histogram backed by atomics.
#[derive(Debug)]
pub struct AtomicHistogram {
    buckets: [AtomicU64; DURATION_BUCKETS.len()],
    count: AtomicU64,
    /// Sum in microseconds to keep the accumulator integral.
    sum_micros: AtomicU64,
}

impl AtomicHistogram {
    fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            count: AtomicU64::new(0),
            sum_micros: AtomicU64::new(0),
        }
    }

    /// Record one observation, in seconds.
    pub fn observe(&self, seconds: f64) {
        for (i, bound) in DURATION_BUCKETS.iter().enumerate() {
            if seconds <= *bound {
                self.buckets[i].fetch_add(1, Ordering::SeqCst);
            }
        }
        self.count.fetch_add(1, Ordering::SeqCst);
        self.sum_micros
            .fetch_add((seconds * 1_000_000.0) as u64, Ordering::SeqCst);
    }

    fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            buckets: std::array::from_fn(|i| self.buckets[i].load(Ordering::SeqCst)),
            count: self.count.load(Ordering::SeqCst),
            sum_seconds: self.sum_micros.load(Ordering::SeqCst) as f64 / 1_000_000.0,
        }
    }
}

/// Point-in-time copy of a histogram.
#[derive(Debug, Clone, Copy)]
pub struct HistogramSnapshot {
    pub buckets: [u64; DURATION_BUCKETS.len()],
    pub count: u64,
    pub sum_seconds: f64,
}

/// Registry of every metric the scraping core emits.
///
/// Cheap to clone; all fields are shared.
#[derive(Debug, Clone)]
pub struct ScraperMetrics {
    pub scrape_requests: Arc<AtomicU64>,
    pub scrape_errors: Arc<AtomicU64>,
    pub scrape_duration: Arc<AtomicHistogram>,
    pub browser_pool_size: Arc<AtomicUsize>,
    pub browser_creation: Arc<AtomicU64>,
    pub browser_reuse: Arc<AtomicU64>,
    pub browser_failures: Arc<AtomicU64>,
    pub cloudflare_challenges: Arc<AtomicU64>,
    pub cloudflare_bypass_success: Arc<AtomicU64>,
    pub cloudflare_bypass_failure: Arc<AtomicU64>,
    pub page_load_duration: Arc<AtomicHistogram>,
}

impl ScraperMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scrape_requests: Arc::new(AtomicU64::new(0)),
            scrape_errors: Arc::new(AtomicU64::new(0)),
            scrape_duration: Arc::new(AtomicHistogram::new()),
            browser_pool_size: Arc::new(AtomicUsize::new(0)),
            browser_creation: Arc::new(AtomicU64::new(0)),
            browser_reuse: Arc::new(AtomicU64::new(0)),
            browser_failures: Arc::new(AtomicU64::new(0)),
            cloudflare_challenges: Arc::new(AtomicU64::new(0)),
            cloudflare_bypass_success: Arc::new(AtomicU64::new(0)),
            cloudflare_bypass_failure: Arc::new(AtomicU64::new(0)),
            page_load_duration: Arc::new(AtomicHistogram::new()),
        }
    }

    pub fn incr_requests(&self) {
        self.scrape_requests.fetch_add(1, Ordering::SeqCst);
    }

    pub fn incr_errors(&self) {
        self.scrape_errors.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_pool_size(&self, size: usize) {
        self.browser_pool_size.store(size, Ordering::SeqCst);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            scrape_requests: self.scrape_requests.load(Ordering::SeqCst),
            scrape_errors: self.scrape_errors.load(Ordering::SeqCst),
            scrape_duration: self.scrape_duration.snapshot(),
            browser_pool_size: self.browser_pool_size.load(Ordering::SeqCst),
            browser_creation: self.browser_creation.load(Ordering::SeqCst),
            browser_reuse: self.browser_reuse.load(Ordering::SeqCst),
            browser_failures: self.browser_failures.load(Ordering::SeqCst),
            cloudflare_challenges: self.cloudflare_challenges.load(Ordering::SeqCst),
            cloudflare_bypass_success: self.cloudflare_bypass_success.load(Ordering::SeqCst),
            cloudflare_bypass_failure: self.cloudflare_bypass_failure.load(Ordering::SeqCst),
            page_load_duration: self.page_load_duration.snapshot(),
        }
    }
}

impl Default for ScraperMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Coherent point-in-time view of all metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub scrape_requests: u64,
    pub scrape_errors: u64,
    pub scrape_duration: HistogramSnapshot,
    pub browser_pool_size: usize,
    pub browser_creation: u64,
    pub browser_reuse: u64,
    pub browser_failures: u64,
    pub cloudflare_challenges: u64,
    pub cloudflare_bypass_success: u64,
    pub cloudflare_bypass_failure: u64,
    pub page_load_duration: HistogramSnapshot,
}

impl MetricsSnapshot {
    /// Render in Prometheus text exposition format for an external facade to
    /// serve. The metric names here are the operator contract.
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let mut out = String::with_capacity(2048);
        render_counter(&mut out, "scraper_requests_total", self.scrape_requests);
        render_counter(&mut out, "scraper_errors_total", self.scrape_errors);
        render_histogram(&mut out, "scraper_duration_seconds", &self.scrape_duration);
        render_gauge(&mut out, "browser_pool_size", self.browser_pool_size as u64);
        render_counter(&mut out, "browser_creation_total", self.browser_creation);
        render_counter(&mut out, "browser_reuse_total", self.browser_reuse);
        render_counter(&mut out, "browser_failures_total", self.browser_failures);
        render_counter(
            &mut out,
            "cloudflare_challenges_total",
            self.cloudflare_challenges,
        );
        render_counter(
            &mut out,
            "cloudflare_bypass_success_total",
            self.cloudflare_bypass_success,
        );
        render_counter(
            &mut out,
            "cloudflare_bypass_failure_total",
            self.cloudflare_bypass_failure,
        );
        render_histogram(
            &mut out,
            "page_load_duration_seconds",
            &self.page_load_duration,
        );
        out
    }
}

fn render_counter(out: &mut String, name: &str, value: u64) {
    out.push_str(&format!("# TYPE {name} counter\n{name} {value}\n"));
}

fn render_gauge(out: &mut String, name: &str, value: u64) {
    out.push_str(&format!("# TYPE {name} gauge\n{name} {value}\n"));
}

fn render_histogram(out: &mut String, name: &str, h: &HistogramSnapshot) {
    out.push_str(&format!("# TYPE {name} histogram\n"));
    for (i, bound) in DURATION_BUCKETS.iter().enumerate() {
        out.push_str(&format!(
            "{name}_bucket{{le=\"{bound}\"}} {}\n",
            h.buckets[i]
        ));
    }
    out.push_str(&format!("{name}_bucket{{le=\"+Inf\"}} {}\n", h.count));
    out.push_str(&format!("{name}_sum {}\n", h.sum_seconds));
    out.push_str(&format!("{name}_count {}\n", h.count));
}
