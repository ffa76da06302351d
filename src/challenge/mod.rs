//! Bot-protection handling: detect a challenge, drive mitigation, and wait
//! for the page to clear.

pub mod detect;
pub mod mitigate;

pub use detect::{Detection, ProtectionFamily, detect};
pub use mitigate::attempt_mitigation;

use crate::metrics::ScraperMetrics;
use chromiumoxide::Page;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Maximum mitigation attempts per challenge type. A type switch mid-wait
/// resets the budget.
const MAX_MITIGATION_ATTEMPTS: u32 = 5;

/// Drives challenge clearance for one navigation.
#[derive(Debug, Clone)]
pub struct ChallengeGuard {
    metrics: ScraperMetrics,
}

impl ChallengeGuard {
    #[must_use]
    pub fn new(metrics: ScraperMetrics) -> Self {
        Self { metrics }
    }

    /// Read the live page and score it. Any browser error reads as
    /// "no challenge".
    pub async fn detect_on_page(&self, page: &Page) -> Option<Detection> {
        let source = match page.content().await {
            Ok(source) => source,
            Err(e) => {
                debug!("Challenge detection could not read page source: {e}");
                return None;
            }
        };
        let title = page.get_title().await.ok().flatten().unwrap_or_default();
        detect(&source, &title)
    }

    /// Poll until no family scores above the detection threshold or the
    /// timeout lapses. Mitigation runs between polls with a growing interval.
    /// Returns true when the challenge cleared.
    pub async fn wait_for_clearance(&self, page: &Page, timeout: Duration) -> bool {
        let start = Instant::now();
        let mut attempts: u32 = 0;
        let mut last_family: Option<ProtectionFamily> = None;

        while start.elapsed() < timeout {
            let detection = match self.detect_on_page(page).await {
                Some(detection) => detection,
                None => {
                    info!("Challenge cleared after {:?}", start.elapsed());
                    self.metrics
                        .cloudflare_bypass_success
                        .fetch_add(1, Ordering::SeqCst);
                    return true;
                }
            };

            if last_family.is_some() && last_family != Some(detection.family) {
                debug!(
                    "Challenge type changed from {} to {}, resetting attempts",
                    last_family.map(|f| f.to_string()).unwrap_or_default(),
                    detection.family
                );
                attempts = 0;
            }
            last_family = Some(detection.family);

            if attempts < MAX_MITIGATION_ATTEMPTS {
                attempts += 1;
                debug!(
                    "Mitigation attempt {attempts} against {} (confidence {})",
                    detection.family, detection.confidence
                );
                if attempt_mitigation(page, detection.family).await {
                    // Give the widget a moment to register the interaction
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }

            // Poll every 2-5 s, growing with attempts
            let wait_secs = (2.0 + f64::from(attempts) * 0.5).min(5.0);
            tokio::time::sleep(Duration::from_secs_f64(wait_secs)).await;
        }

        warn!("Challenge not cleared within {timeout:?}");
        self.metrics
            .cloudflare_bypass_failure
            .fetch_add(1, Ordering::SeqCst);
        false
    }
}
