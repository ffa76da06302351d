//! One active browser session, scoped to a single scrape.
//!
//! On attach it configures viewport, network interception, service-worker
//! bypass, the stealth script, a per-session user agent, and realistic
//! headers. The context owns its page exclusively; `cleanup()` must run
//! before the underlying browser returns to the pool.

use crate::challenge::ChallengeGuard;
use crate::error::ScrapeError;
use crate::metrics::ScraperMetrics;
use anyhow::{Context, Result};
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    self, EventResponseReceived, Headers, ResourceType, SetExtraHttpHeadersParams,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    self, AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, CaptureScreenshotParams,
    StopLoadingParams,
};
use chromiumoxide::{Browser, Page};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::stealth::{STEALTH_SCRIPT, platform_for, random_user_agent, stealth_headers};

/// Settling delay after the DOM reports ready.
const DOM_SETTLE: Duration = Duration::from_millis(200);

/// How long to wait for the main-document response event after navigation.
const STATUS_EVENT_WAIT: Duration = Duration::from_millis(300);

/// Per-session configuration derived from the scrape request.
#[derive(Debug, Clone, Default)]
pub struct ContextConfig {
    pub window_width: u32,
    pub window_height: u32,
    pub mobile: bool,
    /// Fixed user agent; a random pool entry is used when unset.
    pub user_agent: Option<String>,
    /// Request headers merged over the stealth defaults.
    pub extra_headers: BTreeMap<String, String>,
}

/// Link captured from the rendered page.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkCapture {
    pub href: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub rel: String,
}

const LINKS_SCRIPT: &str = r"
    (() => {
        return Array.from(document.getElementsByTagName('a'))
            .filter(a => a.href)
            .map(a => ({
                href: a.href,
                text: (a.textContent || '').trim(),
                rel: a.rel || ''
            }));
    })()
";

const DOM_READY_SCRIPT: &str = r"
    document.readyState === 'interactive' || document.readyState === 'complete'
";

/// An exclusive browser session for the duration of one scrape.
pub struct BrowserContext {
    page: Page,
    user_agent: String,
    challenge: ChallengeGuard,
    metrics: ScraperMetrics,
}

impl BrowserContext {
    /// Open a fresh page on the given browser and apply the full session
    /// setup.
    pub async fn attach(
        browser: &Browser,
        config: ContextConfig,
        metrics: ScraperMetrics,
    ) -> Result<Self> {
        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open page")?;

        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| random_user_agent().to_string());

        let context = Self {
            page,
            user_agent,
            challenge: ChallengeGuard::new(metrics.clone()),
            metrics,
        };
        context.configure(&config).await?;
        Ok(context)
    }

    async fn configure(&self, config: &ContextConfig) -> Result<()> {
        debug!("Configuring browser context");

        self.page
            .execute(
                SetDeviceMetricsOverrideParams::builder()
                    .width(i64::from(config.window_width.max(320)))
                    .height(i64::from(config.window_height.max(240)))
                    .device_scale_factor(1.0)
                    .mobile(config.mobile)
                    .build()
                    .map_err(|e| anyhow::anyhow!("device metrics params: {e}"))?,
            )
            .await
            .context("failed to set window size")?;

        self.page
            .execute(network::EnableParams::default())
            .await
            .context("failed to enable network events")?;
        self.page
            .execute(page::EnableParams::default())
            .await
            .context("failed to enable page events")?;
        self.page
            .execute(network::SetBypassServiceWorkerParams::new(true))
            .await
            .context("failed to bypass service workers")?;

        // Stealth must be installed before any navigation so it runs ahead of
        // page scripts
        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams {
                source: STEALTH_SCRIPT.to_string(),
                include_command_line_api: None,
                world_name: None,
                run_immediately: None,
            })
            .await
            .context("failed to install stealth script")?;

        let platform = platform_for(&self.user_agent);
        self.page
            .execute(SetUserAgentOverrideParams {
                user_agent: self.user_agent.clone(),
                accept_language: Some("en-US,en;q=0.9".to_string()),
                platform: Some(platform.to_string()),
                user_agent_metadata: None,
            })
            .await
            .context("failed to override user agent")?;
        info!("Session user agent set ({platform})");

        let mut headers = stealth_headers();
        if let Some(map) = headers.as_object_mut() {
            for (name, value) in &config.extra_headers {
                map.insert(name.clone(), serde_json::Value::String(value.clone()));
            }
        }
        self.page
            .execute(SetExtraHttpHeadersParams::new(Headers::new(headers)))
            .await
            .context("failed to set request headers")?;

        Ok(())
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Navigate and settle. Handles the bot-protection flow and the one
    /// timeout retry with a doubled budget. Returns the main-document status
    /// code (200 when the response event was not observed).
    pub async fn navigate(&self, url: &str, timeout: Duration) -> Result<u16, ScrapeError> {
        let mut events = match self
            .page
            .event_listener::<EventResponseReceived>()
            .await
        {
            Ok(events) => Some(events),
            Err(e) => {
                debug!("Response event listener unavailable: {e}");
                None
            }
        };

        let load_start = Instant::now();
        match self.navigate_once(url, timeout).await {
            Ok(()) => {}
            Err(ScrapeError::NavigationTimeout { .. }) => {
                warn!("Navigation to {url} timed out, retrying with doubled timeout");
                let _ = self.page.execute(StopLoadingParams::default()).await;
                self.navigate_once(url, timeout * 2).await?;
            }
            Err(e) => return Err(e),
        }
        self.metrics
            .page_load_duration
            .observe(load_start.elapsed().as_secs_f64());

        // Bot-protection flow before trusting the DOM
        if let Some(detection) = self.challenge.detect_on_page(&self.page).await {
            info!(
                "Detected {} challenge with confidence {}",
                detection.family, detection.confidence
            );
            self.metrics
                .cloudflare_challenges
                .fetch_add(1, Ordering::SeqCst);
            let family = detection.family;
            if !self.challenge.wait_for_clearance(&self.page, timeout).await {
                return Err(ScrapeError::BotProtectionUnbypassed {
                    family: family.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
        }

        self.await_dom_ready(timeout).await;

        let status = match events.as_mut() {
            Some(events) => self.main_document_status(events, url).await,
            None => None,
        };
        Ok(status.unwrap_or(200))
    }

    async fn navigate_once(&self, url: &str, timeout: Duration) -> Result<(), ScrapeError> {
        let navigation = async {
            self.page
                .goto(url)
                .await
                .map_err(|e| ScrapeError::UrlFetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| ScrapeError::UrlFetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            Ok(())
        };
        match tokio::time::timeout(timeout, navigation).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::NavigationTimeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Poll the DOM ready state, then give late scripts a short settle.
    async fn await_dom_ready(&self, budget: Duration) {
        let deadline = Instant::now() + budget.min(Duration::from_secs(10));
        loop {
            match self.page.evaluate(DOM_READY_SCRIPT).await {
                Ok(result) => {
                    if result.into_value::<bool>().unwrap_or(false) {
                        break;
                    }
                }
                Err(e) => {
                    debug!("DOM ready probe failed: {e}");
                    break;
                }
            }
            if Instant::now() >= deadline {
                debug!("DOM did not reach ready state within budget");
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(DOM_SETTLE).await;
    }

    /// Scan buffered response events for the main document's status code.
    async fn main_document_status(
        &self,
        events: &mut chromiumoxide::listeners::EventStream<EventResponseReceived>,
        url: &str,
    ) -> Option<u16> {
        use futures::StreamExt;
        let scan = async {
            while let Some(event) = events.next().await {
                if event.r#type != ResourceType::Document {
                    continue;
                }
                if urls_match(&event.response.url, url) {
                    return Some(event.response.status as u16);
                }
            }
            None
        };
        tokio::time::timeout(STATUS_EVENT_WAIT, scan).await.ok()?
    }

    /// Wait until the selector is present in the document.
    pub async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(anyhow::anyhow!(
                    "selector {selector:?} did not appear within {timeout:?}"
                ));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Page source with a short retry ladder for transient read failures.
    pub async fn page_source(&self) -> Result<String> {
        let mut last_err = None;
        for attempt in 1..=3u32 {
            match self.page.content().await {
                Ok(source) => {
                    debug!("Page source retrieved, {} bytes", source.len());
                    return Ok(source);
                }
                Err(e) => {
                    warn!("Page source attempt {attempt} failed: {e}");
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
        Err(anyhow::anyhow!(
            "failed to read page source after 3 attempts: {}",
            last_err.map(|e| e.to_string()).unwrap_or_default()
        ))
    }

    /// Every anchor on the page as `{href, text, rel}`.
    pub async fn links(&self) -> Result<Vec<LinkCapture>> {
        let result = self
            .page
            .evaluate(LINKS_SCRIPT)
            .await
            .context("failed to run link extraction script")?;
        let links: Vec<LinkCapture> = result
            .into_value()
            .context("failed to parse extracted links")?;
        Ok(links)
    }

    /// Base64 screenshot, or None on any failure (screenshots never fail a
    /// scrape).
    pub async fn screenshot(&self, quality: u8) -> Option<String> {
        let params = CaptureScreenshotParams {
            format: Some(CaptureScreenshotFormat::Png),
            quality: Some(i64::from(quality.clamp(1, 100))),
            capture_beyond_viewport: Some(false),
            ..Default::default()
        };
        match self.page.screenshot(params).await {
            Ok(bytes) => {
                debug!("Screenshot captured, {} bytes", bytes.len());
                Some(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Err(e) => {
                warn!("Screenshot failed: {e}");
                None
            }
        }
    }

    /// Reset session state before the browser returns to the pool: cookies,
    /// web storage, and a blank page. Errors are logged, never raised.
    pub async fn cleanup(&self) {
        if let Err(e) = self
            .page
            .execute(network::ClearBrowserCookiesParams::default())
            .await
        {
            warn!("Cookie cleanup failed: {e}");
        }
        if let Err(e) = self
            .page
            .evaluate("window.localStorage.clear(); window.sessionStorage.clear();")
            .await
        {
            warn!("Storage cleanup failed: {e}");
        }
        if let Err(e) = self.page.goto("about:blank").await {
            warn!("Blank-page cleanup failed: {e}");
        }
        if let Err(e) = self.page.clone().close().await {
            warn!("Page close failed: {e}");
        }
    }
}

/// Loose URL equality for matching the navigation target against response
/// events: scheme/host/path, ignoring fragments and trailing slashes.
fn urls_match(a: &str, b: &str) -> bool {
    let norm = |raw: &str| -> Option<(String, String, String)> {
        let parsed = url::Url::parse(raw).ok()?;
        Some((
            parsed.scheme().to_string(),
            parsed.host_str()?.to_lowercase(),
            parsed.path().trim_end_matches('/').to_string(),
        ))
    };
    match (norm(a), norm(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_match_ignores_fragment_and_trailing_slash() {
        assert!(urls_match(
            "https://x.test/page/",
            "https://x.test/page#section"
        ));
        assert!(!urls_match("https://x.test/a", "https://x.test/b"));
        assert!(!urls_match("https://x.test/a", "https://y.test/a"));
    }
}
