//! Bounded pool of reusable headless-browser instances.
//!
//! One mutex guards both the available queue and the active id set; a
//! browser is always in exactly one of available/active until destroyed.
//! Health is checked on every handout and on return; unhealthy instances are
//! quit instead of recycled. Counters feed the shared metrics registry.

use crate::error::ScrapeError;
use crate::metrics::ScraperMetrics;
use anyhow::Result;
use chromiumoxide::Browser;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::context::{BrowserContext, ContextConfig};
use super::launch::launch_browser;

/// Browsers above this JS heap footprint are destroyed instead of reused.
const HEAP_LIMIT_BYTES: u64 = 1024 * 1024 * 1024;

/// Budget for the cheap liveness probe.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// A launched browser with its pool bookkeeping.
pub struct PooledBrowser {
    pub id: u64,
    browser: Browser,
    handler: Option<JoinHandle<()>>,
    user_data_dir: Option<PathBuf>,
    last_used: Instant,
}

impl PooledBrowser {
    fn new(id: u64, browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            id,
            browser,
            handler: Some(handler),
            user_data_dir: Some(user_data_dir),
            last_used: Instant::now(),
        }
    }

    #[must_use]
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Close the browser process and its handler task.
    async fn quit(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser {}: {e}", self.id);
        }
        let _ = self.browser.wait().await;
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        self.remove_profile_dir();
    }

    fn remove_profile_dir(&mut self) {
        if let Some(dir) = self.user_data_dir.take() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                warn!("Failed to remove profile dir {}: {e}", dir.display());
            }
        }
    }
}

impl Drop for PooledBrowser {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        self.remove_profile_dir();
    }
}

/// A checked-out browser plus the context configured on it. Must be returned
/// with [`BrowserPool::release`] on every path.
pub struct PooledSession {
    pub context: BrowserContext,
    browser: PooledBrowser,
}

#[derive(Default)]
struct PoolState {
    available: VecDeque<PooledBrowser>,
    active: HashSet<u64>,
    shutdown: bool,
}

/// Bounded browser pool shared across concurrent scrapes.
pub struct BrowserPool {
    max: usize,
    state: Mutex<PoolState>,
    next_id: AtomicU64,
    metrics: ScraperMetrics,
    chromium_path: Option<PathBuf>,
}

impl BrowserPool {
    #[must_use]
    pub fn new(
        max: usize,
        metrics: ScraperMetrics,
        chromium_path: Option<PathBuf>,
    ) -> Arc<Self> {
        Arc::new(Self {
            max: max.max(1),
            state: Mutex::new(PoolState::default()),
            next_id: AtomicU64::new(0),
            metrics,
            chromium_path,
        })
    }

    /// Check out a browser and configure a fresh context on it.
    ///
    /// Reuses a healthy pooled instance when one is available, launches a new
    /// one while under the cap, and fails with a pool-exhausted error
    /// otherwise.
    pub async fn acquire(&self, config: ContextConfig) -> Result<PooledSession, ScrapeError> {
        loop {
            // The pop and the move to `active` happen in one critical
            // section, so a browser is never in neither set while the cap is
            // checked elsewhere.
            let candidate = {
                let mut state = self.state.lock().await;
                if state.shutdown {
                    return Err(ScrapeError::Browser("pool is shut down".to_string()));
                }
                let popped = state.available.pop_front();
                if let Some(pooled) = &popped {
                    state.active.insert(pooled.id);
                }
                popped
            };

            let Some(mut pooled) = candidate else {
                break;
            };

            if Self::is_browser_healthy(&pooled.browser).await {
                pooled.last_used = Instant::now();
                self.metrics.browser_reuse.fetch_add(1, Ordering::SeqCst);
                debug!("Reusing browser {} from pool", pooled.id);
                return self.hand_out(pooled, config).await;
            }

            warn!("Browser {} failed health check, destroying", pooled.id);
            self.state.lock().await.active.remove(&pooled.id);
            pooled.quit().await;
            self.update_pool_gauge().await;
        }

        // Nothing available: launch while under cap. The slot is reserved in
        // `active` before the (slow) launch so concurrent acquires cannot
        // overshoot the cap.
        let reserved_id = {
            let mut state = self.state.lock().await;
            if state.available.len() + state.active.len() >= self.max {
                return Err(ScrapeError::Browser(format!(
                    "browser pool exhausted ({} active, max {})",
                    state.active.len(),
                    self.max
                )));
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            state.active.insert(id);
            id
        };

        let pooled = match self.launch(reserved_id).await {
            Ok(pooled) => pooled,
            Err(e) => {
                self.state.lock().await.active.remove(&reserved_id);
                self.metrics.browser_failures.fetch_add(1, Ordering::SeqCst);
                return Err(ScrapeError::Browser(format!("failed to launch browser: {e:#}")));
            }
        };
        self.metrics.browser_creation.fetch_add(1, Ordering::SeqCst);
        info!("Launched browser {} for pool", pooled.id);
        self.hand_out(pooled, config).await
    }

    async fn hand_out(
        &self,
        pooled: PooledBrowser,
        config: ContextConfig,
    ) -> Result<PooledSession, ScrapeError> {
        let context = match BrowserContext::attach(&pooled.browser, config, self.metrics.clone())
            .await
        {
            Ok(context) => context,
            Err(e) => {
                self.metrics.browser_failures.fetch_add(1, Ordering::SeqCst);
                self.state.lock().await.active.remove(&pooled.id);
                pooled.quit().await;
                self.update_pool_gauge().await;
                return Err(ScrapeError::Browser(format!(
                    "failed to open browser context: {e:#}"
                )));
            }
        };

        let mut state = self.state.lock().await;
        state.active.insert(pooled.id);
        drop(state);
        self.update_pool_gauge().await;
        Ok(PooledSession {
            context,
            browser: pooled,
        })
    }

    /// Return a session to the pool. The context is cleaned first; the
    /// browser is recycled only when the pool has room and it is healthy.
    pub async fn release(&self, session: PooledSession) {
        let PooledSession {
            context,
            mut browser,
        } = session;
        context.cleanup().await;

        let id = browser.id;
        let mut state = self.state.lock().await;
        state.active.remove(&id);
        let has_room = !state.shutdown && state.available.len() < self.max;
        drop(state);

        if has_room && Self::is_browser_healthy(&browser.browser).await {
            browser.last_used = Instant::now();
            self.state.lock().await.available.push_back(browser);
            debug!("Browser {id} returned to pool");
        } else {
            debug!("Browser {id} not recycled, quitting");
            browser.quit().await;
        }
        self.update_pool_gauge().await;
    }

    /// Quit every pooled instance. Best-effort; quit failures are logged by
    /// the instances themselves. Active browsers quit as they are released.
    pub async fn shutdown(&self) {
        info!("Shutting down browser pool");
        let drained: Vec<PooledBrowser> = {
            let mut state = self.state.lock().await;
            state.shutdown = true;
            state.available.drain(..).collect()
        };
        for pooled in drained {
            pooled.quit().await;
        }
        self.update_pool_gauge().await;
        info!("Browser pool shutdown complete");
    }

    /// Liveness: a cheap CDP call must answer, and the JS heap (when the
    /// probe is possible) must sit under the reuse limit.
    async fn is_browser_healthy(browser: &Browser) -> bool {
        match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, browser.version()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!("Browser health check failed: {e}");
                return false;
            }
            Err(_) => {
                warn!("Browser health check timed out");
                return false;
            }
        }

        // Heap probe is optional; any failure counts as healthy
        if let Ok(Ok(page)) = tokio::time::timeout(
            HEALTH_CHECK_TIMEOUT,
            browser.new_page("about:blank"),
        )
        .await
        {
            let heap = page
                .evaluate("performance.memory ? performance.memory.usedJSHeapSize : 0")
                .await
                .ok()
                .and_then(|v| v.into_value::<u64>().ok())
                .unwrap_or(0);
            let _ = page.close().await;
            if heap > HEAP_LIMIT_BYTES {
                warn!("Browser JS heap at {heap} bytes exceeds reuse limit");
                return false;
            }
        }
        true
    }

    async fn launch(&self, id: u64) -> Result<PooledBrowser> {
        let (browser, handler, user_data_dir) =
            launch_browser(self.chromium_path.as_ref()).await?;
        Ok(PooledBrowser::new(id, browser, handler, user_data_dir))
    }

    async fn update_pool_gauge(&self) {
        let state = self.state.lock().await;
        self.metrics
            .set_pool_size(state.available.len() + state.active.len());
    }

    /// Current (available, active) sizes, for diagnostics and tests.
    pub async fn sizes(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        (state.available.len(), state.active.len())
    }
}
