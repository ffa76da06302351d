//! Headless-browser plumbing: discovery and launch, per-scrape contexts,
//! stealth configuration, and the shared instance pool.

pub mod context;
pub mod launch;
pub mod pool;
pub mod stealth;

pub use context::{BrowserContext, ContextConfig, LinkCapture};
pub use launch::{download_managed_browser, find_browser_executable, launch_browser};
pub use pool::{BrowserPool, PooledSession};
pub use stealth::{STEALTH_SCRIPT, USER_AGENTS, platform_for, random_user_agent};
