//! Environment-driven runtime settings.
//!
//! Every knob has a default; malformed values fall back with a warning so a
//! bad environment never prevents startup.

use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Cache backend URI, e.g. `redis://127.0.0.1:6379`.
    pub redis_url: String,
    /// Whether scrape results are cached at all.
    pub cache_enabled: bool,
    /// Default TTL for cached scrape results, in seconds.
    pub cache_ttl_secs: u64,
    /// Upper bound on concurrently executing scrapes (semaphore size).
    pub concurrent_scrapes: usize,
    /// Default per-navigation timeout, in milliseconds.
    pub timeout_ms: u64,
    /// Retry budget for transient failures.
    pub max_retries: u32,
    /// Upper bound on live browser instances in the pool.
    pub max_browsers: usize,
    /// Optional fixed user agent; when unset one is drawn per session from
    /// the built-in pool.
    pub default_user_agent: Option<String>,
    /// JPEG screenshot quality (1-100).
    pub screenshot_quality: u8,
    /// Optional Chromium executable override.
    pub chromium_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            cache_enabled: true,
            cache_ttl_secs: 86_400,
            concurrent_scrapes: 10,
            timeout_ms: 30_000,
            max_retries: 3,
            max_browsers: 10,
            default_user_agent: None,
            screenshot_quality: 80,
            chromium_path: None,
        }
    }
}

impl Settings {
    /// Build settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let concurrent_scrapes = env_parse("CONCURRENT_SCRAPES", defaults.concurrent_scrapes);
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            cache_enabled: env_parse("CACHE_ENABLED", defaults.cache_enabled),
            cache_ttl_secs: env_parse("CACHE_TTL", defaults.cache_ttl_secs),
            concurrent_scrapes,
            timeout_ms: env_parse("TIMEOUT", defaults.timeout_ms),
            max_retries: env_parse("MAX_RETRIES", defaults.max_retries),
            // Pool defaults to the scrape concurrency so cache misses never
            // queue behind an artificially small pool.
            max_browsers: env_parse("MAX_BROWSERS", concurrent_scrapes),
            default_user_agent: std::env::var("DEFAULT_USER_AGENT").ok(),
            screenshot_quality: env_parse("SCREENSHOT_QUALITY", defaults.screenshot_quality),
            chromium_path: std::env::var("CHROMIUM_PATH").ok().map(PathBuf::from),
        }
    }
}

/// Parse an environment variable, falling back to `default` when the variable
/// is absent or does not parse.
fn env_parse<T: FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring malformed {name}={raw:?}, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let s = Settings::default();
        assert!(s.cache_enabled);
        assert_eq!(s.cache_ttl_secs, 86_400);
        assert_eq!(s.concurrent_scrapes, 10);
        assert_eq!(s.timeout_ms, 30_000);
        assert_eq!(s.max_retries, 3);
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        // SAFETY: test-only env mutation, no concurrent readers of this var
        unsafe { std::env::set_var("SCRAPEFORGE_TEST_GARBAGE", "not-a-number") };
        let v: u64 = env_parse("SCRAPEFORGE_TEST_GARBAGE", 42);
        assert_eq!(v, 42);
        unsafe { std::env::remove_var("SCRAPEFORGE_TEST_GARBAGE") };
    }
}
