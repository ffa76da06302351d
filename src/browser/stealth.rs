//! Anti-detection surface: user-agent pool, realistic headers, and the
//! stealth script installed on every new document.
//!
//! The script masks the usual automation tells (webdriver flag, empty plugin
//! list, permissions API shape, missing `window.chrome`, screen metrics,
//! timezone) and perturbs canvas fingerprinting with sub-pixel noise.

use rand::prelude::IndexedRandom;

/// Modern desktop user agents, drawn uniformly at random per session.
pub const USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    // Chrome on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    // Chrome on Linux
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:119.0) Gecko/20100101 Firefox/119.0",
    // Firefox on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:120.0) Gecko/20100101 Firefox/120.0",
    // Safari on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Safari/605.1.15",
];

/// Pick a user agent for a new session.
#[must_use]
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Derive the CDP `platform` field from a user-agent string.
#[must_use]
pub fn platform_for(user_agent: &str) -> &'static str {
    let ua = user_agent.to_lowercase();
    if ua.contains("windows") {
        "Windows"
    } else if ua.contains("macintosh") || ua.contains("mac os x") {
        "Mac"
    } else if ua.contains("android") {
        "Android"
    } else if ua.contains("iphone") || ua.contains("ipad") {
        "iOS"
    } else if ua.contains("linux") {
        "Linux"
    } else {
        "Windows"
    }
}

/// Baseline request headers sent with every navigation. Request-level headers
/// from the caller are merged over these.
#[must_use]
pub fn stealth_headers() -> serde_json::Value {
    serde_json::json!({
        "accept": "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
        "accept-language": "en-US,en;q=0.9",
        "sec-ch-ua": "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\"",
        "sec-ch-ua-mobile": "?0",
        "sec-ch-ua-platform": "\"Windows\"",
        "sec-fetch-dest": "document",
        "sec-fetch-mode": "navigate",
        "sec-fetch-site": "none",
        "sec-fetch-user": "?1",
        "upgrade-insecure-requests": "1",
        "cache-control": "no-cache",
        "pragma": "no-cache",
    })
}

/// Script installed with `Page.addScriptToEvaluateOnNewDocument` so it runs
/// before any page script on every navigation.
pub const STEALTH_SCRIPT: &str = r#"
    // Remove the webdriver flag
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined
    });

    // Realistic plugin list
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ]
    });

    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en']
    });

    // Permissions API: notifications reflect the real permission state
    const originalQuery = window.navigator.permissions.query;
    window.navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission })
            : originalQuery(parameters)
    );

    // A believable window.chrome
    window.chrome = {
        runtime: {
            onConnect: undefined,
            onMessage: undefined
        },
        app: {
            isInstalled: false,
            InstallState: { DISABLED: 'disabled', INSTALLED: 'installed', NOT_INSTALLED: 'not_installed' },
            RunningState: { CANNOT_RUN: 'cannot_run', READY_TO_RUN: 'ready_to_run', RUNNING: 'running' }
        }
    };

    // Hide driver-injected document properties
    const automationProperties = [
        '__webdriver_evaluate', '__selenium_evaluate', '__webdriver_script_function',
        '__webdriver_script_func', '__webdriver_script_fn', '__fxdriver_evaluate',
        '__driver_unwrapped', '__webdriver_unwrapped', '__driver_evaluate',
        '__selenium_unwrapped', '__fxdriver_unwrapped', '__webdriver_script_args',
        '__webdriver_script_result', '__webdriver_script_error'
    ];
    automationProperties.forEach(prop => {
        Object.defineProperty(document, prop, {
            get: () => undefined,
            set: () => undefined
        });
    });

    // Desktop-shaped screen metrics
    Object.defineProperty(screen, 'availHeight', { get: () => 1040 });
    Object.defineProperty(screen, 'availWidth', { get: () => 1920 });
    Object.defineProperty(screen, 'colorDepth', { get: () => 24 });
    Object.defineProperty(screen, 'height', { get: () => 1080 });
    Object.defineProperty(screen, 'width', { get: () => 1920 });

    // Stable timezone
    Object.defineProperty(Intl.DateTimeFormat.prototype, 'resolvedOptions', {
        value: function() {
            return { timeZone: 'America/New_York' };
        }
    });

    // Sub-pixel canvas noise defeats canvas fingerprinting without visibly
    // altering rendering
    const getContext = HTMLCanvasElement.prototype.getContext;
    HTMLCanvasElement.prototype.getContext = function(type) {
        if (type === '2d') {
            const context = getContext.call(this, type);
            const originalFillText = context.fillText;
            context.fillText = function() {
                const args = Array.from(arguments);
                if (args.length >= 3) {
                    args[1] += Math.random() * 0.1;
                    args[2] += Math.random() * 0.1;
                }
                return originalFillText.apply(this, args);
            };
            return context;
        }
        return getContext.call(this, type);
    };
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_is_populated_with_real_agents() {
        assert!(!USER_AGENTS.is_empty());
        assert!(USER_AGENTS.iter().all(|ua| ua.starts_with("Mozilla/5.0")));
    }

    #[test]
    fn random_agent_comes_from_the_pool() {
        let ua = random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
    }

    #[test]
    fn platform_derivation_covers_the_pool() {
        assert_eq!(
            platform_for("Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0"),
            "Windows"
        );
        assert_eq!(
            platform_for("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) Safari/605.1.15"),
            "Mac"
        );
        assert_eq!(platform_for("Mozilla/5.0 (X11; Linux x86_64)"), "Linux");
        assert_eq!(platform_for("completely unknown"), "Windows");
    }

    #[test]
    fn headers_include_fetch_metadata() {
        let headers = stealth_headers();
        assert!(headers.get("sec-fetch-mode").is_some());
        assert!(headers.get("accept-language").is_some());
    }
}
