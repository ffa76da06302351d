//! Mitigation strategies against a live challenge page.
//!
//! Strategies run in order and are strictly best-effort: every browser error
//! is swallowed, so a failed attempt leaves the page no worse than before.
//! Turnstile widgets frequently complete on their own, which is why passive
//! waiting is a strategy of its own.

use super::detect::ProtectionFamily;
use chromiumoxide::Page;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info};

const IFRAME_SELECTORS: &[&str] = &[
    "iframe[title*='challenge']",
    "iframe[src*='challenge']",
    "iframe[src*='cloudflare']",
    "iframe[src*='cf-challenge']",
];

const CHECKBOX_SELECTORS: &[&str] = &[
    "input[type='checkbox']",
    ".cf-turnstile",
    "[class*='checkbox']",
    "#challenge-form input",
];

const TURNSTILE_SELECTORS: &[&str] = &[".cf-turnstile", "[data-sitekey]"];

/// Run the mitigation ladder once for the detected family. Returns true when
/// at least one strategy executed.
pub async fn attempt_mitigation(page: &Page, family: ProtectionFamily) -> bool {
    match family {
        ProtectionFamily::GenericCaptcha => mitigate_captcha(page).await,
        _ => mitigate_interstitial(page).await,
    }
}

/// Cloudflare-style interstitials: try the embedded frame, then the top
/// frame, then passive Turnstile wait, then a light human gesture.
async fn mitigate_interstitial(page: &Page) -> bool {
    let mut acted = false;

    // Challenge widgets usually live in an embedded frame; clicking the frame
    // element lands on the widget's checkbox region
    for selector in IFRAME_SELECTORS {
        if let Ok(frame) = page.find_element(*selector).await {
            human_delay().await;
            if frame.click().await.is_ok() {
                info!("Clicked challenge frame: {selector}");
                acted = true;
                break;
            }
        }
    }

    for selector in CHECKBOX_SELECTORS {
        if let Ok(checkbox) = page.find_element(*selector).await {
            human_delay().await;
            if checkbox.click().await.is_ok() {
                info!("Clicked challenge checkbox: {selector}");
                acted = true;
                break;
            }
        }
    }

    // Turnstile normally resolves itself; give it room
    for selector in TURNSTILE_SELECTORS {
        if page.find_element(*selector).await.is_ok() {
            debug!("Turnstile widget present, waiting for auto-completion");
            tokio::time::sleep(Duration::from_secs(3)).await;
            acted = true;
            break;
        }
    }

    if simulate_human_behavior(page).await {
        acted = true;
    }

    acted
}

/// Explicit CAPTCHAs cannot be solved here; wait briefly in case the widget
/// clears itself (grace pass, pre-solved cookie).
async fn mitigate_captcha(page: &Page) -> bool {
    for selector in &[".g-recaptcha", "iframe[src*='recaptcha']", ".h-captcha", "iframe[src*='hcaptcha']"] {
        if page.find_element(*selector).await.is_ok() {
            debug!("CAPTCHA widget present, passive wait");
            tokio::time::sleep(Duration::from_secs(5)).await;
            return true;
        }
    }
    false
}

/// Small random scroll down and back.
async fn simulate_human_behavior(page: &Page) -> bool {
    let offset: u32 = rand::rng().random_range(20..100);
    let scroll = format!("window.scrollTo(0, {offset});");
    if page.evaluate(scroll.as_str()).await.is_err() {
        return false;
    }
    let millis = rand::rng().random_range(500..1000);
    tokio::time::sleep(Duration::from_millis(millis)).await;
    page.evaluate("window.scrollTo(0, 0);").await.is_ok()
}

/// Randomized pre-click delay in the 0.5-1.5 s band.
async fn human_delay() {
    let millis = rand::rng().random_range(500..1500);
    tokio::time::sleep(Duration::from_millis(millis)).await;
}
