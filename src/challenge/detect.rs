//! Bot-protection detection: score the rendered page against per-family
//! rule sets.
//!
//! Each family contributes +20 per matching CSS selector, +15 per matching
//! source pattern, and Cloudflare alone +25 for a title phrase. The highest
//! family above the threshold wins; below threshold means no challenge.
//! Detection never fails: any internal error reads as "no challenge".

use regex::RegexSet;
use scraper::{Html, Selector};
use std::fmt;
use std::sync::LazyLock;

/// Score contributed by one matching challenge selector.
const SELECTOR_SCORE: u32 = 20;
/// Score contributed by one matching page-source pattern.
const PATTERN_SCORE: u32 = 15;
/// Score contributed by a Cloudflare title phrase.
const TITLE_SCORE: u32 = 25;
/// Minimum confidence for a detection to count.
const DETECTION_THRESHOLD: u32 = 30;

/// Known bot-protection families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionFamily {
    Cloudflare,
    DataDome,
    Incapsula,
    Akamai,
    GenericCaptcha,
}

impl fmt::Display for ProtectionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cloudflare => write!(f, "cloudflare"),
            Self::DataDome => write!(f, "datadome"),
            Self::Incapsula => write!(f, "incapsula"),
            Self::Akamai => write!(f, "akamai"),
            Self::GenericCaptcha => write!(f, "captcha"),
        }
    }
}

/// A positive detection with its scoring evidence.
#[derive(Debug, Clone)]
pub struct Detection {
    pub family: ProtectionFamily,
    pub confidence: u32,
    pub selectors_found: Vec<&'static str>,
    pub text_indicators: Vec<&'static str>,
}

struct FamilyRules {
    family: ProtectionFamily,
    selector_sources: &'static [&'static str],
    selectors: Vec<Selector>,
    pattern_sources: &'static [&'static str],
    patterns: RegexSet,
}

const CLOUDFLARE_SELECTORS: &[&str] = &[
    "#challenge-form",
    "#challenge-running",
    "div[class*='cf-browser-verification']",
    "#cf-challenge-running",
    ".cf-browser-verification",
    "#cf-challenge-stage",
    ".cf-checking-browser",
    ".cf-wrapper",
];

const CLOUDFLARE_PATTERNS: &[&str] = &[
    r"cloudflare",
    r"ray id:",
    r"please wait while we verify",
    r"please enable cookies",
    r"please complete the security check",
    r"checking your browser",
    r"just a moment",
    r"attention required",
    r"cf-browser-verification",
    r"cf-challenge-running",
];

const CLOUDFLARE_TITLE_PHRASES: &[&str] =
    &["just a moment", "attention required", "checking your browser"];

const DATADOME_SELECTORS: &[&str] = &["[class*='datadome']", "[id*='datadome']", ".dd-challenge"];

const DATADOME_PATTERNS: &[&str] = &[
    r"datadome",
    r"blocked by datadome",
    r"captcha.*datadome",
];

const INCAPSULA_SELECTORS: &[&str] = &["[class*='incap']", "[id*='incap']", ".incap-challenge"];

const INCAPSULA_PATTERNS: &[&str] = &[
    r"incapsula",
    r"incap_ses",
    r"visid_incap",
    r"blocked by incapsula",
];

const AKAMAI_PATTERNS: &[&str] = &[r"akamai", r"ak-bmsc", r"akamai.*bot.*manager"];

const CAPTCHA_SELECTORS: &[&str] = &[
    "[class*='captcha']",
    "[class*='challenge']",
    "[class*='verification']",
    "[class*='security-check']",
    "iframe[src*='recaptcha']",
    "iframe[src*='hcaptcha']",
    ".g-recaptcha",
    ".h-captcha",
];

const CAPTCHA_PATTERNS: &[&str] = &[
    r"captcha",
    r"recaptcha",
    r"hcaptcha",
    r"security check",
    r"verify.*human",
];

static RULES: LazyLock<Vec<FamilyRules>> = LazyLock::new(|| {
    let build = |family, selector_sources: &'static [&'static str], pattern_sources| {
        FamilyRules {
            family,
            selector_sources,
            selectors: selector_sources
                .iter()
                .filter_map(|s| Selector::parse(s).ok())
                .collect(),
            pattern_sources,
            patterns: RegexSet::new(
                pattern_sources
                    .iter()
                    .map(|p: &&str| format!("(?i){p}")),
            )
            .expect("BUG: hardcoded challenge patterns are valid"),
        }
    };
    vec![
        build(
            ProtectionFamily::Cloudflare,
            CLOUDFLARE_SELECTORS,
            CLOUDFLARE_PATTERNS,
        ),
        build(
            ProtectionFamily::DataDome,
            DATADOME_SELECTORS,
            DATADOME_PATTERNS,
        ),
        build(
            ProtectionFamily::Incapsula,
            INCAPSULA_SELECTORS,
            INCAPSULA_PATTERNS,
        ),
        build(ProtectionFamily::Akamai, &[], AKAMAI_PATTERNS),
        build(
            ProtectionFamily::GenericCaptcha,
            CAPTCHA_SELECTORS,
            CAPTCHA_PATTERNS,
        ),
    ]
});

/// Inspect a rendered page. Returns the winning family when any scores above
/// the threshold, None otherwise.
#[must_use]
pub fn detect(page_source: &str, title: &str) -> Option<Detection> {
    let document = Html::parse_document(page_source);
    let source_lower = page_source.to_lowercase();
    let title_lower = title.to_lowercase();

    let mut best: Option<Detection> = None;

    for rules in RULES.iter() {
        let mut confidence = 0;
        let mut selectors_found = Vec::new();
        let mut text_indicators = Vec::new();

        for (selector, source) in rules.selectors.iter().zip(rules.selector_sources) {
            if document.select(selector).next().is_some() {
                confidence += SELECTOR_SCORE;
                selectors_found.push(*source);
            }
        }

        for idx in rules.patterns.matches(&source_lower) {
            confidence += PATTERN_SCORE;
            text_indicators.push(rules.pattern_sources[idx]);
        }

        if rules.family == ProtectionFamily::Cloudflare
            && CLOUDFLARE_TITLE_PHRASES
                .iter()
                .any(|phrase| title_lower.contains(phrase))
        {
            confidence += TITLE_SCORE;
            text_indicators.push("title_indicator");
        }

        if confidence > best.as_ref().map_or(0, |d| d.confidence) {
            best = Some(Detection {
                family: rules.family,
                confidence,
                selectors_found,
                text_indicators,
            });
        }
    }

    best.filter(|d| d.confidence > DETECTION_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_page_is_not_a_challenge() {
        let html = "<html><head><title>Shop</title></head><body><h1>Hello</h1></body></html>";
        assert!(detect(html, "Shop").is_none());
    }

    #[test]
    fn cloudflare_interstitial_is_detected() {
        let html = r#"
            <html><body>
                <div id="challenge-running">Checking your browser before accessing</div>
                <p>Performance by Cloudflare. Ray ID: 123abc</p>
            </body></html>
        "#;
        let detection = detect(html, "Just a moment...").expect("detected");
        assert_eq!(detection.family, ProtectionFamily::Cloudflare);
        // selector + several patterns + title phrase
        assert!(detection.confidence > 60);
        assert!(detection.text_indicators.contains(&"title_indicator"));
    }

    #[test]
    fn below_threshold_single_pattern_is_ignored() {
        // A page merely mentioning akamai scores 15 and stays below 30
        let html = "<html><body><p>We use akamai as a CDN.</p></body></html>";
        assert!(detect(html, "Infrastructure notes").is_none());
    }

    #[test]
    fn datadome_block_page_is_detected() {
        let html = r#"
            <html><body>
                <div class="dd-challenge">Blocked by DataDome</div>
                <script src="https://ct.datadome.co/c.js"></script>
            </body></html>
        "#;
        let detection = detect(html, "Access denied").expect("detected");
        assert_eq!(detection.family, ProtectionFamily::DataDome);
    }

    #[test]
    fn generic_captcha_is_detected() {
        let html = r#"
            <html><body>
                <div class="g-recaptcha" data-sitekey="x"></div>
                <p>Please complete the reCAPTCHA security check to verify you are human.</p>
            </body></html>
        "#;
        let detection = detect(html, "Verification").expect("detected");
        assert_eq!(detection.family, ProtectionFamily::GenericCaptcha);
    }

    #[test]
    fn highest_scoring_family_wins() {
        // Both cloudflare and captcha indicators present; cloudflare has the
        // title bonus and more pattern hits
        let html = r#"
            <html><body>
                <div class="cf-wrapper">checking your browser</div>
                <div class="g-recaptcha"></div>
                <p>cloudflare</p>
            </body></html>
        "#;
        let detection = detect(html, "Just a moment...").expect("detected");
        assert_eq!(detection.family, ProtectionFamily::Cloudflare);
    }
}
