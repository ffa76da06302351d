//! Challenge detection scoring against realistic interstitial fixtures.

use scrapeforge::challenge::{ProtectionFamily, detect};

const CLOUDFLARE_INTERSTITIAL: &str = r#"
<html>
<head><title>Just a moment...</title></head>
<body class="no-js">
    <div class="cf-wrapper">
        <div id="cf-challenge-running">
            <noscript>Please enable cookies.</noscript>
            <form id="challenge-form" action="/?__cf_chl_f_tk=token" method="POST"></form>
        </div>
    </div>
    <div class="footer">
        Performance &amp; security by Cloudflare. Ray ID: 84aef3
        <p>Checking your browser before accessing the site.</p>
    </div>
</body>
</html>
"#;

#[test]
fn cloudflare_interstitial_scores_well_above_threshold() {
    let detection = detect(CLOUDFLARE_INTERSTITIAL, "Just a moment...").expect("detected");
    assert_eq!(detection.family, ProtectionFamily::Cloudflare);
    // Multiple selectors, multiple patterns, and the title bonus
    assert!(detection.confidence >= 75, "confidence {}", detection.confidence);
    assert!(!detection.selectors_found.is_empty());
    assert!(detection.text_indicators.contains(&"title_indicator"));
}

#[test]
fn resolved_page_after_challenge_scores_clean() {
    // The page the challenge transitions into: normal content
    let resolved = "<html><head><title>Hello</title></head><body><h1>Hello</h1></body></html>";
    assert!(detect(resolved, "Hello").is_none());
}

#[test]
fn incapsula_markers_are_recognized() {
    let html = r#"
        <html><body>
            <div id="incap_challenge">Request blocked by Incapsula</div>
            <script>var visid_incap_123 = 'x';</script>
        </body></html>
    "#;
    let detection = detect(html, "").expect("detected");
    assert_eq!(detection.family, ProtectionFamily::Incapsula);
}

#[test]
fn akamai_needs_multiple_text_hits() {
    // Akamai has no selectors; a single pattern (15) stays below threshold,
    // several clear it
    let weak = "<html><body><p>served via akamai</p></body></html>";
    assert!(detect(weak, "").is_none());

    let strong = r"
        <html><body>
            <p>akamai bot manager denied this request</p>
            <script>document.cookie = 'ak-bmsc=...';</script>
        </body></html>
    ";
    let detection = detect(strong, "").expect("detected");
    assert_eq!(detection.family, ProtectionFamily::Akamai);
}

#[test]
fn title_alone_is_not_enough() {
    // +25 from the title phrase stays below the threshold of 30
    let html = "<html><body><p>ordinary content</p></body></html>";
    assert!(detect(html, "Just a moment...").is_none());
}

#[test]
fn detection_is_case_insensitive() {
    let html = r#"
        <html><body>
            <div>CHECKING YOUR BROWSER</div>
            <p>JUST A MOMENT</p>
            <p>CLOUDFLARE</p>
        </body></html>
    "#;
    // Pattern matching is case-insensitive on the source text
    let detection = detect(html, "");
    assert!(detection.is_some());
    assert_eq!(detection.expect("detected").family, ProtectionFamily::Cloudflare);
}
