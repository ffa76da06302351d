//! Cache fingerprint properties: deterministic, sensitive only to the
//! output-affecting option subset.

use proptest::prelude::*;
use scrapeforge::cache::{cache_key, fingerprint};
use scrapeforge::scrape::types::ScrapeOptions;

#[test]
fn fingerprint_is_stable_across_calls() {
    let options = ScrapeOptions::default();
    let a = fingerprint("https://x.test/a", &options);
    let b = fingerprint("https://x.test/a", &options);
    assert_eq!(a, b);
    // SHA-256 rendered as hex
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn each_output_affecting_option_shifts_the_key() {
    let base = fingerprint("https://x.test/a", &ScrapeOptions::default());

    let variants: Vec<ScrapeOptions> = vec![
        ScrapeOptions {
            only_main: false,
            ..ScrapeOptions::default()
        },
        ScrapeOptions {
            wait_for_selector: Some("#app".to_string()),
            ..ScrapeOptions::default()
        },
        ScrapeOptions {
            mobile: true,
            ..ScrapeOptions::default()
        },
        ScrapeOptions {
            include_screenshot: true,
            ..ScrapeOptions::default()
        },
        ScrapeOptions {
            include_raw_html: true,
            ..ScrapeOptions::default()
        },
    ];

    for options in variants {
        assert_ne!(base, fingerprint("https://x.test/a", &options));
    }
}

#[test]
fn cache_key_shape_is_stable() {
    let fp = fingerprint("https://x.test/a", &ScrapeOptions::default());
    let key = cache_key(&fp);
    assert_eq!(key, format!("scrape:{fp}"));
}

proptest! {
    // Options outside the output-affecting subset must never influence the
    // fingerprint, whatever their values.
    #[test]
    fn irrelevant_options_never_shift_the_fingerprint(
        timeout in proptest::option::of(0u64..600_000),
        ttl in proptest::option::of(0u64..1_000_000),
        header_value in "[a-z0-9]{0,16}",
        window_width in 320u32..4000,
        bypass in any::<bool>(),
    ) {
        let base = fingerprint("https://x.test/a", &ScrapeOptions::default());

        let mut noisy = ScrapeOptions::default();
        noisy.timeout_ms = timeout;
        noisy.cache_ttl_s = ttl;
        noisy.bypass_cache = bypass;
        noisy.window_width = window_width;
        noisy.headers.insert("x-test".to_string(), header_value);

        prop_assert_eq!(base, fingerprint("https://x.test/a", &noisy));
    }

    #[test]
    fn distinct_urls_produce_distinct_fingerprints(
        path_a in "[a-z]{1,12}",
        path_b in "[a-z]{1,12}",
    ) {
        prop_assume!(path_a != path_b);
        let options = ScrapeOptions::default();
        prop_assert_ne!(
            fingerprint(&format!("https://x.test/{path_a}"), &options),
            fingerprint(&format!("https://x.test/{path_b}"), &options)
        );
    }
}
