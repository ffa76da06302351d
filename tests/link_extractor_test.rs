//! Link filtering end-to-end, including a live robots.txt fetch against a
//! local mock server.

use scrapeforge::crawler::{CrawlRequest, LinkExtractor};

fn request_for(url: &str) -> CrawlRequest {
    let mut request = CrawlRequest::new(url);
    request.respect_robots = false;
    request
}

#[test]
fn depth_one_site_with_exclude_pattern() {
    // The shape of the depth-1 crawl scenario: seed page links to /a, /b and
    // /api/x; the API path is excluded.
    let mut request = request_for("https://site.test/");
    request.exclude_patterns = vec!["/api/.*".to_string()];
    let extractor = LinkExtractor::from_request(&request).expect("valid");

    let html = r#"
        <html><body>
            <a href="/a">A</a>
            <a href="/b">B</a>
            <a href="/api/x">API</a>
            <a href="https://elsewhere.test/c">External</a>
        </body></html>
    "#;
    let links = extractor.extract(html, "https://site.test/");
    assert_eq!(links.len(), 2);
    assert!(links.contains("https://site.test/a"));
    assert!(links.contains("https://site.test/b"));
}

#[test]
fn query_params_and_fragments_are_normalized_away() {
    let extractor = LinkExtractor::from_request(&request_for("https://site.test/")).expect("valid");
    let links = extractor.extract(
        r#"<a href="/page?utm=1#top">P</a><a href="/page">P2</a>"#,
        "https://site.test/",
    );
    // Both anchors collapse to the same normalized URL
    assert_eq!(links.len(), 1);
    assert!(links.contains("https://site.test/page"));
}

#[tokio::test]
async fn robots_txt_is_fetched_and_enforced() {
    let mut server = mockito::Server::new_async().await;
    let robots = server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body("User-agent: *\nDisallow: /private/\n")
        .create_async()
        .await;

    let seed = format!("{}/", server.url());
    let mut request = CrawlRequest::new(&seed);
    request.respect_robots = true;

    let mut extractor = LinkExtractor::from_request(&request).expect("valid");
    extractor.load_robots(&seed).await;
    robots.assert_async().await;

    assert!(!extractor.should_admit(&format!("{}/private/page", server.url())));
    assert!(extractor.should_admit(&format!("{}/public", server.url())));
}

#[tokio::test]
async fn missing_robots_txt_means_unrestricted() {
    let mut server = mockito::Server::new_async().await;
    let robots = server
        .mock("GET", "/robots.txt")
        .with_status(404)
        .create_async()
        .await;

    let seed = format!("{}/", server.url());
    let mut request = CrawlRequest::new(&seed);
    request.respect_robots = true;

    let mut extractor = LinkExtractor::from_request(&request).expect("valid");
    extractor.load_robots(&seed).await;
    robots.assert_async().await;

    assert!(extractor.should_admit(&format!("{}/anything", server.url())));
}
