// CLI entry: one-shot scrape or crawl, JSON result on stdout.
//
// Usage:
//   scrapeforge scrape <url>
//   scrapeforge crawl <url> [--depth N] [--pages N]

use anyhow::Result;
use scrapeforge::{
    CrawlRequest, Crawler, ScrapeOptions, Scraper, ScraperMetrics, Settings,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let (command, url) = match (args.get(1), args.get(2)) {
        (Some(command), Some(url)) => (command.as_str(), url.clone()),
        _ => {
            eprintln!("usage: scrapeforge <scrape|crawl> <url> [--depth N] [--pages N]");
            std::process::exit(2);
        }
    };

    let settings = Settings::from_env();
    let metrics = ScraperMetrics::new();
    let scraper = Arc::new(Scraper::new(settings.clone(), metrics));

    match command {
        "scrape" => {
            let result = scraper.scrape(&url, &ScrapeOptions::default()).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            scraper.shutdown().await;
            if !result.success {
                std::process::exit(1);
            }
        }
        "crawl" => {
            let mut request = CrawlRequest::new(url);
            if let Some(depth) = flag_value(&args, "--depth") {
                request.max_depth = depth;
            }
            if let Some(pages) = flag_value(&args, "--pages") {
                request.max_pages = pages;
            }
            let crawler = Crawler::new(Arc::clone(&scraper), settings.concurrent_scrapes);
            let response = crawler.crawl(request).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            scraper.shutdown().await;
        }
        other => {
            eprintln!("unknown command {other:?}; expected scrape or crawl");
            std::process::exit(2);
        }
    }

    Ok(())
}

fn flag_value<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    let idx = args.iter().position(|a| a == flag)?;
    args.get(idx + 1)?.parse().ok()
}
