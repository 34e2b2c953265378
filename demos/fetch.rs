//! Fetches each URL given on the command line twice and prints cache statistics.
//!
//! ```text
//! TAXOCACHE_PROFILE=development RUST_LOG=taxocache=debug \
//!     cargo run --example fetch -- /api/species/42 /api/lineage/9606
//! ```

use taxocache::{CachingFetcher, FetcherConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let fetcher = CachingFetcher::new(FetcherConfig::from_env()?);

    for url in std::env::args().skip(1) {
        for _ in 0..2 {
            match fetcher.fetch_cached(&url).await {
                Ok(doc) => println!("{url}: {doc}"),
                Err(e) => eprintln!("{url}: {e}"),
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&fetcher.stats())?);
    Ok(())
}
