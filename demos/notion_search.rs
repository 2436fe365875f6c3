//! Searches a Notion proxy and prints the titles it finds.
//!
//! ```text
//! RGATE__BASE_URL=https://study.example.com/api/notion \
//! RUST_LOG=rgate=debug \
//! cargo run --example notion_search -- "cell biology"
//! ```
//!
//! Running the search twice concurrently shows the second caller joining the
//! first one's in-flight request.

use rgate::notion::{NotionClient, PageIcon, page_icon, page_title, retry_policy};
use rgate::transport::{LoggerTransport, ReqwestTransport};
use rgate::{Gateway, GatewayConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(true))
        .init();

    let query = std::env::args().nth(1).unwrap_or_default();
    let config = GatewayConfig::load()?.with_retry(retry_policy());
    let transport = LoggerTransport::new(ReqwestTransport::new()?);
    let notion = NotionClient::new(Gateway::with_transport(config, transport));

    let (first, _second) = tokio::join!(
        notion.search_pages(&query, Default::default()),
        notion.search_pages(&query, Default::default()),
    );

    let listing = match first {
        Ok(listing) => listing,
        Err(err) => {
            eprintln!("search failed: {}", err.user_message());
            return Err(err.into());
        }
    };

    for page in &listing.results {
        let icon = match page_icon(page) {
            Some(PageIcon::Emoji(emoji)) => emoji,
            Some(PageIcon::Url(_)) => "🖼".to_owned(),
            None => " ".to_owned(),
        };
        println!("{icon} {}", page_title(&page["properties"]));
    }
    if listing.has_more {
        println!("… more results after cursor {:?}", listing.next_cursor);
    }
    println!("{:?}", notion.gateway().stats());
    Ok(())
}
