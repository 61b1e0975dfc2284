use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::browser::{Browser, ScopedSession};
use crate::config::LINK_PLACEHOLDER;
use crate::locators::LISTING_CONTAINER;

/// Load the listing page and return the character page links under the
/// anchor container, in page order. Anchors without an href become `-`.
pub async fn collect_links<B: Browser + ?Sized>(
    browser: &B,
    listing_url: &str,
    settle: Duration,
) -> Result<Vec<String>> {
    info!("Fetching listing page: {}", listing_url);
    let session = ScopedSession::open(browser, listing_url).await?;

    tokio::time::sleep(settle).await;

    let anchors = format!("{}//a", LISTING_CONTAINER);
    let links = match session.hrefs(&anchors).await {
        Ok(hrefs) => hrefs
            .into_iter()
            .map(|href| href.unwrap_or_else(|| LINK_PLACEHOLDER.to_string()))
            .collect(),
        Err(e) => {
            warn!("Link container lookup failed on {}: {:#}", listing_url, e);
            Vec::new()
        }
    };

    if let Err(e) = session.close().await {
        warn!("Closing listing session failed: {:#}", e);
    }

    if links.is_empty() {
        warn!("No character links found under the listing container");
    }
    info!("Character links found: {}", links.len());
    Ok(links)
}
