use anyhow::Result;
use std::sync::Arc;

use crate::config::{Config, Overrides};
use crate::listing::RefreshOutcome;
use crate::runtime::Runtime;

use super::ConsoleProgress;

/// Download the contribution listing into the local cache.
#[tracing::instrument(skip(runtime, overrides))]
pub async fn refresh<R: Runtime + 'static>(runtime: R, overrides: Overrides) -> Result<()> {
    let config = Config::new(runtime, overrides)?;
    let listing = config.listing();

    let outcome = listing
        .refresh(
            config.runtime.as_ref(),
            config.downloader.as_ref(),
            &config.listing_url,
            &config.listing_cache_path(),
            Arc::new(ConsoleProgress::new()),
        )
        .await?;

    if outcome == RefreshOutcome::Loaded {
        println!(
            "Loaded {} contributions from {}",
            listing.advertised().len(),
            config.listing_url
        );
    }
    Ok(())
}
