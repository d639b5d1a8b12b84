use anyhow::Result;
use log::debug;

use crate::config::{Config, Overrides};
use crate::installer::is_flagged_for_deletion;
use crate::runtime::Runtime;

use super::{Session, describe};

/// Print the contributions in `category` that match every filter token.
/// With `revision`, contributions that do not run on that host revision are
/// left out.
#[tracing::instrument(skip(runtime, overrides))]
pub fn list<R: Runtime + 'static>(
    runtime: R,
    overrides: Overrides,
    category: Option<String>,
    filters: Vec<String>,
    revision: Option<i64>,
) -> Result<()> {
    let config = Config::new(runtime, overrides)?;
    let session = Session::open(config)?;
    let listing = &session.listing;

    if listing.advertised().is_empty() {
        println!("The contribution listing has not been downloaded yet; run `contribman refresh`.");
    }

    let tokens: Vec<&str> = filters.iter().map(String::as_str).collect();
    let mut found = listing.filtered_list(category.as_deref(), &tokens);
    if let Some(revision) = revision {
        found = listing.compatible_list(found, revision);
    }
    debug!("{} of {} contributions match", found.len(), listing.contributions().len());

    if found.is_empty() {
        println!("No contributions found.");
        return Ok(());
    }

    let runtime = session.config.runtime.as_ref();
    for c in &found {
        let flagged = c
            .as_installed()
            .is_some_and(|i| is_flagged_for_deletion(runtime, i.folder()));
        println!("{}", describe(listing, c, flagged));
    }

    let updates = listing.count_updates();
    if updates > 0 {
        println!("\n{} update(s) available.", updates);
    }
    Ok(())
}
