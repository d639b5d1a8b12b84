use anyhow::Result;

use crate::config::{Config, Overrides};
use crate::contribution::Contribution;
use crate::runtime::Runtime;

use super::{Session, describe};

/// Print the listed libraries that provide `imports` and are not installed.
#[tracing::instrument(skip(runtime, overrides))]
pub fn suggest<R: Runtime + 'static>(
    runtime: R,
    overrides: Overrides,
    imports: Vec<String>,
) -> Result<()> {
    let config = Config::new(runtime, overrides)?;
    let session = Session::open(config)?;
    let listing = &session.listing;

    let headers: Vec<&str> = imports.iter().map(String::as_str).collect();
    let missing = listing.missing_libraries(&headers);
    if missing.is_empty() {
        println!("Nothing to install.");
        return Ok(());
    }

    println!("Install these libraries to use the imports:");
    for library in missing {
        let c = Contribution::Available(library);
        println!("  {}", describe(listing, &c, false));
    }
    Ok(())
}
