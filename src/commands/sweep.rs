use anyhow::Result;

use crate::config::{Config, Overrides};
use crate::runtime::Runtime;
use crate::sweep::sweep_flagged;

/// Delete the tools and modes flagged for removal.
#[tracing::instrument(skip(runtime, overrides))]
pub fn sweep<R: Runtime + 'static>(runtime: R, overrides: Overrides) -> Result<()> {
    let config = Config::new(runtime, overrides)?;
    let removed = sweep_flagged(config.runtime.as_ref(), &config.sketchbook);

    for path in &removed {
        println!("Deleted {}", path.display());
    }
    if removed.is_empty() {
        println!("Nothing to delete.");
    }
    Ok(())
}
