use anyhow::{Result, bail};

use crate::config::{Config, Overrides};
use crate::contribution::ContributionType;
use crate::runtime::Runtime;

use super::Session;

/// Cancel the pending removal of a tool or mode.
#[tracing::instrument(skip(runtime, overrides))]
pub fn restore<R: Runtime + 'static>(
    runtime: R,
    overrides: Overrides,
    name: &str,
    kind: Option<ContributionType>,
) -> Result<()> {
    let config = Config::new(runtime, overrides)?;
    let session = Session::open(config)?;
    let contribution = session.resolve(name, kind)?;
    let installer = session.installer();

    if !installer.is_flagged_for_deletion(&contribution) {
        bail!("{} is not pending removal", contribution.key());
    }
    installer.remove_flag_for_deletion(&contribution)?;
    println!("{} will be kept.", contribution.key());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::DELETION_FLAG;
    use crate::runtime::RealRuntime;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_restore_clears_flag() {
        let dir = tempdir().unwrap();
        let tool = dir.path().join("sketchbook/tools/Bar");
        fs::create_dir_all(&tool).unwrap();
        fs::write(tool.join("tool.properties"), "name=Bar\n").unwrap();
        fs::write(tool.join(DELETION_FLAG), "").unwrap();

        let overrides = Overrides {
            sketchbook: Some(dir.path().join("sketchbook")),
            settings_dir: Some(dir.path().join("settings")),
            listing_url: None,
        };
        restore(RealRuntime, overrides.clone(), "Bar", None).unwrap();

        assert!(!tool.join(DELETION_FLAG).exists());
        assert!(tool.join("tool.properties").exists());
        // Nothing left to restore
        assert!(restore(RealRuntime, overrides, "Bar", None).is_err());
    }
}
