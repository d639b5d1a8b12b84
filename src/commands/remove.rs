use anyhow::{Result, bail};
use std::sync::Arc;

use crate::config::{Config, Overrides};
use crate::contribution::ContributionType;
use crate::runtime::Runtime;

use super::{ConsoleProgress, Session, check_outcome, run_task};

/// Remove the installed contribution called `name`. Tools and modes are
/// flagged and deleted by the next `sweep`.
#[tracing::instrument(skip(runtime, overrides))]
pub async fn remove<R: Runtime + 'static>(
    runtime: R,
    overrides: Overrides,
    name: &str,
    kind: Option<ContributionType>,
) -> Result<()> {
    let config = Config::new(runtime, overrides)?;
    let session = Session::open(config)?;
    let contribution = session.resolve(name, kind)?;
    if !contribution.is_installed() {
        bail!("{} is not installed", contribution.key());
    }

    let installer = session.installer();
    let handle = installer.remove(&contribution, Arc::new(ConsoleProgress::new()));
    let outcome = run_task(session.config.runtime.as_ref(), handle, &session.cleanup).await;
    check_outcome(outcome, "Removal")?;

    if contribution.kind().requires_restart() {
        println!(
            "{} is flagged for removal and will be deleted by the next sweep.",
            contribution.key()
        );
    } else {
        println!("Removed {}", contribution.key());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::DELETION_FLAG;
    use crate::runtime::RealRuntime;
    use std::fs;
    use tempfile::tempdir;

    fn overrides(dir: &std::path::Path) -> Overrides {
        Overrides {
            sketchbook: Some(dir.join("sketchbook")),
            settings_dir: Some(dir.join("settings")),
            listing_url: None,
        }
    }

    #[tokio::test]
    async fn test_remove_mode_flags_it() {
        let dir = tempdir().unwrap();
        let mode = dir.path().join("sketchbook/modes/Py");
        fs::create_dir_all(&mode).unwrap();
        fs::write(mode.join("mode.properties"), "name=Py\n").unwrap();

        remove(RealRuntime, overrides(dir.path()), "Py", None)
            .await
            .unwrap();

        assert!(mode.join(DELETION_FLAG).exists());
        assert!(mode.join("mode.properties").exists());
    }

    #[tokio::test]
    async fn test_remove_library() {
        let dir = tempdir().unwrap();
        let library = dir.path().join("sketchbook/libraries/Foo");
        fs::create_dir_all(&library).unwrap();
        fs::write(library.join("library.properties"), "name=Foo\n").unwrap();

        remove(
            RealRuntime,
            overrides(dir.path()),
            "Foo",
            Some(ContributionType::Library),
        )
        .await
        .unwrap();

        assert!(!library.exists());
        // Backed up by default
        assert!(dir.path().join("sketchbook/libraries/old").is_dir());
    }

    #[tokio::test]
    async fn test_remove_not_installed() {
        let dir = tempdir().unwrap();
        let settings = dir.path().join("settings");
        fs::create_dir_all(&settings).unwrap();
        fs::write(settings.join("contributions.txt"), "library\nname=Foo\n").unwrap();

        let err = remove(RealRuntime, overrides(dir.path()), "Foo", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("is not installed"));
    }
}
