use anyhow::{Result, bail};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, Overrides};
use crate::contribution::ContributionType;
use crate::runtime::Runtime;

use super::{ConsoleProgress, Session, check_outcome, run_task};

/// Install or update the contribution called `name`, or install the local
/// `archive` as a contribution of type `kind`.
#[tracing::instrument(skip(runtime, overrides))]
pub async fn install<R: Runtime + 'static>(
    runtime: R,
    overrides: Overrides,
    name: Option<String>,
    kind: Option<ContributionType>,
    archive: Option<PathBuf>,
) -> Result<()> {
    let config = Config::new(runtime, overrides)?;
    let session = Session::open(config)?;
    let installer = session.installer();
    let progress = Arc::new(ConsoleProgress::new());

    let (handle, key) = match (name, archive) {
        (_, Some(archive)) => {
            let kind = kind.unwrap_or(ContributionType::Library);
            info!("Installing {:?} as a {}", archive, kind);
            (installer.install_archive(kind, archive, progress), None)
        }
        (Some(name), None) => {
            let contribution = session.resolve(&name, kind)?;
            if contribution.is_installed() && !session.listing.has_updates(&contribution) {
                println!("{} is already up to date.", contribution.key());
                return Ok(());
            }
            let key = contribution.key();
            (installer.install(&contribution, progress), Some(key))
        }
        (None, None) => bail!("Name a contribution to install, or pass --archive"),
    };

    let outcome = run_task(session.config.runtime.as_ref(), handle, &session.cleanup).await;
    check_outcome(outcome, "Installation")?;

    match key.and_then(|k| session.listing.find(&k)) {
        Some(installed) => println!(
            "Installed {} {}",
            installed.key(),
            installed.info().pretty_version
        ),
        None => println!("Installed."),
    }
    Ok(())
}
